// asset_proxy::handler
//
// One request, start to finish:
//
//   validate -> fetch -> classify -> rewrite | pass through -> assemble
//
// Transport-agnostic: the server builds a `TargetRequest` and writes back
// whatever comes out; tests drive it with a canned `Fetcher`.

use log::{debug, error, info, warn};

use crate::classify::{classify, ContentKind};
use crate::error::{ProxyError, Result};
use crate::fetch::Fetcher;
use crate::html::rewrite_html;
use crate::response::{html_response, passthrough_response, ProxyResponse};
use crate::url::RewriteContext;
use crate::validate::{validate, AccessPolicy};

/// What the caller asked for, as seen by the proxy.
#[derive(Debug, Clone, Default)]
pub struct TargetRequest {
    /// `url` query parameter or `x-target-url` header; empty when neither.
    pub raw_url: String,
    pub api_key: Option<String>,
    /// `http` or `https`, as the caller reached us.
    pub caller_protocol: String,
    pub caller_host: String,
    /// Path the proxy is mounted at.
    pub caller_path: String,
}

impl TargetRequest {
    /// The caller-visible URL of this proxy, e.g. `https://p.example/proxy`.
    ///
    /// Fails when the caller host cannot stand as a URL authority on its
    /// own; `http://` + `/proxy` would otherwise parse with `proxy` as host.
    pub fn proxy_base_url(&self) -> Result<String> {
        let host = self.caller_host.as_str();
        if host.is_empty() || host.contains(|c: char| matches!(c, '/' | '?' | '#' | '@') || c.is_whitespace()) {
            return Err(ProxyError::InternalRewrite(format!(
                "cannot build proxy links from caller host {host:?}"
            )));
        }
        Ok(format!("{}://{}{}", self.caller_protocol, host, self.caller_path))
    }
}

pub async fn handle<F: Fetcher>(
    request: &TargetRequest,
    access: &AccessPolicy,
    fetcher: &F,
) -> Result<ProxyResponse> {
    let target = validate(&request.raw_url, request.api_key.as_deref(), access).map_err(|e| {
        warn!("rejected {:?}: {}", request.raw_url, e);
        e
    })?;

    let upstream = fetcher.fetch(&target).await.map_err(|e| {
        error!("fetch {} failed: {}", target.as_str(), e);
        e
    })?;
    debug!(
        "{} -> {} {:?} ({} bytes)",
        target.as_str(),
        upstream.status,
        upstream.content_type,
        upstream.body.len()
    );

    match classify(upstream.content_type.as_deref()) {
        ContentKind::Html => {
            let ctx = request
                .proxy_base_url()
                .and_then(|base| RewriteContext::new(upstream.final_url.clone(), base))
                .map_err(|e| {
                    error!("cannot rewrite {}: {}", target.as_str(), e);
                    e
                })?;
            let text = String::from_utf8_lossy(&upstream.body);
            let rewritten = rewrite_html(&ctx, &text);
            info!("{} rewritten (upstream {})", target.as_str(), upstream.status);
            Ok(html_response(rewritten))
        }
        ContentKind::Other => {
            info!("{} passed through ({})", target.as_str(), upstream.status);
            Ok(passthrough_response(upstream))
        }
    }
}
