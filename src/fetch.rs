// asset_proxy::fetch
//
// Upstream access.  The pipeline only sees the `Fetcher` trait; the real
// implementation is a reqwest client whose redirect policy re-screens every
// hop, so an allowed public host cannot bounce the proxy into 127.0.0.1.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use bytes::Bytes;
use log::debug;
use reqwest::redirect::{Attempt, Policy};
use url::Url;

use crate::error::{ConfigError, ProxyError, Result};
use crate::validate::{screen_url, Allowlist, ParsedTarget};

const MAX_REDIRECTS: usize = 10;

/// A fully buffered upstream reply.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Where the body actually came from, after redirects.
    pub final_url: Url,
}

impl UpstreamResponse {
    /// Build a response for `url` with the content-type taken from `headers`.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, final_url: Url) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            status,
            content_type,
            headers,
            body,
            final_url,
        }
    }
}

/// Retrieves a validated target.  Any transport failure, timeout or refused
/// redirect comes back as `ProxyError::UpstreamFetch`.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, target: &ParsedTarget) -> impl Future<Output = Result<UpstreamResponse>> + Send;
}

/// reqwest-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(
        allowlist: Arc<Allowlist>,
        timeout: Option<Duration>,
        user_agent: &str,
    ) -> std::result::Result<Self, ConfigError> {
        let policy = Policy::custom(move |attempt| screen_redirect(attempt, &allowlist));

        let mut builder = reqwest::Client::builder()
            .redirect(policy)
            .user_agent(user_agent.to_string());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

fn screen_redirect(attempt: Attempt<'_>, allowlist: &Allowlist) -> reqwest::redirect::Action {
    match redirect_verdict(attempt.url(), attempt.previous().len(), allowlist) {
        Ok(()) => {
            debug!("following redirect to {}", attempt.url());
            attempt.follow()
        }
        Err(err) => attempt.error(err),
    }
}

/// Decide whether the hop to `next` may be followed after `hops` requests
/// already made.  The hop is screened like a fresh target, minus the
/// presence and api key gates.
fn redirect_verdict(next: &Url, hops: usize, allowlist: &Allowlist) -> Result<()> {
    if hops >= MAX_REDIRECTS {
        return Err(ProxyError::UpstreamFetch("too many redirects".into()));
    }
    screen_url(next, allowlist)
        .map(|_| ())
        .map_err(|reason| ProxyError::UpstreamFetch(format!("redirect to {next} refused: {reason}")))
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, target: &ParsedTarget) -> impl Future<Output = Result<UpstreamResponse>> + Send {
        let request = self.client.get(target.url().clone());
        async move {
            let response = request.send().await.map_err(upstream_error)?;
            let status = response.status();
            let final_url = response.url().clone();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(upstream_error)?;
            Ok(UpstreamResponse::new(status, headers, body, final_url))
        }
    }
}

/// Flatten a reqwest error and its sources into one short line.
fn upstream_error(err: reqwest::Error) -> ProxyError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    ProxyError::UpstreamFetch(message)
}
