// asset_proxy::url
//
// Proxy URL encoding.  Every URL the rewriter touches is resolved against
// the upstream page and turned into a link back to this proxy:
//
//   <proxy base>?url=<percent-encoded absolute target>
//
// The proxy base is the caller-visible URL of our own route, e.g.
// "https://proxy.example/proxy".

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::{ProxyError, Result};

/// `encodeURIComponent`'s set, plus `'` so the result also survives inside
/// single-quoted attributes.
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single query component.
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT_ENCODE_SET).to_string()
}

/// Build the proxy link for an absolute target.
pub fn encode_target(proxy_base: &str, target: &Url) -> String {
    format!("{}?url={}", proxy_base, encode_component(target.as_str()))
}

/// Why a single attribute value was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteFailure {
    Empty,
    FragmentOnly,
    Malformed,
    /// Resolved fine, but to something the proxy will not fetch
    /// (`javascript:`, `data:`, `mailto:` ...).
    NotFetchable,
}

/// Everything one response's rewrite decisions depend on.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    base: Url,
    proxy_base: String,
}

impl RewriteContext {
    /// `proxy_base` must itself be an absolute http(s) URL.
    pub fn new(base: Url, proxy_base: impl Into<String>) -> Result<Self> {
        let proxy_base = proxy_base.into();
        match Url::parse(&proxy_base) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => {}
            _ => {
                return Err(ProxyError::InternalRewrite(format!(
                    "invalid proxy base URL {proxy_base:?}"
                )))
            }
        }
        Ok(Self { base, proxy_base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn proxy_base(&self) -> &str {
        &self.proxy_base
    }

    /// Resolve `raw` against the page base.
    pub fn resolve(&self, raw: &str) -> std::result::Result<Url, RewriteFailure> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RewriteFailure::Empty);
        }
        if trimmed.starts_with('#') {
            return Err(RewriteFailure::FragmentOnly);
        }
        let resolved = self.base.join(trimmed).map_err(|_| RewriteFailure::Malformed)?;
        if !matches!(resolved.scheme(), "http" | "https") {
            return Err(RewriteFailure::NotFetchable);
        }
        Ok(resolved)
    }

    /// Resolve and wrap `raw` in a proxy link.
    pub fn rewrite(&self, raw: &str) -> std::result::Result<String, RewriteFailure> {
        self.resolve(raw).map(|abs| encode_target(&self.proxy_base, &abs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY: &str = "http://proxy.test/proxy";

    fn ctx(base: &str) -> RewriteContext {
        RewriteContext::new(Url::parse(base).unwrap(), PROXY).unwrap()
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(
            encode_component("https://cdn.test/x.png"),
            "https%3A%2F%2Fcdn.test%2Fx.png"
        );
        assert_eq!(encode_component("a b&c=d+e"), "a%20b%26c%3Dd%2Be");
        assert_eq!(encode_component("-_.!~*()"), "-_.!~*()");
        assert_eq!(encode_component("it's"), "it%27s");
    }

    #[test]
    fn absolute_target() {
        let c = ctx("https://a.test/dir/page");
        assert_eq!(
            c.rewrite("https://cdn.test/x.png").unwrap(),
            "http://proxy.test/proxy?url=https%3A%2F%2Fcdn.test%2Fx.png"
        );
    }

    #[test]
    fn relative_targets_resolve_against_the_page() {
        let c = ctx("https://a.test/dir/page");
        assert_eq!(c.resolve("../other.html").unwrap().as_str(), "https://a.test/other.html");
        assert_eq!(c.resolve("img.png").unwrap().as_str(), "https://a.test/dir/img.png");
        assert_eq!(c.resolve("/root.css").unwrap().as_str(), "https://a.test/root.css");
        assert_eq!(c.resolve("//cdn.test/lib.js").unwrap().as_str(), "https://cdn.test/lib.js");
    }

    #[test]
    fn non_fetchable_values_are_kept() {
        let c = ctx("https://a.test/");
        assert_eq!(c.rewrite(""), Err(RewriteFailure::Empty));
        assert_eq!(c.rewrite("#top"), Err(RewriteFailure::FragmentOnly));
        assert_eq!(c.rewrite("javascript:void(0)"), Err(RewriteFailure::NotFetchable));
        assert_eq!(c.rewrite("data:image/png;base64,AAAA"), Err(RewriteFailure::NotFetchable));
        assert_eq!(c.rewrite("mailto:a@b.test"), Err(RewriteFailure::NotFetchable));
    }

    #[test]
    fn garbage_is_malformed() {
        let c = ctx("https://a.test/");
        assert_eq!(c.rewrite("//[garbage"), Err(RewriteFailure::Malformed));
        assert_eq!(c.rewrite("http://"), Err(RewriteFailure::Malformed));
    }

    #[test]
    fn query_decoding_recovers_the_target() {
        let target = Url::parse("https://example.com/path?q=1&r=two words+more").unwrap();
        let link = Url::parse(&encode_target(PROXY, &target)).unwrap();
        let (key, value) = link.query_pairs().next().unwrap();
        assert_eq!(key, "url");
        assert_eq!(value, target.as_str());
        assert_eq!(link.query_pairs().count(), 1);
    }

    #[test]
    fn proxy_base_must_be_absolute() {
        let base = Url::parse("https://a.test/").unwrap();
        assert!(RewriteContext::new(base.clone(), "/proxy").is_err());
        assert!(RewriteContext::new(base.clone(), "ftp://proxy.test/proxy").is_err());
        assert!(RewriteContext::new(base, "https://proxy.test/").is_ok());
    }
}
