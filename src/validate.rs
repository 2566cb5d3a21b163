// asset_proxy::validate
//
// Target validation.  Turns the caller's raw `url` value into a
// `ParsedTarget`, or rejects it.  The gates run in a fixed order and the
// first failure wins:
//
//   presence -> api key -> parse -> scheme -> host screening -> allowlist
//
// The api key and allowlist come from an `AccessPolicy` loaded once at
// start-up; nothing here reads the environment.

use url::{Host, Url};

use crate::error::{ProxyError, Result};
use crate::screen::{screen_host, ScreeningVerdict};

/// A target that passed parsing and the scheme gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    url: Url,
    hostname: String,
}

impl ParsedTarget {
    fn from_url(url: Url) -> Result<Self> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::UnsupportedScheme);
        }
        let hostname = match url.host() {
            Some(Host::Domain(domain)) => domain.to_ascii_lowercase(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(ProxyError::InvalidUrl),
        };
        Ok(Self { url, hostname })
    }

    /// Always `http` or `https`.
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Lower-case host; IPv6 literals without brackets.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Hosts (and their subdomains) the proxy may reach.  Empty means any host
/// that survives screening.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    entries: Vec<String>,
}

impl Allowlist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    /// Parse a comma-separated list, e.g. `"example.com, cdn.example.net"`.
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Exact match or dot-suffix match against any entry.
    pub fn permits(&self, hostname: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let host = hostname.to_ascii_lowercase();
        self.entries.iter().any(|entry| {
            host == *entry
                || (host.len() > entry.len()
                    && host.ends_with(entry.as_str())
                    && host.as_bytes()[host.len() - entry.len() - 1] == b'.')
        })
    }
}

/// The read-only access rules a validator runs against.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    pub api_key: Option<String>,
    pub allowlist: Allowlist,
}

impl AccessPolicy {
    fn authorizes(&self, caller_key: Option<&str>) -> bool {
        match self.api_key.as_deref() {
            None | Some("") => true,
            // Plain string compare.
            Some(secret) => caller_key == Some(secret),
        }
    }
}

/// Run every gate against `raw`.
pub fn validate(raw: &str, caller_key: Option<&str>, policy: &AccessPolicy) -> Result<ParsedTarget> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ProxyError::MissingTarget);
    }

    if !policy.authorizes(caller_key) {
        return Err(ProxyError::Unauthorized);
    }

    let url = Url::parse(raw).map_err(|_| ProxyError::InvalidUrl)?;
    let target = ParsedTarget::from_url(url)?;

    match verdict(target.hostname(), &policy.allowlist) {
        ScreeningVerdict::Allowed => Ok(target),
        ScreeningVerdict::ForbiddenLocalHost => Err(ProxyError::ForbiddenHost),
        ScreeningVerdict::ForbiddenPrivateRange => Err(ProxyError::ForbiddenIpRange),
        ScreeningVerdict::NotInAllowlist => Err(ProxyError::NotAllowlisted),
    }
}

/// Scheme, screening and allowlist gates for an already-parsed URL.  Used
/// for redirect hops, where presence and the api key no longer apply.
pub fn screen_url(url: &Url, allowlist: &Allowlist) -> Result<ParsedTarget> {
    let target = ParsedTarget::from_url(url.clone())?;
    match verdict(target.hostname(), allowlist) {
        ScreeningVerdict::Allowed => Ok(target),
        ScreeningVerdict::ForbiddenLocalHost => Err(ProxyError::ForbiddenHost),
        ScreeningVerdict::ForbiddenPrivateRange => Err(ProxyError::ForbiddenIpRange),
        ScreeningVerdict::NotInAllowlist => Err(ProxyError::NotAllowlisted),
    }
}

fn verdict(hostname: &str, allowlist: &Allowlist) -> ScreeningVerdict {
    match screen_host(hostname) {
        ScreeningVerdict::Allowed if !allowlist.permits(hostname) => {
            ScreeningVerdict::NotInAllowlist
        }
        v => v,
    }
}
