// asset_proxy::config
//
// Process configuration, read once from the environment at start-up and
// shared read-only afterwards.
//
//   PROXY_API_KEY                shared secret for x-api-key (unset/empty: off)
//   PROXY_ALLOWLIST              comma-separated hosts / suffixes (unset: any)
//   PROXY_BIND                   listen address, default 0.0.0.0:8080
//   PROXY_ROUTE                  mount path, default /proxy
//   PROXY_UPSTREAM_TIMEOUT_SECS  upstream timeout (unset: none)
//   PROXY_USER_AGENT             outbound User-Agent

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::validate::{AccessPolicy, Allowlist};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_ROUTE: &str = "/proxy";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind: SocketAddr,
    pub route: String,
    pub access: AccessPolicy,
    pub upstream_timeout: Option<Duration>,
    pub user_agent: String,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_raw = var("PROXY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .trim()
            .parse()
            .map_err(|source| ConfigError::BindAddr {
                value: bind_raw.clone(),
                source,
            })?;

        let route = var("PROXY_ROUTE").unwrap_or_else(|| DEFAULT_ROUTE.to_string());
        let route = route.trim().to_string();
        if !route.starts_with('/') {
            return Err(ConfigError::Route(route));
        }

        let upstream_timeout = match var("PROXY_UPSTREAM_TIMEOUT_SECS") {
            None => None,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(ConfigError::Timeout(raw)),
            },
        };

        let access = AccessPolicy {
            api_key: var("PROXY_API_KEY"),
            allowlist: var("PROXY_ALLOWLIST")
                .map(|csv| Allowlist::parse(&csv))
                .unwrap_or_default(),
        };

        let user_agent = var("PROXY_USER_AGENT")
            .unwrap_or_else(|| concat!("asset_proxy/", env!("CARGO_PKG_VERSION")).to_string());

        Ok(Self {
            bind,
            route,
            access,
            upstream_timeout,
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ProxyConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProxyConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(config.route, "/proxy");
        assert!(config.access.api_key.is_none());
        assert!(config.access.allowlist.is_empty());
        assert!(config.upstream_timeout.is_none());
        assert!(config.user_agent.starts_with("asset_proxy/"));
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("PROXY_API_KEY", "s3cret"),
            ("PROXY_ALLOWLIST", "example.com, cdn.test"),
            ("PROXY_BIND", "127.0.0.1:9000"),
            ("PROXY_ROUTE", "/api/proxy"),
            ("PROXY_UPSTREAM_TIMEOUT_SECS", "15"),
            ("PROXY_USER_AGENT", "custom/1"),
        ])
        .unwrap();
        assert_eq!(config.access.api_key.as_deref(), Some("s3cret"));
        assert_eq!(config.access.allowlist.entries(), ["example.com", "cdn.test"]);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.route, "/api/proxy");
        assert_eq!(config.upstream_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.user_agent, "custom/1");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[("PROXY_API_KEY", "  "), ("PROXY_ALLOWLIST", "")]).unwrap();
        assert!(config.access.api_key.is_none());
        assert!(config.access.allowlist.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(load(&[("PROXY_BIND", "nowhere")]), Err(ConfigError::BindAddr { .. })));
        assert!(matches!(load(&[("PROXY_ROUTE", "proxy")]), Err(ConfigError::Route(_))));
        assert!(matches!(
            load(&[("PROXY_UPSTREAM_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Timeout(_))
        ));
        assert!(matches!(
            load(&[("PROXY_UPSTREAM_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Timeout(_))
        ));
    }
}
