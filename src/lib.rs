// asset_proxy
//
// Single-hop forwarding proxy.  A caller asks for `<route>?url=<target>`;
// the target is screened (scheme, loopback/private hosts, optional
// allowlist, optional shared api key), fetched, and, if it is HTML, every
// `src` / `href` / `action` / `srcset` in it is rewritten to point back at
// this proxy so the page's assets load through it as well.  Anything else
// is passed through with its framing headers scrubbed.
//
// Modules, leaves first:
//   screen    – forbidden local / private hosts
//   validate  – target validation, allowlist, api key
//   url       – proxy link encoding and relative resolution
//   csp       – CSP meta/header handling
//   classify  – HTML vs pass-through
//   html      – the attribute rewriter
//   fetch     – upstream access (reqwest)
//   response  – response assembly
//   handler   – the per-request pipeline
//   config    – environment configuration
//   server    – axum surface

pub mod classify;
pub mod config;
pub mod csp;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod html;
pub mod response;
pub mod screen;
pub mod server;
pub mod url;
pub mod validate;

pub use classify::{classify, ContentKind};
pub use config::ProxyConfig;
pub use error::{ConfigError, ProxyError};
pub use fetch::{Fetcher, HttpFetcher, UpstreamResponse};
pub use handler::{handle, TargetRequest};
pub use html::rewrite_html;
pub use response::ProxyResponse;
pub use screen::{is_forbidden_host, screen_host, ScreeningVerdict};
pub use crate::url::RewriteContext;
pub use validate::{validate, AccessPolicy, Allowlist, ParsedTarget};
