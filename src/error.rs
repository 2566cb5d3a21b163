// asset_proxy::error
//
// Request-level and start-up error types.  Every `ProxyError` maps to a
// fixed status code and a short plain-text body; nothing else (stack
// traces, upstream bodies) is ever written back to the caller.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Everything that can end a proxied request early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("Missing \"url\" query parameter")]
    MissingTarget,

    #[error("Unauthorized — invalid API key")]
    Unauthorized,

    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Only http/https allowed")]
    UnsupportedScheme,

    #[error("Forbidden host")]
    ForbiddenHost,

    #[error("Forbidden IP range")]
    ForbiddenIpRange,

    #[error("Host not allowed by allowlist")]
    NotAllowlisted,

    #[error("Proxy error: {0}")]
    UpstreamFetch(String),

    #[error("Proxy error: {0}")]
    InternalRewrite(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingTarget => StatusCode::BAD_REQUEST,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::InvalidUrl => StatusCode::BAD_REQUEST,
            ProxyError::UnsupportedScheme => StatusCode::BAD_REQUEST,
            ProxyError::ForbiddenHost => StatusCode::FORBIDDEN,
            ProxyError::ForbiddenIpRange => StatusCode::FORBIDDEN,
            ProxyError::NotAllowlisted => StatusCode::FORBIDDEN,
            ProxyError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
            ProxyError::InternalRewrite(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// True for the 4xx family produced by validation.
    pub fn is_rejection(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.to_string()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Start-up configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid bind address {value:?}: {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid upstream timeout {0:?}: expected a positive number of seconds")]
    Timeout(String),

    #[error("invalid route {0:?}: must start with '/'")]
    Route(String),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        for err in [
            ProxyError::MissingTarget,
            ProxyError::Unauthorized,
            ProxyError::InvalidUrl,
            ProxyError::UnsupportedScheme,
            ProxyError::ForbiddenHost,
            ProxyError::ForbiddenIpRange,
            ProxyError::NotAllowlisted,
        ] {
            assert!(err.is_rejection(), "{err:?}");
        }
    }

    #[test]
    fn upstream_failures_are_bad_gateway() {
        let err = ProxyError::UpstreamFetch("connection refused".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Proxy error: connection refused");
        assert!(!err.is_rejection());
    }

    #[test]
    fn messages_match_wire_format() {
        assert_eq!(
            ProxyError::MissingTarget.to_string(),
            "Missing \"url\" query parameter"
        );
        assert_eq!(
            ProxyError::Unauthorized.to_string(),
            "Unauthorized — invalid API key"
        );
        assert_eq!(ProxyError::NotAllowlisted.to_string(), "Host not allowed by allowlist");
    }

    #[test]
    fn renders_plain_text() {
        let response = ProxyError::ForbiddenIpRange.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
