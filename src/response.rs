// asset_proxy::response
//
// Response assembly.  Decides status, headers and body for the two success
// paths; the server turns the result into an HTTP response.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::csp::FRAME_ANCESTORS_ANY;
use crate::fetch::UpstreamResponse;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Cache validators carried over on the pass-through path.  Nothing else
/// is copied, so upstream CSP and `X-Frame-Options` never reach the caller.
const FORWARDED_HEADERS: &[&str] = &["cache-control", "etag", "last-modified", "expires"];

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Rewritten HTML: always 200, framable from anywhere.
pub fn html_response(rewritten: String) -> ProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(FRAME_ANCESTORS_ANY),
    );
    ProxyResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from(rewritten),
    }
}

/// Anything else: upstream status and bytes, scrubbed headers.
pub fn passthrough_response(upstream: UpstreamResponse) -> ProxyResponse {
    let mut headers = HeaderMap::new();
    let content_type = upstream
        .headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    headers.insert(header::CONTENT_TYPE, content_type);

    for &name in FORWARDED_HEADERS {
        if let Some(value) = upstream.headers.get(name) {
            headers.insert(HeaderName::from_static(name), value.clone());
        }
    }

    ProxyResponse {
        status: upstream.status,
        headers,
        body: upstream.body,
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
