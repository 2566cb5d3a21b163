// asset_proxy::csp
//
// Content-Security-Policy handling.
//
// The upstream's own policy would block the proxy links the rewriter emits,
// and a frame policy would stop the page from being embedded.  So upstream
// CSP is never passed on: the header is dropped by the assembler, the
// `<meta http-equiv>` form is dropped by the HTML rewriter, and proxied HTML
// gets a single permissive frame policy instead.

/// The only policy proxied HTML carries.
pub const FRAME_ANCESTORS_ANY: &str = "frame-ancestors *";

/// Upstream response headers that never reach the caller.
pub const BLOCKED_RESPONSE_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
];

/// True if a response header name must be scrubbed.
pub fn is_blocked_header(name: &str) -> bool {
    BLOCKED_RESPONSE_HEADERS
        .iter()
        .any(|blocked| name.eq_ignore_ascii_case(blocked))
}

/// True if a `<meta>` tag's `http-equiv` value declares a CSP.
pub fn is_csp_http_equiv(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("content-security-policy")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_headers_are_blocked() {
        assert!(is_blocked_header("X-Frame-Options"));
        assert!(is_blocked_header("content-security-policy"));
        assert!(is_blocked_header("Content-Security-Policy-Report-Only"));
        assert!(!is_blocked_header("content-type"));
    }

    #[test]
    fn http_equiv_match_ignores_case_and_padding() {
        assert!(is_csp_http_equiv("Content-Security-Policy"));
        assert!(is_csp_http_equiv(" content-security-policy "));
        assert!(!is_csp_http_equiv("refresh"));
        assert!(!is_csp_http_equiv("Content-Security-Policy-Report-Only"));
    }
}
