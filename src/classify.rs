// asset_proxy::classify
//
// Picks the rewrite path from the upstream content-type.  No sniffing: a
// page served as text/plain is passed through even if it looks like HTML.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Other,
}

pub fn classify(content_type: Option<&str>) -> ContentKind {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("text/html") => ContentKind::Html,
        _ => ContentKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_with_parameters() {
        assert_eq!(classify(Some("text/html")), ContentKind::Html);
        assert_eq!(classify(Some("text/html; charset=ISO-8859-1")), ContentKind::Html);
        assert_eq!(classify(Some("Text/HTML")), ContentKind::Html);
    }

    #[test]
    fn everything_else_passes_through() {
        assert_eq!(classify(Some("image/png")), ContentKind::Other);
        assert_eq!(classify(Some("application/xhtml+xml")), ContentKind::Other);
        assert_eq!(classify(Some("text/plain")), ContentKind::Other);
        assert_eq!(classify(None), ContentKind::Other);
    }
}
