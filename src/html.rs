// asset_proxy::html
//
// Text-level HTML rewriter.  No DOM is built: a small scanner walks the
// tags of the document, splits each one into attribute name / quote /
// value triples, and splices replacement values into an otherwise
// byte-for-byte copy of the input.
//
// Per tag:
//   <meta http-equiv="Content-Security-Policy" ...>  removed entirely
//   src / href / action="..."                        proxied
//   srcset="..."                                     every candidate proxied
//
// Anything the scanner cannot make sense of (unquoted values, a quote or
// tag that never closes, a URL that does not resolve) is left untouched.

use std::ops::Range;

use html_escape::decode_html_entities;
use log::debug;

use crate::csp::is_csp_http_equiv;
use crate::url::{RewriteContext, RewriteFailure};

/// Attributes holding exactly one URL.
const URL_ATTRS: &[&str] = &["src", "href", "action"];

const SRCSET_ATTR: &str = "srcset";

/// Elements whose content is text, not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Rewrite an HTML document so its resource links route through the proxy.
pub fn rewrite_html(ctx: &RewriteContext, html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len() + html.len() / 4);
    // Source bytes before `copied` are already in `out`.
    let mut copied = 0;
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;

        if html[start..].starts_with("<!--") {
            pos = html[start + 4..]
                .find("-->")
                .map_or(html.len(), |end| start + 4 + end + 3);
            continue;
        }
        if !bytes.get(start + 1).is_some_and(u8::is_ascii_alphabetic) {
            pos = start + 1;
            continue;
        }

        let Some(tag) = scan_tag(html, start) else {
            break;
        };

        if tag.is_csp_meta(html) {
            out.push_str(&html[copied..start]);
            copied = tag.end;
        } else {
            for attr in &tag.attrs {
                let Some((span, replacement)) = rewrite_attr(ctx, html, attr) else {
                    continue;
                };
                out.push_str(&html[copied..span.start]);
                out.push_str(&replacement);
                copied = span.end;
            }
        }

        let name = &html[tag.name.clone()];
        pos = if RAW_TEXT_ELEMENTS.iter().any(|e| name.eq_ignore_ascii_case(e)) {
            skip_raw_text(html, tag.end, name)
        } else {
            tag.end
        };
    }

    out.push_str(&html[copied..]);
    out
}

// ---------------------------------------------------------------------------
// Tag scanner
// ---------------------------------------------------------------------------

struct Tag {
    name: Range<usize>,
    attrs: Vec<Attr>,
    /// One past the closing `>`.
    end: usize,
}

struct Attr {
    name: Range<usize>,
    value: Option<AttrValue>,
}

struct AttrValue {
    /// Excludes the quotes.
    span: Range<usize>,
    quoted: bool,
}

impl Tag {
    fn is_csp_meta(&self, html: &str) -> bool {
        html[self.name.clone()].eq_ignore_ascii_case("meta")
            && self.attrs.iter().any(|attr| {
                html[attr.name.clone()].eq_ignore_ascii_case("http-equiv")
                    && attr.value.as_ref().is_some_and(|v| {
                        is_csp_http_equiv(&decode_html_entities(&html[v.span.clone()]))
                    })
            })
    }
}

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace()
}

fn skip_space(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && is_space(bytes[i]) {
        i += 1;
    }
    i
}

/// Scan the tag opening at `start` (which points at `<`).  `None` if the
/// tag or one of its quoted values runs off the end of the document.
fn scan_tag(html: &str, start: usize) -> Option<Tag> {
    let bytes = html.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() && !is_space(bytes[i]) && !matches!(bytes[i], b'>' | b'/') {
        i += 1;
    }
    let name = start + 1..i;
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && (is_space(bytes[i]) || bytes[i] == b'/') {
            i += 1;
        }
        if *bytes.get(i)? == b'>' {
            return Some(Tag { name, attrs, end: i + 1 });
        }

        // A leading '=' belongs to the name.
        let name_start = i;
        i += 1;
        while i < bytes.len() && !is_space(bytes[i]) && !matches!(bytes[i], b'>' | b'/' | b'=') {
            i += 1;
        }
        let attr_name = name_start..i;

        let after_name = skip_space(bytes, i);
        if bytes.get(after_name) != Some(&b'=') {
            attrs.push(Attr { name: attr_name, value: None });
            i = after_name;
            continue;
        }

        let j = skip_space(bytes, after_name + 1);
        match *bytes.get(j)? {
            quote @ (b'"' | b'\'') => {
                let close = j + 1 + html[j + 1..].find(char::from(quote))?;
                attrs.push(Attr {
                    name: attr_name,
                    value: Some(AttrValue { span: j + 1..close, quoted: true }),
                });
                i = close + 1;
            }
            _ => {
                let mut k = j;
                while k < bytes.len() && !is_space(bytes[k]) && bytes[k] != b'>' {
                    k += 1;
                }
                attrs.push(Attr {
                    name: attr_name,
                    value: Some(AttrValue { span: j..k, quoted: false }),
                });
                i = k;
            }
        }
    }
}

/// Position of the `</name` that closes a raw-text element, or the end of
/// the document.
fn skip_raw_text(html: &str, from: usize, name: &str) -> usize {
    let bytes = html.as_bytes();
    let mut i = from;
    while let Some(offset) = html[i..].find("</") {
        let at = i + offset;
        let name_end = at + 2 + name.len();
        if name_end <= bytes.len()
            && bytes[at + 2..name_end].eq_ignore_ascii_case(name.as_bytes())
            && bytes
                .get(name_end)
                .map_or(true, |&b| is_space(b) || b == b'>' || b == b'/')
        {
            return at;
        }
        i = at + 2;
    }
    html.len()
}

// ---------------------------------------------------------------------------
// Attribute rewriting
// ---------------------------------------------------------------------------

/// Replacement for one attribute's value, with the span it replaces.
fn rewrite_attr(ctx: &RewriteContext, html: &str, attr: &Attr) -> Option<(Range<usize>, String)> {
    let value = attr.value.as_ref().filter(|v| v.quoted)?;
    let name = &html[attr.name.clone()];
    let raw = &html[value.span.clone()];

    let result = if URL_ATTRS.iter().any(|a| name.eq_ignore_ascii_case(a)) {
        ctx.rewrite(&decode_html_entities(raw))
    } else if name.eq_ignore_ascii_case(SRCSET_ATTR) {
        rewrite_srcset(ctx, raw)
    } else {
        return None;
    };

    match result {
        Ok(replacement) => Some((value.span.clone(), replacement)),
        Err(RewriteFailure::Malformed) => {
            debug!("left {name}={raw:?} unchanged: does not resolve against {}", ctx.base());
            None
        }
        Err(_) => None,
    }
}

/// Rewrite a `srcset` value:  `a.png 1x, b.png 2x`.
///
/// Empty candidates are dropped.  A candidate that is not fetchable
/// (`data:`, `#frag`) is kept as written.  A candidate that does not
/// resolve at all keeps the whole value.
fn rewrite_srcset(ctx: &RewriteContext, srcset: &str) -> Result<String, RewriteFailure> {
    let mut rewritten = Vec::new();
    for (url, descriptor) in srcset_candidates(srcset) {
        let link = match ctx.rewrite(&decode_html_entities(url)) {
            Ok(link) => link,
            Err(RewriteFailure::Malformed) => return Err(RewriteFailure::Malformed),
            Err(_) => url.to_owned(),
        };
        rewritten.push(if descriptor.is_empty() {
            link
        } else {
            format!("{link} {descriptor}")
        });
    }
    if rewritten.is_empty() {
        return Err(RewriteFailure::Empty);
    }
    Ok(rewritten.join(", "))
}

/// Split a `srcset` into `(url, descriptor)` pairs.  The URL runs to the
/// next whitespace, so commas inside it (`data:` payloads) stay put; a
/// trailing comma on the URL ends the candidate.
fn srcset_candidates(srcset: &str) -> Vec<(&str, &str)> {
    let mut candidates = Vec::new();
    let mut rest = srcset;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            return candidates;
        }
        let url_end = rest.find(|c: char| c.is_ascii_whitespace()).unwrap_or(rest.len());
        let url = &rest[..url_end];
        rest = &rest[url_end..];

        if url.ends_with(',') {
            candidates.push((url.trim_end_matches(','), ""));
            continue;
        }
        let descriptor_end = rest.find(',').unwrap_or(rest.len());
        let descriptor = rest[..descriptor_end].trim_matches(|c: char| c.is_ascii_whitespace());
        rest = &rest[descriptor_end..];
        candidates.push((url, descriptor));
    }
}
