//! Crude tag-stripping fallback for markup the main extractor could not use.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use super::TextExtractor;
use crate::error::{ErrorCode, GateError};

struct StripPatterns {
    script: Regex,
    style: Regex,
    comment: Regex,
    tag: Regex,
    whitespace: Regex,
}

fn strip_patterns() -> Option<&'static StripPatterns> {
    static PATTERNS: OnceLock<Option<StripPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(StripPatterns {
                script: Regex::new(r"(?is)<script[^>]*>.*?</script\s*>").ok()?,
                style: Regex::new(r"(?is)<style[^>]*>.*?</style\s*>").ok()?,
                comment: Regex::new(r"(?s)<!--.*?-->").ok()?,
                tag: Regex::new(r"<[^>]+>").ok()?,
                whitespace: Regex::new(r"\s+").ok()?,
            })
        })
        .as_ref()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TagStripExtractor;

impl TextExtractor for TagStripExtractor {
    fn extract(&self, body: &[u8], _url: &Url) -> Result<String, GateError> {
        let html = String::from_utf8_lossy(body);
        strip_tags(&html).ok_or_else(|| {
            GateError::new(ErrorCode::Internal, "tag-strip patterns failed to compile")
        })
    }
}

/// Remove script/style blocks and comments, replace tags with spaces, collapse
/// whitespace, then decode entities.
fn strip_tags(html: &str) -> Option<String> {
    let p = strip_patterns()?;
    let text = p.script.replace_all(html, "");
    let text = p.style.replace_all(&text, "");
    let text = p.comment.replace_all(&text, "");
    let text = p.tag.replace_all(&text, " ");
    let text = p.whitespace.replace_all(&text, " ");
    Some(html_escape::decode_html_entities(text.trim()).trim().to_string())
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{TagStripExtractor, strip_tags};
    use crate::extract::TextExtractor;

    #[test]
    fn scripts_styles_and_comments_are_removed() {
        let html = r#"<html><head><style>body { color: red }</style>
            <SCRIPT type="text/javascript">alert("x")</SCRIPT></head>
            <body><!-- hidden --><p>Hello,
            <em>world</em></p></body></html>"#;
        assert_eq!(strip_tags(html).unwrap(), "Hello, world");
    }

    #[test]
    fn entities_are_decoded_after_stripping() {
        assert_eq!(
            strip_tags("<p>Fish &amp; Chips &lt;b&gt;</p>").unwrap(),
            "Fish & Chips <b>"
        );
    }

    #[test]
    fn tag_only_input_is_empty() {
        assert_eq!(strip_tags("<div><span></span></div>").unwrap(), "");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let url = Url::parse("https://arxiv.org/").unwrap();
        let text = TagStripExtractor
            .extract(b"<p>caf\xff</p>", &url)
            .unwrap();
        assert_eq!(text, "caf\u{FFFD}");
    }
}
