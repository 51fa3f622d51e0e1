//! Content dispatch and text extraction.
//!
//! The declared content type decides the path: blocked types are refused
//! regardless of size, PDFs get a tighter ceiling before parsing, and markup is
//! decoded as lossy UTF-8 and run through the primary extractor with the
//! tag-strip fallback behind it.

mod html;
mod pdf;
mod strip;

use std::fmt;
use std::sync::Arc;

use url::Url;

pub use html::{MainContentExtractor, main_content_text};
pub use pdf::PdfTextExtractor;
pub use strip::TagStripExtractor;

use crate::config::MAX_PDF_BYTES;
use crate::error::{ErrorCode, GateError};

/// Text extraction capability: bytes plus the page URL in, text out.
///
/// Returning empty text is not an error; emptiness is judged once by the caller.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, body: &[u8], url: &Url) -> Result<String, GateError>;
}

/// Media types that can carry executable or opaque binary payloads.
const BLOCKED_EXACT: &[&str] = &[
    "application/msword",
    "application/rtf",
    "text/rtf",
    "application/zip",
    "application/x-zip-compressed",
    "application/vnd.rar",
    "application/x-7z-compressed",
    "image/svg+xml",
    "application/javascript",
    "text/javascript",
    "application/x-javascript",
    "application/x-msdownload",
    "application/x-msdos-program",
    "application/vnd.microsoft.portable-executable",
];

const BLOCKED_PREFIXES: &[&str] = &[
    "application/vnd.ms-",
    "application/vnd.openxmlformats-officedocument.",
    "application/x-rar",
];

const MARKUP_TYPES: &[&str] = &["text/html", "text/plain", "application/xhtml+xml"];

/// Where a response goes, decided from its `Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentDisposition {
    Blocked(String),
    Pdf,
    Markup,
    Unsupported(String),
}

impl ContentDisposition {
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let media_type = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|mt| mt.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if BLOCKED_EXACT.contains(&media_type.as_str())
            || BLOCKED_PREFIXES.iter().any(|p| media_type.starts_with(p))
        {
            return ContentDisposition::Blocked(media_type);
        }
        if media_type == "application/pdf" {
            return ContentDisposition::Pdf;
        }
        if MARKUP_TYPES.contains(&media_type.as_str()) {
            return ContentDisposition::Markup;
        }
        ContentDisposition::Unsupported(media_type)
    }
}

/// The three extraction paths.
#[derive(Clone)]
pub struct Extractors {
    pub primary: Arc<dyn TextExtractor>,
    pub fallback: Arc<dyn TextExtractor>,
    pub pdf: Arc<dyn TextExtractor>,
}

impl Default for Extractors {
    fn default() -> Self {
        Self {
            primary: Arc::new(MainContentExtractor),
            fallback: Arc::new(TagStripExtractor),
            pdf: Arc::new(PdfTextExtractor),
        }
    }
}

impl fmt::Debug for Extractors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractors").finish_non_exhaustive()
    }
}

/// Route `body` by content type and extract its text.
pub fn extract(
    content_type: Option<&str>,
    body: &[u8],
    url: &Url,
    extractors: &Extractors,
) -> Result<String, GateError> {
    match ContentDisposition::from_content_type(content_type) {
        ContentDisposition::Blocked(media_type) => Err(GateError::new(
            ErrorCode::BlockedContentType,
            format!("Blocked content type: {media_type}"),
        )
        .with_detail("content_type", media_type)),
        ContentDisposition::Unsupported(media_type) => Err(GateError::new(
            ErrorCode::UnsupportedContentType,
            format!("Unsupported content type: {media_type}"),
        )
        .with_detail("content_type", media_type)),
        ContentDisposition::Pdf => {
            if body.len() > MAX_PDF_BYTES {
                return Err(
                    GateError::new(ErrorCode::PdfTooLarge, "PDF exceeds maximum size")
                        .with_detail("size", body.len().to_string())
                        .with_detail("max_bytes", MAX_PDF_BYTES.to_string()),
                );
            }
            extractors.pdf.extract(body, url)
        }
        ContentDisposition::Markup => {
            match extractors.primary.extract(body, url) {
                Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(_) => tracing::debug!(url = %url, "primary extractor found no text; stripping tags"),
                Err(e) => tracing::debug!(url = %url, error = %e, "primary extractor failed; stripping tags"),
            }
            extractors
                .fallback
                .extract(body, url)
                .map(|text| text.trim().to_string())
        }
    }
}
