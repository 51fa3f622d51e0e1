//! PDF text extraction.

use std::panic::{AssertUnwindSafe, catch_unwind};

use url::Url;

use super::TextExtractor;
use crate::error::{ErrorCode, GateError};

const UNREADABLE: &str = "PDF could not be read (corrupted, encrypted, or unsupported)";

/// `pdf-extract` backed extractor. An empty document yields empty text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, body: &[u8], url: &Url) -> Result<String, GateError> {
        // The parser panics on some malformed inputs.
        let result = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(body)
        }));

        match result {
            Ok(Ok(text)) => Ok(text.trim().to_string()),
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "pdf parse failed");
                Err(GateError::new(ErrorCode::PdfUnreadable, UNREADABLE)
                    .with_detail("error", e.to_string()))
            }
            Err(_) => {
                tracing::debug!(url = %url, "pdf parser panicked");
                Err(GateError::new(ErrorCode::PdfUnreadable, UNREADABLE))
            }
        }
    }
}
