//! Error taxonomy for the fetch pipeline.
//!
//! Every failure carries a fine-grained [`ErrorCode`] and maps onto exactly one of
//! the four caller-facing kinds in [`ErrorKind`]. Components return the error
//! untouched; only the boundary (CLI, server) translates the kind into an exit
//! code or HTTP status.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fetch failure with structured context.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GateError {
    /// Stable error code.
    pub code: ErrorCode,

    /// Human-readable description.
    pub message: String,

    /// Error-specific context (blocked IP, redirect URL, status code, ...).
    pub details: ErrorDetails,
}

impl GateError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: ErrorDetails::default(),
        }
    }

    /// Add a detail field.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.0.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Look up a detail value by key.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to JSON for the HTTP wrapper.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "error": self.message,
            "kind": self.kind(),
            "code": self.code,
        });

        if !self.details.0.is_empty() {
            let details: serde_json::Map<String, serde_json::Value> = self
                .details
                .0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            obj["details"] = Value::Object(details);
        }

        obj
    }
}

impl Serialize for GateError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// The four caller-facing failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Host not on the permitted list (initial URL or any redirect hop).
    Allowlist,
    /// Structurally or topologically unsafe URL.
    UrlBlocked,
    /// The fetch succeeded but no usable text could be produced.
    Extraction,
    /// Transport-level failure; the catch-all kind.
    Fetch,
}

impl ErrorKind {
    /// Process exit code used by the CLI.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Allowlist => 2,
            ErrorKind::UrlBlocked => 3,
            ErrorKind::Extraction => 4,
            ErrorKind::Fetch => 1,
        }
    }

    /// HTTP status used by the local server wrapper.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorKind::Allowlist => 403,
            ErrorKind::UrlBlocked => 400,
            ErrorKind::Extraction | ErrorKind::Fetch => 502,
        }
    }

    /// Display name, as printed on the CLI's stderr.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::Allowlist => "AllowlistError",
            ErrorKind::UrlBlocked => "URLBlockedError",
            ErrorKind::Extraction => "ExtractionError",
            ErrorKind::Fetch => "FetchError",
        }
    }
}

/// Fine-grained error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// URL parsing failed or the URL has no host.
    InvalidUrl,
    /// URL longer than the length ceiling.
    UrlTooLong,
    /// Scheme in the explicit deny set.
    BlockedScheme,
    /// Any other non-http(s) scheme.
    UnsupportedScheme,
    /// Plain http without the opt-in flag.
    HttpNotAllowed,
    /// Userinfo present in the URL.
    CredentialsInUrl,
    /// Local hostname or internal literal IP.
    BlockedHost,
    /// A resolved address is internal.
    BlockedAddress,
    /// Name resolution failed or returned nothing.
    HostUnreachable,
    /// Redirect Location could not be resolved.
    InvalidRedirect,
    /// Host not on the allowlist.
    NotAllowlisted,
    /// Redirect ceiling exceeded.
    RedirectLimit,
    /// Redirect status without a Location header.
    MissingLocation,
    /// HTTP 4xx/5xx.
    HttpStatus,
    /// Connection, TLS, read failure, or deadline expiry.
    Network,
    /// Executable or opaque-binary content type.
    BlockedContentType,
    /// Content type without an extraction path.
    UnsupportedContentType,
    /// PDF body above the PDF ceiling.
    PdfTooLarge,
    /// PDF parser failed.
    PdfUnreadable,
    /// Extraction produced no text.
    NoExtractableText,
    /// Unexpected internal error.
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::InvalidUrl
            | ErrorCode::UrlTooLong
            | ErrorCode::BlockedScheme
            | ErrorCode::UnsupportedScheme
            | ErrorCode::HttpNotAllowed
            | ErrorCode::CredentialsInUrl
            | ErrorCode::BlockedHost
            | ErrorCode::BlockedAddress
            | ErrorCode::HostUnreachable
            | ErrorCode::InvalidRedirect => ErrorKind::UrlBlocked,
            ErrorCode::NotAllowlisted => ErrorKind::Allowlist,
            ErrorCode::PdfTooLarge | ErrorCode::PdfUnreadable | ErrorCode::NoExtractableText => {
                ErrorKind::Extraction
            }
            ErrorCode::RedirectLimit
            | ErrorCode::MissingLocation
            | ErrorCode::HttpStatus
            | ErrorCode::Network
            | ErrorCode::BlockedContentType
            | ErrorCode::UnsupportedContentType
            | ErrorCode::Internal => ErrorKind::Fetch,
        }
    }
}

/// Error details as ordered key-value pairs.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails(pub Vec<(String, String)>);
