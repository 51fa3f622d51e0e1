//! Per-attempt audit events.
//!
//! Exactly one event is recorded per `FetchGate::fetch` call, on success or
//! failure. The default sink writes it through `tracing` on the
//! `fetchgate::audit` target; persistence is the subscriber's business.

use std::fmt;
use std::time::Duration;

use crate::error::{ErrorKind, GateError};

pub const AUDIT_TARGET: &str = "fetchgate::audit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Success { status: u16, bytes: usize },
    Failure { kind: ErrorKind, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub url: String,
    pub outcome: AuditOutcome,
    pub elapsed: Duration,
}

impl AuditEvent {
    #[must_use]
    pub fn success(url: &str, status: u16, bytes: usize, elapsed: Duration) -> Self {
        Self {
            url: url.to_string(),
            outcome: AuditOutcome::Success { status, bytes },
            elapsed,
        }
    }

    #[must_use]
    pub fn failure(url: &str, error: &GateError, elapsed: Duration) -> Self {
        Self {
            url: url.to_string(),
            outcome: AuditOutcome::Failure {
                kind: error.kind(),
                error: error.message.clone(),
            },
            elapsed,
        }
    }

    /// Reason tag: `success`, `url_blocked`, `allowlist_violation`,
    /// `extraction_failed`, or `fetch_failed`.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match &self.outcome {
            AuditOutcome::Success { .. } => "success",
            AuditOutcome::Failure { kind, .. } => match kind {
                ErrorKind::UrlBlocked => "url_blocked",
                ErrorKind::Allowlist => "allowlist_violation",
                ErrorKind::Extraction => "extraction_failed",
                ErrorKind::Fetch => "fetch_failed",
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Success { .. })
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reason={} url={}", self.reason(), self.url)?;
        match &self.outcome {
            AuditOutcome::Success { status, bytes } => write!(f, " status={status} bytes={bytes}")?,
            AuditOutcome::Failure { error, .. } => write!(f, " error={error}")?,
        }
        write!(f, " elapsed_sec={:.3}", self.elapsed.as_secs_f64())
    }
}

/// Receives one event per fetch attempt.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Emits audit events as `info` records on [`AUDIT_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let elapsed_sec = format!("{:.3}", event.elapsed.as_secs_f64());
        match &event.outcome {
            AuditOutcome::Success { status, bytes } => tracing::info!(
                target: AUDIT_TARGET,
                reason = event.reason(),
                url = %event.url,
                status,
                bytes,
                elapsed_sec = %elapsed_sec,
                "{event}"
            ),
            AuditOutcome::Failure { error, .. } => tracing::info!(
                target: AUDIT_TARGET,
                reason = event.reason(),
                url = %event.url,
                error = %error,
                elapsed_sec = %elapsed_sec,
                "{event}"
            ),
        }
    }
}
