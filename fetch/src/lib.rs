//! Egress-safe URL fetching for research agents.
//!
//! [`FetchGate::fetch`] either returns the extracted text of an HTML or PDF
//! document or refuses with a typed [`GateError`]. A URL is contacted only after
//! it passes the URL validator, the allowlist, and resolution with address
//! classification, and every redirect target passes the same chain again before
//! it is followed.
//!
//! # Pipeline
//!
//! 1. [`Checkpoint::admit`]: syntax, allowlist, resolve + classify
//! 2. [`RateLimiter::acquire`]: one start per interval per gate
//! 3. [`Transport::fetch`]: pinned connections, manual redirects, capped body
//! 4. [`extract::extract`]: content-type dispatch and text extraction
//!
//! One [`AuditEvent`] is recorded per call.

pub mod allowlist;
pub mod audit;
pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod http;
pub mod rate;
pub mod resolve;
pub mod validate;

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio::runtime::{Builder, Handle};

pub use allowlist::{Allowlist, AllowlistSources, DEFAULT_PATTERNS};
pub use audit::{AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
pub use checkpoint::{Admitted, Checkpoint};
pub use classify::{Classification, blocked_ip_reason, classify, is_blocked_hostname};
pub use config::{
    GateConfig, MAX_PDF_BYTES, MAX_REDIRECTS, MAX_RESPONSE_BYTES, MAX_URL_LENGTH, ResolvedConfig,
};
pub use error::{ErrorCode, ErrorDetails, ErrorKind, GateError};
pub use extract::{
    ContentDisposition, Extractors, MainContentExtractor, PdfTextExtractor, TagStripExtractor,
    TextExtractor,
};
pub use http::{HttpResponse, RedirectChain, Transport};
pub use rate::RateLimiter;
pub use resolve::{Resolution, Resolver, StaticResolver, SystemResolver, resolve_and_classify};
pub use validate::{ParsedUrl, UrlPolicy, validate_url};

/// The fetch pipeline and the state it guards.
///
/// Instances share nothing: each owns its allowlist cache and rate limiter.
/// Share one behind an `Arc` to throttle every caller together.
pub struct FetchGate {
    config: ResolvedConfig,
    allowlist: OnceLock<Allowlist>,
    limiter: RateLimiter,
    resolver: Arc<dyn Resolver>,
    extractors: Extractors,
    audit: Arc<dyn AuditSink>,
}

impl FetchGate {
    #[must_use]
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_interval),
            config,
            allowlist: OnceLock::new(),
            resolver: Arc::new(SystemResolver),
            extractors: Extractors::default(),
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_extractors(mut self, extractors: Extractors) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Use `allowlist` instead of loading one from the configured sources.
    pub fn with_allowlist(self, allowlist: Allowlist) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(allowlist);
        Self {
            allowlist: cell,
            ..self
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The allowlist, loaded from its sources on first use.
    pub fn allowlist(&self) -> &Allowlist {
        self.allowlist
            .get_or_init(|| Allowlist::load(&self.config.allowlist))
    }

    /// Fetch `url` and return its extracted text.
    pub async fn fetch(&self, url: &str) -> Result<String, GateError> {
        let start = Instant::now();
        let result = self.run(url).await;
        let elapsed = start.elapsed();

        match result {
            Ok((text, status, bytes)) => {
                self.audit
                    .record(&AuditEvent::success(url, status, bytes, elapsed));
                Ok(text)
            }
            Err(err) => {
                self.audit.record(&AuditEvent::failure(url, &err, elapsed));
                Err(err)
            }
        }
    }

    /// [`FetchGate::fetch`] for callers without a runtime.
    ///
    /// Must not be called from inside a Tokio runtime.
    pub fn fetch_blocking(&self, url: &str) -> Result<String, GateError> {
        if Handle::try_current().is_ok() {
            return Err(GateError::new(
                ErrorCode::Internal,
                "fetch_blocking called from within an async runtime",
            ));
        }
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                GateError::new(ErrorCode::Internal, format!("failed to start runtime: {e}"))
            })?;
        runtime.block_on(self.fetch(url))
    }

    async fn run(&self, url: &str) -> Result<(String, u16, usize), GateError> {
        let checkpoint = Checkpoint::new(
            self.config.url_policy,
            self.allowlist(),
            self.resolver.as_ref(),
            self.config.allow_loopback,
        );

        let admitted = checkpoint.admit(url).await?;
        tracing::debug!(url = %admitted.parsed.url, addresses = ?admitted.addrs, "url admitted");

        self.limiter.acquire().await;

        let response = Transport::new(&self.config)
            .fetch(admitted, &checkpoint)
            .await?;

        let text = extract::extract(
            response.content_type.as_deref(),
            &response.body,
            &response.final_url,
            &self.extractors,
        )?;

        if text.trim().is_empty() {
            return Err(GateError::new(
                ErrorCode::NoExtractableText,
                format!("No extractable text: {url}"),
            )
            .with_detail("url", url));
        }

        Ok((text, response.status, response.body.len()))
    }
}

impl fmt::Debug for FetchGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchGate")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl Default for FetchGate {
    fn default() -> Self {
        Self::new(ResolvedConfig::default())
    }
}
