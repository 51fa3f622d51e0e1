//! Gateway configuration.
//!
//! [`GateConfig`] is the boundary type: every field optional, deserialized from
//! TOML. [`ResolvedConfig`] is what the pipeline runs on; all defaults and
//! environment gates are applied once in [`ResolvedConfig::from_config`].

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::allowlist::AllowlistSources;
use crate::validate::UrlPolicy;

/// Maximum redirects followed before the fetch fails.
pub const MAX_REDIRECTS: u32 = 3;

/// Streaming ceiling for any response body (5 MiB).
pub const MAX_RESPONSE_BYTES: usize = 5 * 1024 * 1024;

/// Ceiling for PDF bodies, checked before parsing (2 MiB).
pub const MAX_PDF_BYTES: usize = 2 * 1024 * 1024;

/// Longest accepted URL, in characters.
pub const MAX_URL_LENGTH: usize = 2048;

/// Enables plain `http` when truthy.
pub const ENV_ALLOW_HTTP: &str = "FETCHGATE_ALLOW_HTTP";

/// Must be truthy for `security.allow_loopback` to take effect.
pub const ENV_ALLOW_INSECURE_OVERRIDES: &str = "FETCHGATE_ALLOW_INSECURE_OVERRIDES";

/// Comma-separated allowlist patterns appended to the loaded set.
pub const ENV_ALLOWED_DOMAINS: &str = "FETCHGATE_ALLOWED_DOMAINS";

/// Replaces the allowlist override file path.
pub const ENV_ALLOWLIST_FILE: &str = "FETCHGATE_ALLOWLIST_FILE";

/// Gateway configuration. Maps to `~/.fetchgate/config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GateConfig {
    /// Permit plain `http` URLs. Default: false.
    #[serde(default)]
    pub allow_http: bool,

    /// User-Agent sent on every request.
    pub user_agent: Option<String>,

    /// Deadline for the whole HTTP exchange, redirects included. Default: 10.
    pub timeout_seconds: Option<u32>,

    /// Minimum spacing between fetch starts, in milliseconds. Default: 5000.
    pub rate_interval_ms: Option<u64>,

    /// Allowlist sources.
    pub allowlist: Option<AllowlistConfig>,

    /// Security relaxations for local testing.
    pub security: Option<SecurityConfig>,
}

impl GateConfig {
    pub const DEFAULT_USER_AGENT: &'static str = "fetchgate/0.1 (research fetcher)";

    pub const DEFAULT_TIMEOUT_SECONDS: u32 = 10;

    pub const DEFAULT_RATE_INTERVAL_MS: u64 = 5000;

    #[must_use]
    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds.unwrap_or(Self::DEFAULT_TIMEOUT_SECONDS)
    }

    #[must_use]
    pub fn rate_interval_ms(&self) -> u64 {
        self.rate_interval_ms
            .unwrap_or(Self::DEFAULT_RATE_INTERVAL_MS)
    }
}

/// `[allowlist]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowlistConfig {
    /// Override file, one pattern per line.
    pub file: Option<PathBuf>,

    /// Extra patterns appended after the file.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Start from the built-in research domains. Default: true.
    #[serde(default = "default_true")]
    pub include_defaults: bool,
}

/// `[security]` table.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    /// Accept resolved loopback addresses (local testing only).
    ///
    /// Requires `FETCHGATE_ALLOW_INSECURE_OVERRIDES=1`. Never relaxes private,
    /// link-local, or reserved ranges, and never the syntactic host check.
    #[serde(default)]
    pub allow_loopback: bool,
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            file: None,
            domains: Vec::new(),
            include_defaults: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub rate_interval: Duration,
    pub max_redirects: u32,
    pub max_response_bytes: usize,
    pub url_policy: UrlPolicy,
    pub allowlist: AllowlistSources,
    pub allow_loopback: bool,
}

impl ResolvedConfig {
    #[must_use]
    pub fn from_config(config: &GateConfig) -> Self {
        let user_agent = config
            .user_agent
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| GateConfig::DEFAULT_USER_AGENT.to_string());

        let timeout = Duration::from_secs(u64::from(config.timeout_seconds().max(1)));
        let rate_interval = Duration::from_millis(config.rate_interval_ms());

        let allowlist = config
            .allowlist
            .as_ref()
            .map_or_else(AllowlistSources::default, |a| AllowlistSources {
                include_defaults: a.include_defaults,
                file: a.file.clone(),
                extra: a.domains.clone(),
            });

        let requested_loopback = config.security.as_ref().is_some_and(|s| s.allow_loopback);
        let loopback_opt_in = env_opt_in_enabled(ENV_ALLOW_INSECURE_OVERRIDES);
        if requested_loopback && !loopback_opt_in {
            tracing::warn!(
                "security.allow_loopback requested in config but disabled: set {}=1 to opt in",
                ENV_ALLOW_INSECURE_OVERRIDES
            );
        }

        Self {
            user_agent,
            timeout,
            rate_interval,
            max_redirects: MAX_REDIRECTS,
            max_response_bytes: MAX_RESPONSE_BYTES,
            url_policy: UrlPolicy {
                allow_http: config.allow_http,
                max_url_length: MAX_URL_LENGTH,
            },
            allowlist,
            allow_loopback: requested_loopback && loopback_opt_in,
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

#[must_use]
pub fn env_opt_in_enabled(name: &str) -> bool {
    is_truthy_env(env::var(name).ok().as_deref())
}

#[must_use]
pub fn is_truthy_env(value: Option<&str>) -> bool {
    value.is_some_and(|raw| {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
