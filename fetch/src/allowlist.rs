//! Host allowlist.
//!
//! A fetch may only contact hosts matching at least one pattern. Patterns are
//! shell-style globs matched case-insensitively against the whole host, so
//! `*.edu` matches `cs.berkeley.edu` but not `edu`. Sources only ever add
//! patterns; there is no subtraction.

use std::{fs, io};
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use url::Url;

use crate::classify::unwrap_brackets;

/// Built-in research domains.
///
/// The academic TLD wildcards (`*.edu`, `*.ac.uk`) trade precision for coverage.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "arxiv.org",
    "pubmed.ncbi.nlm.nih.gov",
    "*.ncbi.nlm.nih.gov",
    "jstor.org",
    "doi.org",
    "*.edu",
    "*.ac.uk",
    "wikipedia.org",
    "*.wikipedia.org",
    "en.wikipedia.org",
    "www.google.com",
    "scholar.google.com",
    "books.google.com",
    "patents.google.com",
];

/// Where an [`Allowlist`] takes its patterns from, in load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistSources {
    /// Start from [`DEFAULT_PATTERNS`].
    pub include_defaults: bool,
    /// Override file, one pattern per line; blank and `#` lines are ignored.
    pub file: Option<PathBuf>,
    /// Extra patterns (config `allowlist.domains`, `FETCHGATE_ALLOWED_DOMAINS`).
    pub extra: Vec<String>,
}

impl Default for AllowlistSources {
    fn default() -> Self {
        Self {
            include_defaults: true,
            file: None,
            extra: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Allowlist {
    patterns: Vec<String>,
    set: GlobSet,
}

impl Allowlist {
    #[must_use]
    pub fn defaults() -> Self {
        Self::from_patterns(DEFAULT_PATTERNS.iter().copied())
    }

    /// Build from explicit patterns. Blank patterns and patterns that fail to
    /// compile are skipped.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept = Vec::new();
        let mut builder = GlobSetBuilder::new();

        for raw in patterns {
            let pattern = raw.as_ref().trim().to_ascii_lowercase();
            if pattern.is_empty() {
                continue;
            }
            match GlobBuilder::new(&pattern)
                .case_insensitive(true)
                .literal_separator(false)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                    kept.push(pattern);
                }
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "skipping invalid allowlist pattern");
                }
            }
        }

        let set = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "allowlist failed to compile; denying all hosts");
            GlobSet::empty()
        });

        Self {
            patterns: kept,
            set,
        }
    }

    /// Assemble the pattern set from its sources: defaults, then file, then extras.
    #[must_use]
    pub fn load(sources: &AllowlistSources) -> Self {
        let mut patterns: Vec<String> = Vec::new();

        if sources.include_defaults {
            patterns.extend(DEFAULT_PATTERNS.iter().map(|p| (*p).to_string()));
        }

        if let Some(path) = &sources.file {
            patterns.extend(read_pattern_file(path));
        }

        patterns.extend(sources.extra.iter().cloned());

        let allowlist = Self::from_patterns(patterns);
        tracing::debug!(patterns = allowlist.patterns.len(), "allowlist loaded");
        allowlist
    }

    /// Whether `url` is an http(s) URL whose host matches a pattern.
    ///
    /// Unparsable URLs, URLs without a host, and any other scheme are not allowed.
    #[must_use]
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        parsed
            .host_str()
            .is_some_and(|host| self.matches_host(host))
    }

    /// Match a bare host (port already stripped). Brackets and one trailing dot are ignored.
    #[must_use]
    pub fn matches_host(&self, host: &str) -> bool {
        let host = unwrap_brackets(host.trim());
        let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();
        !host.is_empty() && self.set.is_match(host.as_str())
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Read an override file. An unreadable file is skipped with a warning.
fn read_pattern_file(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_pattern_lines(&contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "allowlist file unreadable; skipping");
            Vec::new()
        }
    }
}

fn parse_pattern_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
