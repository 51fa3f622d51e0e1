//! Syntactic URL validation.
//!
//! Runs before any network activity: parse, length, scheme, credentials, and the
//! literal host check. Every failure is a `UrlBlocked` error.

use url::Url;

use crate::classify::{Classification, classify, unwrap_brackets};
use crate::config::{ENV_ALLOW_HTTP, MAX_URL_LENGTH};
use crate::error::{ErrorCode, GateError};

/// Schemes rejected with a dedicated diagnostic before the http(s) check.
pub const BLOCKED_SCHEMES: &[&str] = &["file", "data", "javascript", "vbscript", "ftp"];

/// Scheme and length rules applied by [`validate_url`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlPolicy {
    pub allow_http: bool,
    pub max_url_length: usize,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allow_http: false,
            max_url_length: MAX_URL_LENGTH,
        }
    }
}

/// A URL that passed validation. Derived fresh at every validation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub url: Url,
    pub scheme: String,
    /// Lowercase, brackets stripped, trailing dot removed.
    pub host: String,
    pub port: u16,
    pub path_and_query: String,
    pub raw_len: usize,
}

impl ParsedUrl {
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

pub fn validate_url(raw: &str, policy: &UrlPolicy) -> Result<ParsedUrl, GateError> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        GateError::new(ErrorCode::InvalidUrl, format!("Invalid URL: {e}")).with_detail("url", raw)
    })?;

    let raw_len = raw.chars().count();
    if raw_len > policy.max_url_length {
        return Err(GateError::new(ErrorCode::UrlTooLong, "URL too long")
            .with_detail("length", raw_len.to_string())
            .with_detail("max", policy.max_url_length.to_string()));
    }

    let scheme = url.scheme().to_ascii_lowercase();
    if BLOCKED_SCHEMES.contains(&scheme.as_str()) {
        return Err(
            GateError::new(ErrorCode::BlockedScheme, format!("Blocked scheme: {scheme}"))
                .with_detail("scheme", &scheme),
        );
    }
    if scheme != "http" && scheme != "https" {
        return Err(GateError::new(
            ErrorCode::UnsupportedScheme,
            format!("Unsupported scheme: {scheme}"),
        )
        .with_detail("scheme", &scheme));
    }
    if scheme == "http" && !policy.allow_http {
        return Err(GateError::new(
            ErrorCode::HttpNotAllowed,
            format!("HTTP not allowed; set {ENV_ALLOW_HTTP}=1 to permit"),
        ));
    }

    let Some(host) = url.host_str().filter(|h| !h.is_empty()) else {
        return Err(GateError::new(ErrorCode::InvalidUrl, "URL has no host").with_detail("url", raw));
    };

    if !url.username().is_empty() || url.password().is_some() {
        return Err(GateError::new(
            ErrorCode::CredentialsInUrl,
            "Credentials in URL are not allowed",
        ));
    }

    let host = unwrap_brackets(host);
    let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();

    if let Classification::Blocked { reason } = classify(&host) {
        return Err(
            GateError::new(ErrorCode::BlockedHost, format!("Blocked host: {host}"))
                .with_detail("host", &host)
                .with_detail("reason", reason),
        );
    }

    let port = url
        .port_or_known_default()
        .unwrap_or(if scheme == "http" { 80 } else { 443 });
    let path_and_query = match url.query() {
        Some(q) => format!("{}?{q}", url.path()),
        None => url.path().to_string(),
    };

    Ok(ParsedUrl {
        url,
        scheme,
        host,
        port,
        path_and_query,
        raw_len,
    })
}

#[cfg(test)]
mod tests {
    use super::{UrlPolicy, validate_url};
    use crate::error::{ErrorCode, ErrorKind};

    fn policy() -> UrlPolicy {
        UrlPolicy::default()
    }

    fn code(raw: &str) -> ErrorCode {
        validate_url(raw, &policy()).unwrap_err().code
    }

    #[test]
    fn deny_set_schemes_get_a_dedicated_message() {
        for raw in [
            "file:///etc/passwd",
            "data:text/html,<script>alert(1)</script>",
            "javascript:alert(1)",
            "vbscript:msgbox(1)",
            "ftp://arxiv.org/pub/file",
        ] {
            let err = validate_url(raw, &policy()).unwrap_err();
            assert_eq!(err.code, ErrorCode::BlockedScheme, "{raw}");
            assert_eq!(err.kind(), ErrorKind::UrlBlocked);
            assert!(err.message.starts_with("Blocked scheme: "), "{}", err.message);
        }
        assert_eq!(
            validate_url("FILE:///etc/passwd", &policy()).unwrap_err().message,
            "Blocked scheme: file"
        );
    }

    #[test]
    fn other_schemes_are_unsupported() {
        assert_eq!(code("gopher://arxiv.org/"), ErrorCode::UnsupportedScheme);
        assert_eq!(code("mailto:someone@example.org"), ErrorCode::UnsupportedScheme);
    }

    #[test]
    fn http_requires_opt_in() {
        let err = validate_url("http://arxiv.org/abs/1", &policy()).unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpNotAllowed);
        assert!(err.message.contains("FETCHGATE_ALLOW_HTTP=1"));

        let permissive = UrlPolicy {
            allow_http: true,
            ..policy()
        };
        let parsed = validate_url("http://arxiv.org/abs/1", &permissive).unwrap();
        assert_eq!(parsed.port, 80);
    }

    #[test]
    fn unparsable_and_overlong_urls_are_rejected() {
        assert_eq!(code("not a url"), ErrorCode::InvalidUrl);
        assert_eq!(code("https://"), ErrorCode::InvalidUrl);

        let long = format!("https://arxiv.org/{}", "a".repeat(2100));
        assert_eq!(code(&long), ErrorCode::UrlTooLong);

        let exact = format!("https://arxiv.org/{}", "a".repeat(2048 - 18));
        assert_eq!(exact.len(), 2048);
        assert!(validate_url(&exact, &policy()).is_ok());
    }

    #[test]
    fn credentials_are_rejected() {
        assert_eq!(code("https://user:pw@arxiv.org/"), ErrorCode::CredentialsInUrl);
        assert_eq!(code("https://user@arxiv.org/"), ErrorCode::CredentialsInUrl);
    }

    #[test]
    fn literal_internal_hosts_are_blocked() {
        for raw in [
            "https://127.0.0.1/admin",
            "https://localhost/",
            "https://LOCALHOST./",
            "https://[::1]/",
            "https://10.1.2.3/",
            "https://169.254.169.254/latest/meta-data/",
            "https://[::ffff:127.0.0.1]/",
            "https://0x7f000001/",
            "https://2130706433/",
        ] {
            assert_eq!(code(raw), ErrorCode::BlockedHost, "{raw}");
        }
        assert_eq!(
            validate_url("https://127.0.0.1/admin", &policy())
                .unwrap_err()
                .message,
            "Blocked host: 127.0.0.1"
        );
    }

    #[test]
    fn accepted_url_is_normalized() {
        let parsed = validate_url("https://EN.Wikipedia.org:8443/wiki/Rust?x=1#frag", &policy())
            .unwrap();
        assert_eq!(parsed.scheme, "https");
        assert_eq!(parsed.host, "en.wikipedia.org");
        assert_eq!(parsed.port, 8443);
        assert_eq!(parsed.path_and_query, "/wiki/Rust?x=1");

        let parsed = validate_url("https://[2606:4700:4700::1111]/", &policy()).unwrap();
        assert_eq!(parsed.host, "2606:4700:4700::1111");
        assert_eq!(parsed.port, 443);
    }

    #[test]
    fn validation_order_checks_scheme_before_host() {
        assert_eq!(code("ftp://127.0.0.1/"), ErrorCode::BlockedScheme);
        assert_eq!(code("http://127.0.0.1/"), ErrorCode::HttpNotAllowed);
    }
}
