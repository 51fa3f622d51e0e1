//! The validation chain every URL passes before it is contacted.
//!
//! Order: URL validator, allowlist, then resolution with address classification.
//! The initial URL and every redirect target go through the same chain; only the
//! allowlist message differs so logs show which hop was refused.

use std::net::IpAddr;

use crate::allowlist::Allowlist;
use crate::error::{ErrorCode, GateError};
use crate::resolve::{Resolution, Resolver, resolve_and_classify};
use crate::validate::{ParsedUrl, UrlPolicy, validate_url};

/// A URL cleared for contact, with the addresses the connection must use.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub parsed: ParsedUrl,
    /// Classified addresses; the transport pins its connection to these.
    pub addrs: Vec<IpAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hop {
    Initial,
    Redirect,
}

pub struct Checkpoint<'a> {
    policy: UrlPolicy,
    allowlist: &'a Allowlist,
    resolver: &'a dyn Resolver,
    allow_loopback: bool,
}

impl<'a> Checkpoint<'a> {
    pub fn new(
        policy: UrlPolicy,
        allowlist: &'a Allowlist,
        resolver: &'a dyn Resolver,
        allow_loopback: bool,
    ) -> Self {
        Self {
            policy,
            allowlist,
            resolver,
            allow_loopback,
        }
    }

    /// Admit the caller-supplied URL.
    pub async fn admit(&self, raw: &str) -> Result<Admitted, GateError> {
        self.run(raw, Hop::Initial).await
    }

    /// Admit a redirect target (already absolute).
    pub async fn admit_redirect(&self, raw: &str) -> Result<Admitted, GateError> {
        self.run(raw, Hop::Redirect).await
    }

    async fn run(&self, raw: &str, hop: Hop) -> Result<Admitted, GateError> {
        let parsed = validate_url(raw, &self.policy)?;

        // The matcher re-checks the scheme itself, independent of the validator.
        if !self.allowlist.is_allowed(parsed.as_str()) {
            let message = match hop {
                Hop::Initial => format!("URL not on allowlist: {raw}"),
                Hop::Redirect => format!("Redirect target not on allowlist: {raw}"),
            };
            return Err(GateError::new(ErrorCode::NotAllowlisted, message)
                .with_detail("url", raw)
                .with_detail("host", &parsed.host));
        }

        match resolve_and_classify(self.resolver, &parsed.host, parsed.port, self.allow_loopback)
            .await
        {
            Resolution::Clear(addrs) => Ok(Admitted { parsed, addrs }),
            Resolution::Blocked { ip, reason } => Err(GateError::new(
                ErrorCode::BlockedAddress,
                format!("Resolves to blocked IP: {ip}"),
            )
            .with_detail("host", &parsed.host)
            .with_detail("blocked_ip", ip.to_string())
            .with_detail("reason", reason)),
            Resolution::Unreachable { error } => Err(GateError::new(
                ErrorCode::HostUnreachable,
                format!("Host unreachable: {}", parsed.host),
            )
            .with_detail("host", &parsed.host)
            .with_detail("error", error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::Checkpoint;
    use crate::allowlist::Allowlist;
    use crate::error::{ErrorCode, ErrorKind};
    use crate::resolve::StaticResolver;
    use crate::validate::UrlPolicy;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn resolver() -> StaticResolver {
        StaticResolver::new()
            .with_host("en.wikipedia.org", [ip("208.80.154.224")])
            .with_host("internal.example.edu", [ip("10.0.0.7")])
    }

    #[tokio::test]
    async fn allowlisted_public_host_is_admitted() {
        let allowlist = Allowlist::defaults();
        let resolver = resolver();
        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, false);

        let admitted = checkpoint
            .admit("https://en.wikipedia.org/wiki/SSRF")
            .await
            .unwrap();
        assert_eq!(admitted.parsed.host, "en.wikipedia.org");
        assert_eq!(admitted.addrs, vec![ip("208.80.154.224")]);
    }

    #[tokio::test]
    async fn allowlist_runs_before_resolution() {
        let allowlist = Allowlist::defaults();
        // Resolver knows nothing: a lookup would report HostUnreachable.
        let resolver = StaticResolver::new();
        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, false);

        let err = checkpoint.admit("https://example.com/page").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAllowlisted);
        assert_eq!(err.kind(), ErrorKind::Allowlist);
        assert_eq!(err.message, "URL not on allowlist: https://example.com/page");
    }

    #[tokio::test]
    async fn allowlist_matches_the_normalised_url() {
        let allowlist = Allowlist::defaults();
        let resolver = resolver();
        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, false);

        let admitted = checkpoint
            .admit("https://EN.Wikipedia.ORG:443/wiki/SSRF")
            .await
            .unwrap();
        assert_eq!(admitted.parsed.as_str(), "https://en.wikipedia.org/wiki/SSRF");
        assert!(allowlist.is_allowed(admitted.parsed.as_str()));
    }

    #[tokio::test]
    async fn http_passes_the_allowlist_only_with_the_opt_in() {
        let allowlist = Allowlist::defaults();
        let resolver = resolver();
        let policy = UrlPolicy {
            allow_http: true,
            ..UrlPolicy::default()
        };
        let checkpoint = Checkpoint::new(policy, &allowlist, &resolver, false);
        let admitted = checkpoint
            .admit("http://en.wikipedia.org/wiki/SSRF")
            .await
            .unwrap();
        assert_eq!(admitted.parsed.scheme, "http");

        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, false);
        let err = checkpoint
            .admit("http://en.wikipedia.org/wiki/SSRF")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpNotAllowed);
    }

    #[tokio::test]
    async fn redirect_refusals_name_the_target() {
        let allowlist = Allowlist::defaults();
        let resolver = resolver();
        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, false);

        let err = checkpoint
            .admit_redirect("https://evil.example.com/")
            .await
            .unwrap_err();
        assert_eq!(
            err.message,
            "Redirect target not on allowlist: https://evil.example.com/"
        );
    }

    #[tokio::test]
    async fn internal_resolution_is_blocked() {
        let allowlist = Allowlist::defaults();
        let resolver = resolver();
        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, true);

        let err = checkpoint
            .admit("https://internal.example.edu/")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockedAddress);
        assert_eq!(err.kind(), ErrorKind::UrlBlocked);
        assert_eq!(err.detail("blocked_ip"), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn unresolvable_host_is_unreachable() {
        let allowlist = Allowlist::defaults();
        let resolver = resolver();
        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, false);

        let err = checkpoint
            .admit("https://nowhere.example.edu/")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::HostUnreachable);
        assert_eq!(err.message, "Host unreachable: nowhere.example.edu");
    }

    #[tokio::test]
    async fn syntactic_checks_come_first() {
        let allowlist = Allowlist::defaults();
        let resolver = resolver();
        let checkpoint = Checkpoint::new(UrlPolicy::default(), &allowlist, &resolver, true);

        let err = checkpoint.admit("file:///etc/passwd").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockedScheme);
        let err = checkpoint.admit("https://127.0.0.1/admin").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockedHost);
    }
}
