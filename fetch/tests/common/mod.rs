//! Shared fixtures: a gate wired to a wiremock server through fake DNS.

#![allow(dead_code)]

use std::env;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, Once};

use fetchgate_fetch::config::SecurityConfig;
use fetchgate_fetch::{AuditEvent, AuditSink, FetchGate, GateConfig, ResolvedConfig, StaticResolver};
use wiremock::MockServer;

/// Allowlisted via `*.edu`, resolves to the mock server.
pub const PAPERS_HOST: &str = "papers.example.edu";
/// Allowlisted via `*.edu`, resolves to the mock server.
pub const MIRROR_HOST: &str = "mirror.example.edu";
/// Allowlisted via `*.edu`, resolves to a private address.
pub const INTERNAL_HOST: &str = "internal.example.edu";
/// Not allowlisted, resolves to the mock server.
pub const EVIL_HOST: &str = "evil.example.com";

pub fn enable_loopback_opt_in_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // SAFETY: integration tests reach wiremock over loopback; set once and never mutated.
        unsafe {
            env::set_var("FETCHGATE_ALLOW_INSECURE_OVERRIDES", "1");
        }
    });
}

pub fn test_config() -> GateConfig {
    enable_loopback_opt_in_for_tests();
    GateConfig {
        allow_http: true,
        user_agent: Some("fetchgate-test/1.0".to_string()),
        timeout_seconds: Some(5),
        rate_interval_ms: Some(0),
        allowlist: None,
        security: Some(SecurityConfig {
            allow_loopback: true,
        }),
    }
}

pub fn test_resolver() -> StaticResolver {
    let loopback: IpAddr = "127.0.0.1".parse().unwrap();
    StaticResolver::new()
        .with_host(PAPERS_HOST, [loopback])
        .with_host(MIRROR_HOST, [loopback])
        .with_host(EVIL_HOST, [loopback])
        .with_host(INTERNAL_HOST, ["10.0.0.7".parse().unwrap()])
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn gate_with(config: &GateConfig) -> (FetchGate, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let gate = FetchGate::new(ResolvedConfig::from_config(config))
        .with_resolver(Arc::new(test_resolver()))
        .with_audit_sink(sink.clone());
    (gate, sink)
}

pub fn gate() -> (FetchGate, Arc<RecordingSink>) {
    gate_with(&test_config())
}

/// `http://<host>:<mock port><path>`
pub fn url_for(server: &MockServer, host: &str, path: &str) -> String {
    format!("http://{host}:{}{path}", server.address().port())
}

pub fn article_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title><style>p {{ margin: 0 }}</style></head>
<body>
  <nav><a href="/">Home</a></nav>
  <main>
    <h1>{title}</h1>
    <p>{body}</p>
  </main>
  <footer>Site footer</footer>
</body>
</html>"#
    )
}
