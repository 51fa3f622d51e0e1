//! Redirect-following transport.
//!
//! Redirects are never followed by the client. Each 3xx is drained, counted,
//! resolved against the current URL, and sent back through the [`Checkpoint`]
//! before the next request. Every hop's connection is pinned to the addresses
//! its checkpoint just classified. Bodies are streamed under a byte cap and one
//! deadline covers the whole exchange.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::Client;
use reqwest::redirect::Policy;
use tokio::time::{Instant, timeout};
use url::Url;

use crate::checkpoint::{Admitted, Checkpoint};
use crate::classify::unwrap_brackets;
use crate::config::ResolvedConfig;
use crate::error::{ErrorCode, GateError};

const ACCEPT_VALUE: &str =
    "text/html,application/xhtml+xml,text/plain;q=0.9,application/pdf;q=0.8,*/*;q=0.1";

/// Final response of a fetch, after all redirects.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub final_url: Url,
    pub status: u16,
    /// Raw `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// At most `max_response_bytes` long.
    pub body: Vec<u8>,
    /// The body was cut at the byte cap.
    pub truncated: bool,
    /// Redirects followed.
    pub hops: u32,
}

/// Redirect bookkeeping: the URL being fetched and how many hops led there.
#[derive(Debug, Clone)]
pub struct RedirectChain {
    origin: Url,
    current: Url,
    hops: u32,
    max_hops: u32,
}

impl RedirectChain {
    #[must_use]
    pub fn new(origin: Url, max_hops: u32) -> Self {
        Self {
            current: origin.clone(),
            origin,
            hops: 0,
            max_hops,
        }
    }

    #[must_use]
    pub fn current(&self) -> &Url {
        &self.current
    }

    #[must_use]
    pub fn hops(&self) -> u32 {
        self.hops
    }

    /// Count a redirect response and resolve its `Location` to an absolute URL.
    ///
    /// The ceiling is checked before the header, so a fourth redirect fails as
    /// a redirect-limit error even when it has no `Location`.
    pub fn follow(&mut self, location: Option<&str>) -> Result<Url, GateError> {
        self.hops += 1;
        if self.hops > self.max_hops {
            return Err(GateError::new(
                ErrorCode::RedirectLimit,
                format!("Too many redirects: {}", self.origin),
            )
            .with_detail("count", self.hops.to_string())
            .with_detail("max", self.max_hops.to_string()));
        }

        let location = location.map(str::trim).unwrap_or_default();
        if location.is_empty() {
            return Err(GateError::new(
                ErrorCode::MissingLocation,
                "Redirect without Location header",
            )
            .with_detail("url", self.current.as_str()));
        }

        let next = self.current.join(location).map_err(|e| {
            GateError::new(
                ErrorCode::InvalidRedirect,
                format!("Redirect Location could not be resolved: {e}"),
            )
            .with_detail("redirect_url", location)
        })?;

        Ok(next)
    }

    /// Move to a target the checkpoint admitted.
    pub fn advance(&mut self, next: Url) {
        self.current = next;
    }
}

pub struct Transport<'a> {
    config: &'a ResolvedConfig,
}

impl<'a> Transport<'a> {
    #[must_use]
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self { config }
    }

    /// GET `start`, following redirects through `checkpoint`.
    pub async fn fetch(
        &self,
        start: Admitted,
        checkpoint: &Checkpoint<'_>,
    ) -> Result<HttpResponse, GateError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut chain = RedirectChain::new(start.parsed.url.clone(), self.config.max_redirects);
        let mut addrs = start.addrs;
        let mut port = start.parsed.port;

        loop {
            let response = self
                .send_pinned(chain.current(), &addrs, port, deadline)
                .await?;
            let status = response.status().as_u16();
            tracing::debug!(url = %chain.current(), status, hop = chain.hops(), "response received");

            if (300..400).contains(&status) {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                self.drain(response, deadline).await?;

                let next = chain.follow(location.as_deref())?;
                let admitted = checkpoint.admit_redirect(next.as_str()).await?;
                tracing::debug!(from = %chain.current(), to = %admitted.parsed.url, "following redirect");

                addrs = admitted.addrs;
                port = admitted.parsed.port;
                chain.advance(admitted.parsed.url);
                continue;
            }

            if status >= 400 {
                return Err(GateError::new(
                    ErrorCode::HttpStatus,
                    format!("HTTP {status}: {}", chain.current()),
                )
                .with_detail("status", status.to_string())
                .with_detail("url", chain.current().as_str()));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let (body, truncated) = self.read_capped(response, deadline).await?;
            if truncated {
                tracing::debug!(
                    url = %chain.current(),
                    max_bytes = self.config.max_response_bytes,
                    "response truncated at size limit"
                );
            }

            return Ok(HttpResponse {
                final_url: chain.current().clone(),
                status,
                content_type,
                body,
                truncated,
                hops: chain.hops(),
            });
        }
    }

    /// Send one GET, trying each approved address in order.
    async fn send_pinned(
        &self,
        url: &Url,
        addrs: &[IpAddr],
        port: u16,
        deadline: Instant,
    ) -> Result<reqwest::Response, GateError> {
        let host = url
            .host_str()
            .ok_or_else(|| GateError::new(ErrorCode::InvalidUrl, "URL has no host"))?;
        let is_literal = unwrap_brackets(host).parse::<IpAddr>().is_ok();

        let mut first_error: Option<String> = None;
        let mut attempted = Vec::new();

        for ip in addrs {
            attempted.push(ip.to_string());
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.deadline_error());
            }

            let client = self.build_client(host, *ip, port, !is_literal)?;
            let request = client.get(url.clone()).header(ACCEPT, ACCEPT_VALUE);

            match timeout(remaining, request.send()).await {
                Err(_) => return Err(self.deadline_error()),
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) => {
                    tracing::debug!(ip = %ip, error = %err, "connection attempt failed");
                    if err.is_timeout() {
                        return Err(self.deadline_error());
                    }
                    first_error.get_or_insert_with(|| err.to_string());
                }
            }
        }

        let error = first_error.unwrap_or_else(|| "no addresses to connect to".to_string());
        Err(
            GateError::new(ErrorCode::Network, format!("Request failed: {error}"))
                .with_detail("url", url.as_str())
                .with_detail("attempted_ips", attempted.join(",")),
        )
    }

    fn build_client(
        &self,
        host: &str,
        ip: IpAddr,
        port: u16,
        pin_dns: bool,
    ) -> Result<Client, GateError> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .user_agent(&self.config.user_agent)
            .no_proxy()
            .timeout(self.config.timeout);

        if pin_dns {
            builder = builder.resolve(host, SocketAddr::new(ip, port));
        }

        builder.build().map_err(|e| {
            GateError::new(
                ErrorCode::Internal,
                format!("failed to build HTTP client: {e}"),
            )
        })
    }

    /// Stream the body, keeping at most `max_response_bytes`.
    async fn read_capped(
        &self,
        response: reqwest::Response,
        deadline: Instant,
    ) -> Result<(Vec<u8>, bool), GateError> {
        let max_bytes = self.config.max_response_bytes;
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.deadline_error());
            }
            let next = timeout(remaining, stream.next())
                .await
                .map_err(|_| self.deadline_error())?;
            let Some(chunk) = next else {
                return Ok((body, false));
            };
            let chunk = chunk.map_err(|e| {
                GateError::new(ErrorCode::Network, format!("Request failed: {e}"))
                    .with_detail("error", e.to_string())
            })?;

            let room = max_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                // Exactly at the cap is only a truncation if more data follows.
                if chunk.len() > room {
                    return Ok((body, true));
                }
                return match timeout(remaining, stream.next()).await {
                    Ok(None) => Ok((body, false)),
                    _ => Ok((body, true)),
                };
            }
            body.extend_from_slice(&chunk);
        }
    }

    /// Discard a redirect body so the connection is released; bounded by the
    /// byte cap and the deadline.
    async fn drain(&self, response: reqwest::Response, deadline: Instant) -> Result<(), GateError> {
        let mut drained = 0usize;
        let mut stream = response.bytes_stream();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.deadline_error());
            }
            match timeout(remaining, stream.next()).await {
                Err(_) => return Err(self.deadline_error()),
                Ok(None | Some(Err(_))) => return Ok(()),
                Ok(Some(Ok(chunk))) => {
                    drained += chunk.len();
                    if drained > self.config.max_response_bytes {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn deadline_error(&self) -> GateError {
        let timeout: Duration = self.config.timeout;
        GateError::new(
            ErrorCode::Network,
            format!("Request failed: deadline of {}s exceeded", timeout.as_secs()),
        )
        .with_detail("timeout_ms", (timeout.as_millis() as u64).to_string())
    }
}
