//! Name resolution followed by address classification.
//!
//! Every address a host resolves to is classified; one internal address blocks
//! the whole host. The approved addresses are what the transport pins its
//! connection to, so a later lookup can never substitute a different answer.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;

use tokio::net::lookup_host;

use crate::classify::{blocked_ip_reason, is_loopback, unwrap_brackets};

pub type ResolveFut<'a> = Pin<Box<dyn Future<Output = io::Result<Vec<IpAddr>>> + Send + 'a>>;

/// A/AAAA lookup.
pub trait Resolver: Send + Sync {
    fn lookup<'a>(&'a self, host: &'a str, port: u16) -> ResolveFut<'a>;
}

/// The operating system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn lookup<'a>(&'a self, host: &'a str, port: u16) -> ResolveFut<'a> {
        Box::pin(async move {
            let addrs = lookup_host((host, port)).await?;
            Ok(addrs.map(|addr| addr.ip()).collect())
        })
    }
}

/// Fixed host-to-address table. Unknown hosts fail as NXDOMAIN would.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    entries: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, ips: impl IntoIterator<Item = IpAddr>) -> Self {
        self.entries
            .insert(host.to_ascii_lowercase(), ips.into_iter().collect());
        self
    }
}

impl Resolver for StaticResolver {
    fn lookup<'a>(&'a self, host: &'a str, _port: u16) -> ResolveFut<'a> {
        let result = self
            .entries
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such host: {host}"))
            });
        Box::pin(async move { result })
    }
}

/// Outcome of [`resolve_and_classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every address is public. Sorted, deduplicated, never empty.
    Clear(Vec<IpAddr>),
    /// At least one address is internal.
    Blocked { ip: IpAddr, reason: &'static str },
    /// Lookup failed or returned nothing.
    Unreachable { error: String },
}

/// Resolve `host` and classify every returned address.
///
/// Literal IPs skip the lookup. With `allow_loopback`, loopback addresses are
/// accepted; every other internal range stays blocked.
pub async fn resolve_and_classify(
    resolver: &dyn Resolver,
    host: &str,
    port: u16,
    allow_loopback: bool,
) -> Resolution {
    let host = unwrap_brackets(host);

    let mut ips = if let Ok(ip) = host.parse::<IpAddr>() {
        vec![ip]
    } else {
        match resolver.lookup(host, port).await {
            Ok(ips) => ips,
            Err(e) => {
                return Resolution::Unreachable {
                    error: e.to_string(),
                };
            }
        }
    };

    if ips.is_empty() {
        return Resolution::Unreachable {
            error: "lookup returned no addresses".to_string(),
        };
    }

    sort_ips(&mut ips);
    ips.dedup();

    for ip in &ips {
        if allow_loopback && is_loopback(*ip) {
            continue;
        }
        if let Some(reason) = blocked_ip_reason(*ip) {
            return Resolution::Blocked { ip: *ip, reason };
        }
    }

    tracing::debug!(host, addresses = ?ips, "host resolved");
    Resolution::Clear(ips)
}

fn sort_ips(ips: &mut [IpAddr]) {
    ips.sort_by(|a, b| match (a, b) {
        (IpAddr::V4(a4), IpAddr::V4(b4)) => a4.octets().cmp(&b4.octets()),
        (IpAddr::V6(a6), IpAddr::V6(b6)) => a6.octets().cmp(&b6.octets()),
        (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Less,
        (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Greater,
    });
}
