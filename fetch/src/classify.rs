//! Host and IP classification.
//!
//! Decides whether a literal address is internal (private, loopback, link-local,
//! reserved, unspecified) and whether a hostname is one of the fixed local names.
//! Classification is pure: no resolution happens here.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Hostnames blocked without resolution.
pub const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "localhost.localdomain"];

/// Internal address ranges, with the reason reported when an address falls inside.
const BLOCKED_RANGES: &[(&str, &str)] = &[
    // IPv4
    ("0.0.0.0/8", "unspecified address"),
    ("10.0.0.0/8", "private address"),
    ("100.64.0.0/10", "shared address space"),
    ("127.0.0.0/8", "loopback address"),
    ("169.254.0.0/16", "link-local address"),
    ("172.16.0.0/12", "private address"),
    ("192.0.0.0/24", "reserved address"),
    ("192.0.2.0/24", "reserved address"),
    ("192.168.0.0/16", "private address"),
    ("198.18.0.0/15", "reserved address"),
    ("198.51.100.0/24", "reserved address"),
    ("203.0.113.0/24", "reserved address"),
    ("224.0.0.0/4", "multicast address"),
    ("240.0.0.0/4", "reserved address"),
    ("255.255.255.255/32", "broadcast address"),
    // IPv6
    ("::/128", "unspecified address"),
    ("::1/128", "loopback address"),
    ("100::/64", "reserved address"),
    ("2001::/23", "reserved address"),
    ("2001:db8::/32", "reserved address"),
    ("fc00::/7", "private address"),
    ("fe80::/10", "link-local address"),
    ("fec0::/10", "link-local address"),
    ("ff00::/8", "multicast address"),
    // IANA-reserved IPv6 space; everything outside 2000::/3 except the blocks above.
    // More specific entries must stay above these: the first match names the reason.
    ("::/8", "reserved address"),
    ("100::/8", "reserved address"),
    ("200::/7", "reserved address"),
    ("400::/6", "reserved address"),
    ("800::/5", "reserved address"),
    ("1000::/4", "reserved address"),
    ("4000::/3", "reserved address"),
    ("6000::/3", "reserved address"),
    ("8000::/3", "reserved address"),
    ("a000::/3", "reserved address"),
    ("c000::/3", "reserved address"),
    ("e000::/4", "reserved address"),
    ("f000::/5", "reserved address"),
    ("f800::/6", "reserved address"),
    ("fe00::/9", "reserved address"),
];

/// Outcome of classifying a host token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Blocked { reason: &'static str },
    Clear,
}

impl Classification {
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Classification::Blocked { .. })
    }
}

/// Classify a host token: a literal IP (optionally bracketed) or a hostname.
///
/// Hostnames other than the fixed local names are `Clear` here; the allowlist
/// constrains them independently.
#[must_use]
pub fn classify(token: &str) -> Classification {
    let token = unwrap_brackets(token.trim());

    if let Ok(ip) = token.parse::<IpAddr>() {
        return match blocked_ip_reason(ip) {
            Some(reason) => Classification::Blocked { reason },
            None => Classification::Clear,
        };
    }

    if is_blocked_hostname(token) {
        return Classification::Blocked {
            reason: "local hostname",
        };
    }

    Classification::Clear
}

/// Strip one pair of IPv6 literal brackets (`[::1]` -> `::1`).
#[must_use]
pub fn unwrap_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Whether `host` is one of the fixed local names. Case-insensitive; one trailing dot is ignored.
#[must_use]
pub fn is_blocked_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    BLOCKED_HOSTNAMES
        .iter()
        .any(|blocked| host.eq_ignore_ascii_case(blocked))
}

/// Return the reason an address is internal, or `None` for globally routable addresses.
#[must_use]
pub fn blocked_ip_reason(ip: IpAddr) -> Option<&'static str> {
    if let IpAddr::V6(v6) = ip
        && let Some(v4) = embedded_ipv4(v6)
    {
        return blocked_ipv4_reason(v4);
    }

    match ip {
        IpAddr::V4(v4) => blocked_ipv4_reason(v4),
        IpAddr::V6(v6) => blocked_ipv6_reason(v6),
    }
}

#[must_use]
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    blocked_ip_reason(ip).is_some()
}

#[must_use]
pub fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || embedded_ipv4(v6).is_some_and(|v4| v4.is_loopback()),
    }
}

fn blocked_ipv4_reason(ip: Ipv4Addr) -> Option<&'static str> {
    let octets = ip.octets();
    BLOCKED_RANGES
        .iter()
        .find(|(cidr, _)| parse_cidr(cidr).is_some_and(|c| c.contains_v4(&octets)))
        .map(|(_, reason)| *reason)
}

fn blocked_ipv6_reason(ip: Ipv6Addr) -> Option<&'static str> {
    let octets = ip.octets();
    BLOCKED_RANGES
        .iter()
        .find(|(cidr, _)| parse_cidr(cidr).is_some_and(|c| c.contains_v6(&octets)))
        .map(|(_, reason)| *reason)
}

/// IPv4 address carried inside an IPv6 address: mapped (`::ffff:0:0/96`),
/// compatible (`::/96`, excluding `::` and `::1`), or NAT64 (`64:ff9b::/96`).
fn embedded_ipv4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }

    let segments = ip.segments();
    let tail = Ipv4Addr::new(
        (segments[6] >> 8) as u8,
        segments[6] as u8,
        (segments[7] >> 8) as u8,
        segments[7] as u8,
    );

    if segments[..6] == [0, 0, 0, 0, 0, 0] && (segments[6] != 0 || segments[7] > 1) {
        return Some(tail);
    }

    if segments[..6] == [0x64, 0xff9b, 0, 0, 0, 0] {
        return Some(tail);
    }

    None
}

struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    fn contains_v4(&self, ip: &[u8; 4]) -> bool {
        match self.network {
            IpAddr::V4(net) => prefix_match(ip, &net.octets(), self.prefix),
            IpAddr::V6(_) => false,
        }
    }

    fn contains_v6(&self, ip: &[u8; 16]) -> bool {
        match self.network {
            IpAddr::V6(net) => prefix_match(ip, &net.octets(), self.prefix),
            IpAddr::V4(_) => false,
        }
    }
}

fn parse_cidr(text: &str) -> Option<Cidr> {
    let (addr, prefix) = text.split_once('/')?;
    let network = addr.parse::<IpAddr>().ok()?;
    let prefix = prefix.parse::<u8>().ok()?;
    match network {
        IpAddr::V4(_) if prefix > 32 => return None,
        IpAddr::V6(_) if prefix > 128 => return None,
        _ => {}
    }
    Some(Cidr { network, prefix })
}

fn prefix_match(ip: &[u8], net: &[u8], prefix: u8) -> bool {
    if prefix == 0 {
        return true;
    }
    let full = (prefix / 8) as usize;
    let rem = prefix % 8;

    if ip.len() < full || net.len() < full {
        return false;
    }

    if ip[..full] != net[..full] {
        return false;
    }

    if rem == 0 {
        return true;
    }

    let mask = 0xFFu8 << (8 - rem);
    ip[full] & mask == net[full] & mask
}
