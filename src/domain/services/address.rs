//! Address helpers shared by the resolution chain.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const MAPPED_V4_PREFIX: &str = "::ffff:";

/// Trim and strip an IPv6-mapped-IPv4 prefix (`::ffff:1.2.3.4` -> `1.2.3.4`).
pub fn normalize_ip(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.get(..MAPPED_V4_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(MAPPED_V4_PREFIX) => {
            &trimmed[MAPPED_V4_PREFIX.len()..]
        }
        _ => trimmed,
    }
}

/// Whether public geo-IP providers cannot say anything useful about `ip`.
///
/// Covers loopback, RFC 1918 private ranges, link-local and unspecified
/// addresses for IPv4; loopback, unspecified, link-local (`fe80::/10`) and
/// unique-local (`fc00::/7`) for IPv6. Strings that do not parse as an
/// address are not local.
pub fn is_local_address(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => is_local_v4(&v4),
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => is_local_v4(&v4),
            None => is_local_v6(&v6),
        },
        Err(_) => false,
    }
}

fn is_local_v4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_local_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80
        || (first & 0xfe00) == 0xfc00
}
