//! Client IP extraction
//!
//! Picks the visitor's address from proxy headers, falling back to the
//! socket peer.

use crate::domain::entities::UNKNOWN;
use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Headers consulted in priority order.
pub const CLIENT_IP_HEADERS: [&str; 6] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "true-client-ip",
    "x-client-ip",
    "forwarded",
];

/// Best-effort client address for a request.
///
/// The first header in `CLIENT_IP_HEADERS` carrying a non-empty value wins;
/// only the first comma-separated element is used. Values are not validated
/// as addresses. Without a usable header the peer's IP is returned, and
/// `"unknown"` when there is no peer either.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    CLIENT_IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next().map(str::trim))
        .find(|first| !first.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}
