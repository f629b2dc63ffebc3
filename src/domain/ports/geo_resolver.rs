//! GeoIP Resolver Port
//!
//! Defines the interface for resolving IP addresses to geographic locations.

use crate::domain::entities::GeoResult;
use async_trait::async_trait;

/// Why a single resolver attempt produced nothing usable.
///
/// None of these escape the resolution chain; they are logged and the
/// chain moves on to the next strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("payload rejected: {0}")]
    Rejected(&'static str),
    #[error("malformed address: {0}")]
    MalformedAddress(String),
}

/// Resolver for IP address to geographic location.
///
/// This is an outbound port that abstracts one external lookup strategy.
/// Implementations make a single attempt with no retries.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Short provider name used in logs and in `GeoSource::Provider`.
    fn name(&self) -> &'static str;

    /// Resolve a normalized, public IP address.
    ///
    /// Returns a `LookupError` for network failures, timeouts, non-2xx
    /// responses and payloads that fail validation.
    async fn lookup(&self, ip: &str) -> Result<GeoResult, LookupError>;
}
