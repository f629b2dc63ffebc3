//! Geo-Resolution Chain
//!
//! Turns a candidate client address into a `GeoResult` by trying an ordered
//! list of resolvers, then a local heuristic, then a sentinel.

use crate::domain::entities::GeoResult;
use crate::domain::ports::GeoResolver;
use crate::domain::services::address::{is_local_address, normalize_ip};
use crate::domain::services::heuristic::heuristic_lookup;
use std::sync::Arc;

/// Ordered cascade of geo resolvers.
///
/// Resolution steps:
/// 1. Normalize the address
/// 2. Short-circuit private/loopback/link-local addresses with no lookup
/// 3. Try each resolver once, in order; the first `Ok` wins
/// 4. Fall back to the first-octet heuristic
/// 5. Fall back to the lookup-error sentinel if the address is unusable
///
/// Resolvers are awaited one after the other; there is no fan-out.
#[derive(Clone, Default)]
pub struct GeoChain {
    resolvers: Vec<Arc<dyn GeoResolver>>,
}

impl GeoChain {
    /// Create a chain from resolvers in trust order (most trusted first).
    pub fn new(resolvers: Vec<Arc<dyn GeoResolver>>) -> Self {
        Self { resolvers }
    }

    /// Append a resolver at the lowest priority.
    pub fn with_resolver(mut self, resolver: Arc<dyn GeoResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Names of the configured resolvers, in order.
    pub fn resolver_names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Resolve an address. Never fails.
    pub async fn resolve(&self, raw_ip: &str) -> GeoResult {
        let ip = normalize_ip(raw_ip);

        if is_local_address(ip) {
            tracing::debug!("{} is a local address, skipping lookup", ip);
            return GeoResult::local(ip);
        }

        for resolver in &self.resolvers {
            match resolver.lookup(ip).await {
                Ok(geo) => {
                    tracing::debug!("{} resolved by {}: {}", ip, resolver.name(), geo.location);
                    return geo;
                }
                Err(e) => {
                    tracing::warn!(provider = resolver.name(), "geo lookup failed for {}: {}", ip, e);
                }
            }
        }

        match heuristic_lookup(ip) {
            Ok(geo) => {
                tracing::debug!("{} placed by heuristic: {}", ip, geo.location);
                geo
            }
            Err(e) => {
                tracing::warn!("heuristic lookup failed for {:?}: {}", ip, e);
                GeoResult::lookup_error(ip)
            }
        }
    }
}
