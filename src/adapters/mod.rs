//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP); outbound adapters
//! implement the domain ports (geo providers, reverse geocoding, storage).

pub mod inbound;
pub mod outbound;
