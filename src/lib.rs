//! linktrace Library
//!
//! This module exposes the linktrace components for use in integration tests
//! and as a library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::extract_client_ip;
pub use application::{LocationWorker, TrackingError, TrackingService};
pub use config::{load_config, Config};
pub use domain::entities::{AccessTrace, Coordinates, GeoResult, Link};
pub use domain::ports::{GeoResolver, LinkRepository, LookupError, ReverseGeocoder};
pub use domain::services::{build_masked_url, GeoChain, MaskTemplate};
pub use domain::value_objects::{Accuracy, GeoSource};
