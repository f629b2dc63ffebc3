//! Application Layer
//!
//! Use cases that orchestrate domain services and ports.

mod location_worker;
mod tracking_service;

pub use location_worker::{LocationWorker, LocationWorkerHandle, ReverseGeocodeJob};
pub use tracking_service::{NewLink, TrackingError, TrackingService, Visit, DIRECT_REFERER};
