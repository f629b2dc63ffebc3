//! Reverse Geocoder Port
//!
//! Defines the interface for turning coordinates into a street address.

use crate::domain::entities::AddressDetails;
use crate::domain::ports::LookupError;
use async_trait::async_trait;

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<AddressDetails, LookupError>;
}
