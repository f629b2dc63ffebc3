//! Nominatim Reverse Geocoder
//!
//! Implements ReverseGeocoder using the OpenStreetMap Nominatim API.

use super::http_geo_resolvers::fetch_json;
use crate::domain::entities::AddressDetails;
use crate::domain::ports::{LookupError, ReverseGeocoder};
use async_trait::async_trait;
use serde::Deserialize;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    house_number: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
    postcode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

impl NominatimResponse {
    fn into_details(self) -> Result<AddressDetails, LookupError> {
        let address = self
            .address
            .ok_or(LookupError::Rejected("no address in response"))?;

        Ok(AddressDetails {
            road: address.road,
            house_number: address.house_number,
            neighbourhood: address.neighbourhood.or(address.suburb),
            city: address.city.or(address.town).or(address.village),
            state: address.state,
            country: address.country,
            postcode: address.postcode,
            formatted: self.display_name,
        })
    }
}

/// Reverse geocoder backed by Nominatim.
///
/// Nominatim's usage policy requires an identifying User-Agent; the shared
/// client built by `build_client` sets one.
pub struct NominatimReverseGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimReverseGeocoder {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, NOMINATIM_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimReverseGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<AddressDetails, LookupError> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let request = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("zoom", "18"),
                ("addressdetails", "1"),
            ]);

        let body: NominatimResponse = fetch_json(request).await?;
        body.into_details()
    }
}
