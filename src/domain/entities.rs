//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the linktrace domain.
//! They have no external dependencies beyond serialization.

use crate::domain::value_objects::{Accuracy, GeoSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default for ISP/ASN/org fields a provider did not fill in.
pub const UNKNOWN: &str = "unknown";
/// Location label for private, loopback and link-local addresses.
pub const LOCATION_LOCAL: &str = "Local (simulated)";
/// Location label when no strategy could place the address.
pub const LOCATION_NOT_IDENTIFIED: &str = "Location not identified";
/// Location label when the address itself could not be interpreted.
pub const LOCATION_LOOKUP_ERROR: &str = "Lookup error";

/// Latitude/longitude pair with a trust label.
///
/// Both numbers are always present together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Accuracy,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64, accuracy: Accuracy) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }

    /// Build coordinates only when both halves are present and finite.
    pub fn from_pair(
        latitude: Option<f64>,
        longitude: Option<f64>,
        accuracy: Accuracy,
    ) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self::new(lat, lon, accuracy))
            }
            _ => None,
        }
    }
}

/// Geographic information resolved from a visitor's IP address.
///
/// Computed once per visit before the trace is stored and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResult {
    /// Normalized address (IPv6-mapped-IPv4 prefix stripped), never empty
    pub ip: String,
    /// "city, region, country" or one of the `LOCATION_*` labels
    pub location: String,
    pub isp: String,
    pub asn: String,
    pub org: String,
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(default)]
    pub source: GeoSource,
}

impl GeoResult {
    fn base(ip: &str, location: &str, source: GeoSource) -> Self {
        let ip = if ip.is_empty() { UNKNOWN } else { ip };
        Self {
            ip: ip.to_string(),
            location: location.to_string(),
            isp: UNKNOWN.to_string(),
            asn: UNKNOWN.to_string(),
            org: UNKNOWN.to_string(),
            coordinates: None,
            timezone: None,
            currency: None,
            continent: None,
            source,
        }
    }

    /// Fixed result for addresses that public providers cannot resolve.
    pub fn local(ip: &str) -> Self {
        let mut geo = Self::base(ip, LOCATION_LOCAL, GeoSource::Local);
        geo.isp = "Local Network".to_string();
        geo.asn = "N/A".to_string();
        geo.org = "Local Network".to_string();
        geo
    }

    /// Empty provider result; the adapter fills in what its payload carries.
    pub fn from_provider(ip: &str, provider: &str, location: String) -> Self {
        let mut geo = Self::base(ip, UNKNOWN, GeoSource::Provider(provider.to_string()));
        if !location.is_empty() {
            geo.location = location;
        }
        geo
    }

    /// Coarse result from the address-block table.
    pub fn heuristic(ip: &str, location: &str, coordinates: Coordinates) -> Self {
        let mut geo = Self::base(ip, location, GeoSource::Heuristic);
        geo.coordinates = Some(coordinates);
        geo
    }

    /// Nothing could place the address.
    pub fn unresolved(ip: &str) -> Self {
        Self::base(ip, LOCATION_NOT_IDENTIFIED, GeoSource::Unresolved)
    }

    /// The address could not be interpreted.
    pub fn lookup_error(ip: &str) -> Self {
        Self::base(ip, LOCATION_LOOKUP_ERROR, GeoSource::Error)
    }
}

/// Join the non-empty parts of a location with ", ".
pub fn format_location(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A tracking link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub target_url: String,
    /// Display URL generated from a template or supplied by the creator
    #[serde(default)]
    pub masked_url: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Client address of whoever created the link
    pub created_by: String,
}

/// Browser-supplied position, posted after the visitor grants permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreciseLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub altitude_accuracy: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    /// Epoch milliseconds reported by the browser
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl PreciseLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            altitude: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
            timestamp: None,
        }
    }
}

/// Street address reverse-geocoded from a precise location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressDetails {
    pub road: Option<String>,
    pub house_number: Option<String>,
    pub neighbourhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub formatted: Option<String>,
}

/// One recorded visit to a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTrace {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub ip_info: GeoResult,
    pub user_agent: Option<String>,
    pub referer: String,
    /// Unique per visit; later updates are keyed by it
    pub access_id: String,
    pub precise_location: Option<PreciseLocation>,
    pub address_details: Option<AddressDetails>,
}

impl AccessTrace {
    /// Apply a patch in place. Only the fields the patch carries change.
    pub fn apply(&mut self, patch: &TracePatch) {
        if let Some(loc) = &patch.precise_location {
            self.precise_location = Some(loc.clone());
        }
        if let Some(addr) = &patch.address_details {
            self.address_details = Some(addr.clone());
        }
    }
}

/// Out-of-band update to an existing trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TracePatch {
    pub precise_location: Option<PreciseLocation>,
    pub address_details: Option<AddressDetails>,
}

impl TracePatch {
    pub fn precise_location(location: PreciseLocation) -> Self {
        Self {
            precise_location: Some(location),
            address_details: None,
        }
    }

    pub fn address_details(details: AddressDetails) -> Self {
        Self {
            precise_location: None,
            address_details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trace() -> AccessTrace {
        AccessTrace {
            timestamp: Utc::now(),
            ip: "8.8.8.8".to_string(),
            ip_info: GeoResult::unresolved("8.8.8.8"),
            user_agent: Some("curl/8.0".to_string()),
            referer: "direct".to_string(),
            access_id: "acc-1".to_string(),
            precise_location: None,
            address_details: None,
        }
    }

    // ===== Coordinates Tests =====

    #[test]
    fn test_coordinates_from_pair_requires_both() {
        assert!(Coordinates::from_pair(Some(1.0), None, Accuracy::Medium).is_none());
        assert!(Coordinates::from_pair(None, Some(1.0), Accuracy::Medium).is_none());
        let c = Coordinates::from_pair(Some(1.5), Some(-2.5), Accuracy::Low).unwrap();
        assert_eq!(c.latitude, 1.5);
        assert_eq!(c.longitude, -2.5);
        assert_eq!(c.accuracy, Accuracy::Low);
    }

    #[test]
    fn test_coordinates_from_pair_rejects_nan() {
        assert!(Coordinates::from_pair(Some(f64::NAN), Some(1.0), Accuracy::High).is_none());
    }

    // ===== GeoResult Tests =====

    #[test]
    fn test_local_result() {
        let geo = GeoResult::local("127.0.0.1");
        assert_eq!(geo.location, LOCATION_LOCAL);
        assert_eq!(geo.isp, "Local Network");
        assert_eq!(geo.asn, "N/A");
        assert!(geo.coordinates.is_none());
        assert_eq!(geo.source, GeoSource::Local);
    }

    #[test]
    fn test_empty_ip_becomes_unknown() {
        assert_eq!(GeoResult::lookup_error("").ip, UNKNOWN);
        assert_eq!(GeoResult::unresolved("").ip, UNKNOWN);
    }

    #[test]
    fn test_from_provider_defaults() {
        let geo = GeoResult::from_provider("1.1.1.1", "ipapi.co", String::new());
        assert_eq!(geo.location, UNKNOWN);
        assert_eq!(geo.isp, UNKNOWN);
        assert_eq!(geo.source, GeoSource::Provider("ipapi.co".to_string()));
    }

    #[test]
    fn test_geo_result_json_shape() {
        let geo = GeoResult::unresolved("5.5.5.5");
        let json = serde_json::to_value(&geo).unwrap();
        assert!(json["coordinates"].is_null());
        assert!(json.get("timezone").is_none());
        assert_eq!(json["location"], LOCATION_NOT_IDENTIFIED);
    }

    #[test]
    fn test_format_location_skips_empty_parts() {
        assert_eq!(
            format_location(&[Some("Campinas"), Some(""), Some("Brazil")]),
            "Campinas, Brazil"
        );
        assert_eq!(
            format_location(&[Some("Paris"), Some("Ile-de-France"), Some("France")]),
            "Paris, Ile-de-France, France"
        );
        assert_eq!(format_location(&[None, None]), "");
    }

    // ===== AccessTrace Tests =====

    #[test]
    fn test_trace_serializes_camel_case() {
        let json = serde_json::to_value(sample_trace()).unwrap();
        assert!(json.get("ipInfo").is_some());
        assert!(json.get("accessId").is_some());
        assert!(json["preciseLocation"].is_null());
    }

    #[test]
    fn test_apply_patch_is_idempotent() {
        let mut trace = sample_trace();
        let patch = TracePatch::precise_location(PreciseLocation::new(-23.5, -46.6));

        trace.apply(&patch);
        let once = trace.clone();
        trace.apply(&patch);

        assert_eq!(trace, once);
        assert_eq!(trace.precise_location.as_ref().unwrap().latitude, -23.5);
    }

    #[test]
    fn test_apply_patch_keeps_other_fields() {
        let mut trace = sample_trace();
        trace.apply(&TracePatch::precise_location(PreciseLocation::new(1.0, 2.0)));
        trace.apply(&TracePatch::address_details(AddressDetails {
            city: Some("Lisbon".to_string()),
            ..Default::default()
        }));

        assert!(trace.precise_location.is_some());
        assert_eq!(
            trace.address_details.unwrap().city.as_deref(),
            Some("Lisbon")
        );
    }

    #[test]
    fn test_precise_location_deserializes_browser_payload() {
        let loc: PreciseLocation = serde_json::from_value(serde_json::json!({
            "latitude": 48.85,
            "longitude": 2.35,
            "accuracy": 12.0,
            "altitude": null,
            "altitudeAccuracy": null,
            "heading": null,
            "speed": null,
            "timestamp": 1700000000000i64
        }))
        .unwrap();
        assert_eq!(loc.accuracy, Some(12.0));
        assert_eq!(loc.timestamp, Some(1_700_000_000_000));
    }
}
