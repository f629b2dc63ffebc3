//! Last-resort location guess from the first IPv4 octet.
//!
//! Used only after every provider failed. The table is intentionally tiny
//! and the result is tagged `very_low`.

use crate::domain::entities::{Coordinates, GeoResult};
use crate::domain::ports::LookupError;
use crate::domain::value_objects::Accuracy;
use std::net::IpAddr;

struct Bucket {
    first: u8,
    last: u8,
    location: &'static str,
    latitude: f64,
    longitude: f64,
}

// Inclusive numeric ranges on the first octet.
const BUCKETS: &[Bucket] = &[
    Bucket {
        first: 186,
        last: 189,
        location: "Brasil",
        latitude: -15.7801,
        longitude: -47.9292,
    },
    Bucket {
        first: 72,
        last: 79,
        location: "United States",
        latitude: 37.0902,
        longitude: -95.7129,
    },
    Bucket {
        first: 81,
        last: 91,
        location: "Europe",
        latitude: 48.8566,
        longitude: 2.3522,
    },
];

/// Guess a coarse location for a normalized address.
///
/// IPv4 addresses in a known bucket yield a heuristic result; other IPv4
/// and all IPv6 addresses yield the unresolved sentinel. Input that is not
/// an address at all is an error.
pub fn heuristic_lookup(ip: &str) -> Result<GeoResult, LookupError> {
    let addr: IpAddr = ip
        .parse()
        .map_err(|_| LookupError::MalformedAddress(ip.to_string()))?;

    let octet = match addr {
        IpAddr::V4(v4) => v4.octets()[0],
        IpAddr::V6(_) => return Ok(GeoResult::unresolved(ip)),
    };

    let result = BUCKETS
        .iter()
        .find(|b| (b.first..=b.last).contains(&octet))
        .map(|b| {
            GeoResult::heuristic(
                ip,
                b.location,
                Coordinates::new(b.latitude, b.longitude, Accuracy::VeryLow),
            )
        })
        .unwrap_or_else(|| GeoResult::unresolved(ip));

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::LOCATION_NOT_IDENTIFIED;
    use crate::domain::value_objects::GeoSource;

    #[test]
    fn test_brazil_bucket() {
        let geo = heuristic_lookup("187.45.1.2").unwrap();
        assert_eq!(geo.location, "Brasil");
        let coords = geo.coordinates.unwrap();
        assert_eq!(coords.accuracy, Accuracy::VeryLow);
        assert_eq!(coords.latitude, -15.7801);
        assert_eq!(geo.source, GeoSource::Heuristic);
    }

    #[test]
    fn test_bucket_edges() {
        assert_eq!(heuristic_lookup("186.0.0.1").unwrap().location, "Brasil");
        assert_eq!(heuristic_lookup("189.255.0.1").unwrap().location, "Brasil");
        assert_eq!(heuristic_lookup("72.0.0.1").unwrap().location, "United States");
        assert_eq!(heuristic_lookup("79.0.0.1").unwrap().location, "United States");
        assert_eq!(heuristic_lookup("81.0.0.1").unwrap().location, "Europe");
        assert_eq!(heuristic_lookup("91.0.0.1").unwrap().location, "Europe");
    }

    #[test]
    fn test_numeric_not_prefix_matching() {
        // "8" and "9" share a leading digit with the Europe bucket but are
        // outside 81..=91.
        assert_eq!(heuristic_lookup("8.8.8.8").unwrap().location, LOCATION_NOT_IDENTIFIED);
        assert_eq!(heuristic_lookup("9.9.9.9").unwrap().location, LOCATION_NOT_IDENTIFIED);
        assert_eq!(heuristic_lookup("80.1.1.1").unwrap().location, LOCATION_NOT_IDENTIFIED);
        assert_eq!(heuristic_lookup("92.1.1.1").unwrap().location, LOCATION_NOT_IDENTIFIED);
    }

    #[test]
    fn test_unknown_octet_has_no_coordinates() {
        let geo = heuristic_lookup("5.6.7.8").unwrap();
        assert_eq!(geo.location, LOCATION_NOT_IDENTIFIED);
        assert!(geo.coordinates.is_none());
        assert_eq!(geo.source, GeoSource::Unresolved);
    }

    #[test]
    fn test_ipv6_is_unresolved() {
        let geo = heuristic_lookup("2001:db8::1").unwrap();
        assert_eq!(geo.location, LOCATION_NOT_IDENTIFIED);
    }

    #[test]
    fn test_malformed_address_is_error() {
        let err = heuristic_lookup("abc.def").unwrap_err();
        assert!(matches!(err, LookupError::MalformedAddress(_)));
    }
}
