//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence label attached to IP-derived coordinates.
///
/// The label reflects which strategy produced the coordinates (provider
/// trust order), not a measured error radius. Variants are declared from
/// weakest to strongest so the derived ordering gives `High > VeryLow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    /// Coarse guess from a hard-coded address-block table
    VeryLow,
    /// Backup provider with weak validation
    Low,
    /// Free-tier providers with city-level validation
    Medium,
    /// Keyed provider returning coordinates directly
    High,
}

impl Accuracy {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which step of the resolution chain produced a `GeoResult`.
///
/// Exactly one source describes a result; the chain never merges data
/// from different steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoSource {
    /// Private, loopback or link-local address; no lookup was made
    Local,
    /// A public provider answered; carries the provider name
    Provider(String),
    /// Every provider failed and the address-block table matched
    Heuristic,
    /// Every provider failed and nothing matched
    Unresolved,
    /// The address could not be interpreted at all
    Error,
}

impl GeoSource {
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

impl Default for GeoSource {
    fn default() -> Self {
        Self::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_order() {
        assert!(Accuracy::High > Accuracy::Medium);
        assert!(Accuracy::Medium > Accuracy::Low);
        assert!(Accuracy::Low > Accuracy::VeryLow);
    }

    #[test]
    fn test_accuracy_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Accuracy::VeryLow).unwrap(), "\"very_low\"");
        assert_eq!(serde_json::to_string(&Accuracy::High).unwrap(), "\"high\"");
    }

    #[test]
    fn test_accuracy_display_matches_serde() {
        for acc in [Accuracy::VeryLow, Accuracy::Low, Accuracy::Medium, Accuracy::High] {
            let json = serde_json::to_string(&acc).unwrap();
            assert_eq!(json, format!("\"{}\"", acc));
        }
    }

    #[test]
    fn test_geo_source_serialization() {
        assert_eq!(serde_json::to_string(&GeoSource::Local).unwrap(), "\"local\"");
        assert_eq!(
            serde_json::to_value(GeoSource::Provider("ipapi.co".into())).unwrap(),
            serde_json::json!({ "provider": "ipapi.co" })
        );
    }

    #[test]
    fn test_geo_source_is_provider() {
        assert!(GeoSource::Provider("x".into()).is_provider());
        assert!(!GeoSource::Heuristic.is_provider());
        assert_eq!(GeoSource::default(), GeoSource::Unresolved);
    }
}
