//! Facility registry records and provenance tags.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Source marker carried by synthesized placeholder records.
pub const SYNTHESIZED_SOURCE: &str = "INTELLIGENT_SAMPLE";

/// A facility as normalized from any registry schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FacilityRecord {
    pub registry_id: String,
    pub facility_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    /// Registry (or synthesized marker) the record was normalized from.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_note: Option<String>,
}

impl FacilityRecord {
    pub fn new(registry_id: impl Into<String>, facility_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            registry_id: registry_id.into(),
            facility_name: facility_name.into(),
            state: None,
            county: None,
            city: None,
            zip_code: None,
            source: source.into(),
            industry_type: None,
            confidence_note: None,
        }
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    /// True for placeholder records produced when every registry tier failed.
    pub fn is_synthesized(&self) -> bool {
        self.source == SYNTHESIZED_SOURCE
    }

    pub fn in_state(&self, state: &str) -> bool {
        self.state
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case(state.trim()))
            .unwrap_or(false)
    }
}

/// Which fallback tier produced a batch of facility records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Primary { endpoint: String },
    Backup { endpoint: String },
    Alternative { service: String },
    Cached,
    Sample,
}

impl SourceTag {
    pub fn tier(&self) -> &'static str {
        match self {
            SourceTag::Primary { .. } => "primary",
            SourceTag::Backup { .. } => "backup",
            SourceTag::Alternative { .. } => "alternative",
            SourceTag::Cached => "cached",
            SourceTag::Sample => "sample",
        }
    }

    pub fn is_sample(&self) -> bool {
        matches!(self, SourceTag::Sample)
    }

    /// Live network tiers are the only ones written back to the cache.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SourceTag::Primary { .. } | SourceTag::Backup { .. } | SourceTag::Alternative { .. }
        )
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTag::Primary { endpoint } => write!(f, "EPA_PRIMARY_{}", endpoint),
            SourceTag::Backup { endpoint } => write!(f, "EPA_BACKUP_{}", endpoint),
            SourceTag::Alternative { service } => write!(f, "EPA_ALTERNATIVE_{}", service),
            SourceTag::Cached => f.write_str("EPA_CACHED_DATA"),
            SourceTag::Sample => f.write_str("EPA_SAMPLE_DATA"),
        }
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EPA_CACHED_DATA" => Ok(SourceTag::Cached),
            "EPA_SAMPLE_DATA" => Ok(SourceTag::Sample),
            _ => {
                if let Some(endpoint) = s.strip_prefix("EPA_PRIMARY_") {
                    Ok(SourceTag::Primary { endpoint: endpoint.to_string() })
                } else if let Some(endpoint) = s.strip_prefix("EPA_BACKUP_") {
                    Ok(SourceTag::Backup { endpoint: endpoint.to_string() })
                } else if let Some(service) = s.strip_prefix("EPA_ALTERNATIVE_") {
                    Ok(SourceTag::Alternative { service: service.to_string() })
                } else {
                    Err(format!("unknown source tag: {}", s))
                }
            }
        }
    }
}

impl Serialize for SourceTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Records returned by one fallback tier together with their provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceBatch {
    pub records: Vec<FacilityRecord>,
    pub source: SourceTag,
}

impl SourceBatch {
    pub fn new(records: Vec<FacilityRecord>, source: SourceTag) -> Self {
        Self { records, source }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pollutants compared against authoritative annual measurements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pollutant {
    #[serde(rename = "CO2")]
    Co2,
    #[serde(rename = "NOx")]
    Nox,
    #[serde(rename = "SO2")]
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 3] = [Pollutant::Co2, Pollutant::Nox, Pollutant::So2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pollutant::Co2 => "CO2",
            Pollutant::Nox => "NOx",
            Pollutant::So2 => "SO2",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annual pollutant totals in metric tonnes for one facility, summed across its units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FacilityMeasurements {
    pub facility_id: String,
    pub year: i32,
    pub co2_tons: Option<f64>,
    pub nox_tons: Option<f64>,
    pub so2_tons: Option<f64>,
    pub source: String,
}

impl FacilityMeasurements {
    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Co2 => self.co2_tons,
            Pollutant::Nox => self.nox_tons,
            Pollutant::So2 => self.so2_tons,
        }
    }

    pub fn has_any(&self) -> bool {
        Pollutant::ALL.iter().any(|p| self.get(*p).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tag_rendering() {
        let primary = SourceTag::Primary { endpoint: "https://data.epa.gov/efservice".to_string() };
        assert_eq!(primary.to_string(), "EPA_PRIMARY_https://data.epa.gov/efservice");
        assert_eq!(SourceTag::Alternative { service: "ECHO".to_string() }.to_string(), "EPA_ALTERNATIVE_ECHO");
        assert_eq!(SourceTag::Sample.to_string(), "EPA_SAMPLE_DATA");

        let json = serde_json::to_string(&SourceTag::Cached).unwrap();
        assert_eq!(json, "\"EPA_CACHED_DATA\"");
        let parsed: SourceTag = serde_json::from_str("\"EPA_BACKUP_https://echo.epa.gov/efservice\"").unwrap();
        assert_eq!(parsed, SourceTag::Backup { endpoint: "https://echo.epa.gov/efservice".to_string() });
    }

    #[test]
    fn test_facility_state_comparison() {
        let record = FacilityRecord::new("110000001", "ACME PLANT", "TRI").with_state("tx");
        assert!(record.in_state("TX"));
        assert!(!record.in_state("CA"));
        assert!(!record.is_synthesized());
    }

    #[test]
    fn test_measurements_lookup() {
        let m = FacilityMeasurements {
            facility_id: "3".to_string(),
            year: 2022,
            co2_tons: Some(600.0),
            ..Default::default()
        };
        assert_eq!(m.get(Pollutant::Co2), Some(600.0));
        assert_eq!(m.get(Pollutant::So2), None);
        assert!(m.has_any());
    }
}
