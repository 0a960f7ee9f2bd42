//! Validation flags raised while cross-checking a submission against registry data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Four-step severity scale shared by flags, anomalies and risk findings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlagCode {
    NoFacilityMatch,
    LowMatchDensity,
    StateMismatch,
    QuantitativeDeviation,
    SynthesizedSourceData,
}

impl FlagCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagCode::NoFacilityMatch => "no_facility_match",
            FlagCode::LowMatchDensity => "low_match_density",
            FlagCode::StateMismatch => "state_mismatch",
            FlagCode::QuantitativeDeviation => "quantitative_deviation",
            FlagCode::SynthesizedSourceData => "synthesized_source_data",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationFlag {
    pub code: FlagCode,
    pub severity: Severity,
    pub message: String,
}

impl ValidationFlag {
    pub fn new(code: FlagCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
        }
    }
}
