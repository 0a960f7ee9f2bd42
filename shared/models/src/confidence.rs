//! Terminal confidence report and its risk assessment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn recommendation(&self) -> &'static str {
        match self {
            ConfidenceLevel::VeryHigh => "Excellent confidence - ready for SEC filing",
            ConfidenceLevel::High => "High confidence - ready for SEC filing with minor review",
            ConfidenceLevel::Medium => "Medium confidence - review recommended before filing",
            ConfidenceLevel::Low => "Low confidence - significant improvements required",
        }
    }
}

/// Weighted dimensions behind the enhanced confidence score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfidenceDimensions {
    pub data_completeness: f64,
    pub epa_validation: f64,
    pub calculation_accuracy: f64,
    pub source_reliability: f64,
    pub temporal_consistency: f64,
}

impl ConfidenceDimensions {
    pub const WEIGHTS: [(&'static str, f64); 5] = [
        ("data_completeness", 0.25),
        ("epa_validation", 0.30),
        ("calculation_accuracy", 0.20),
        ("source_reliability", 0.15),
        ("temporal_consistency", 0.10),
    ];

    /// `(name, score, weight)` in a fixed order.
    pub fn entries(&self) -> [(&'static str, f64, f64); 5] {
        let scores = [
            self.data_completeness,
            self.epa_validation,
            self.calculation_accuracy,
            self.source_reliability,
            self.temporal_consistency,
        ];
        let mut out = [("", 0.0, 0.0); 5];
        for (i, (name, weight)) in Self::WEIGHTS.iter().enumerate() {
            out[i] = (*name, scores[i], *weight);
        }
        out
    }

    pub fn weighted_total(&self) -> f64 {
        self.entries().iter().map(|(_, score, weight)| score * weight).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    pub factor: String,
    pub description: String,
    pub impact: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub high: Vec<RiskFactor>,
    pub medium: Vec<RiskFactor>,
    pub low: Vec<RiskFactor>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilingReadiness {
    Ready,
    ReviewRecommended,
    NotReady,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceReport {
    pub enhanced_score: f64,
    pub level: ConfidenceLevel,
    pub dimension_scores: ConfidenceDimensions,
    pub risk_assessment: RiskAssessment,
    pub recommendations: Vec<String>,
    pub filing_readiness: FilingReadiness,
}
