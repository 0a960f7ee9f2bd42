//! Deviation analysis between reported totals and authoritative measurements.

use crate::facility::Pollutant;
use crate::flag::{FlagCode, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DeviationSeverity {
    Minor,
    Moderate,
    Significant,
    Critical,
}

impl DeviationSeverity {
    /// Base confidence points lost for a deviation of this severity.
    pub fn base_impact(&self) -> i32 {
        match self {
            DeviationSeverity::Critical => -30,
            DeviationSeverity::Significant => -20,
            DeviationSeverity::Moderate => -10,
            DeviationSeverity::Minor => -5,
        }
    }

    /// Flag severity a deviation of this class maps onto.
    pub fn flag_severity(&self) -> Severity {
        match self {
            DeviationSeverity::Critical => Severity::Critical,
            DeviationSeverity::Significant => Severity::High,
            DeviationSeverity::Moderate => Severity::Medium,
            DeviationSeverity::Minor => Severity::Low,
        }
    }
}

/// Reported value relative to the reference, as a coarse label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelativeMagnitude {
    MuchHigher,
    Higher,
    SlightlyHigher,
    Similar,
    Lower,
    MuchLower,
}

impl RelativeMagnitude {
    /// `reference` must be positive.
    pub fn from_ratio(reported: f64, reference: f64) -> Self {
        match reported / reference {
            r if r > 2.0 => RelativeMagnitude::MuchHigher,
            r if r > 1.5 => RelativeMagnitude::Higher,
            r if r > 1.1 => RelativeMagnitude::SlightlyHigher,
            r if r > 0.9 => RelativeMagnitude::Similar,
            r if r > 0.5 => RelativeMagnitude::Lower,
            _ => RelativeMagnitude::MuchLower,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceImpact {
    pub base_impact: i32,
    pub additional_impact: i32,
    pub total_impact: i32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviationRecord {
    pub pollutant: Pollutant,
    pub reported: f64,
    pub reference: f64,
    pub deviation_pct: f64,
    pub severity: DeviationSeverity,
    pub source: String,
    pub threshold: f64,
    pub threshold_exceeded: bool,
    pub absolute_difference: f64,
    pub relative_magnitude: RelativeMagnitude,
    pub confidence_impact: ConfidenceImpact,
}

/// A pollutant whose comparison could not be made.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedComparison {
    pub pollutant: Pollutant,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outlier {
    pub index: usize,
    pub value: f64,
    pub z_score: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPattern {
    CriticalDominant,
    HighSeverityDominant,
    ModerateDominant,
    LowSeverityDominant,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub significant: usize,
    pub moderate: usize,
    pub minor: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: DeviationSeverity) {
        match severity {
            DeviationSeverity::Critical => self.critical += 1,
            DeviationSeverity::Significant => self.significant += 1,
            DeviationSeverity::Moderate => self.moderate += 1,
            DeviationSeverity::Minor => self.minor += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.significant + self.moderate + self.minor
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviationStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub max: f64,
    pub min: f64,
    pub outliers: Vec<Outlier>,
    pub distribution: SeverityCounts,
    pub pattern: DistributionPattern,
}

/// How actionable a flag is and what to do about it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actionability {
    pub level: Severity,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualitativeDeviation {
    pub flag_code: FlagCode,
    pub message: String,
    pub severity: Severity,
    pub category: String,
    pub actionability: Actionability,
    pub confidence_impact: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeviationAnalysis {
    pub quantitative: Vec<DeviationRecord>,
    pub skipped: Vec<SkippedComparison>,
    pub qualitative: Vec<QualitativeDeviation>,
    pub statistics: Option<DeviationStatistics>,
    pub severity_summary: SeverityCounts,
    pub recommendations: Vec<String>,
}

impl DeviationAnalysis {
    pub fn has_comparisons(&self) -> bool {
        !self.quantitative.is_empty()
    }

    /// Sum of quantitative and qualitative impact points, never below -100.
    pub fn total_confidence_impact(&self) -> i32 {
        let quantitative: i32 = self.quantitative.iter().map(|d| d.confidence_impact.total_impact).sum();
        let qualitative: i32 = self.qualitative.iter().map(|q| q.confidence_impact).sum();
        (quantitative + qualitative).max(-100)
    }
}
