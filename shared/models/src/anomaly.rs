//! Heuristic anomaly findings over a raw submission.

use crate::flag::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Range,
    Magnitude,
    Pattern,
    BusinessRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyRecord {
    pub kind: AnomalyKind,
    pub field: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub recommendation: String,
}

/// Aggregate risk derived from anomaly severities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn message(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "Critical anomalies detected - immediate attention required",
            RiskLevel::High => "Multiple high-severity anomalies - thorough review needed",
            RiskLevel::Medium => "High-severity anomalies detected - review recommended",
            RiskLevel::Low => "Minor anomalies detected - monitoring recommended",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnomalySummary {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_kind: BTreeMap<AnomalyKind, usize>,
    pub most_affected_field: Option<String>,
}

impl AnomalySummary {
    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyReport {
    pub anomalies: Vec<AnomalyRecord>,
    pub summary: AnomalySummary,
    pub risk_level: RiskLevel,
    pub risk_message: String,
    pub recommendations: Vec<String>,
}

impl AnomalyReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}
