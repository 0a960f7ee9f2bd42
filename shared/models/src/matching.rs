//! Facility matching results.

use crate::facility::FacilityRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy that produced a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ManualMapping,
    Exact,
    Subsidiary,
    Fuzzy,
    Keyword,
}

impl MatchStrategy {
    /// Tie-break rank when two strategies report the same similarity; lower wins.
    pub fn precedence(&self) -> u8 {
        match self {
            MatchStrategy::ManualMapping => 0,
            MatchStrategy::Exact => 1,
            MatchStrategy::Subsidiary => 2,
            MatchStrategy::Fuzzy => 3,
            MatchStrategy::Keyword => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::ManualMapping => "manual_mapping",
            MatchStrategy::Exact => "exact",
            MatchStrategy::Subsidiary => "subsidiary",
            MatchStrategy::Fuzzy => "fuzzy",
            MatchStrategy::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub facility: FacilityRecord,
    pub similarity: f64,
    pub strategy: MatchStrategy,
}

impl MatchResult {
    pub fn new(facility: FacilityRecord, similarity: f64, strategy: MatchStrategy) -> Self {
        Self {
            facility,
            similarity: similarity.clamp(0.0, 1.0),
            strategy,
        }
    }

    /// True when `self` should replace `other` for the same facility.
    pub fn outranks(&self, other: &MatchResult) -> bool {
        if self.similarity > other.similarity {
            return true;
        }
        self.similarity == other.similarity && self.strategy.precedence() < other.strategy.precedence()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    None,
}

impl MatchConfidenceLevel {
    pub fn from_best(best: Option<f64>) -> Self {
        match best {
            None => MatchConfidenceLevel::None,
            Some(s) if s >= 0.9 => MatchConfidenceLevel::VeryHigh,
            Some(s) if s >= 0.8 => MatchConfidenceLevel::High,
            Some(s) if s >= 0.6 => MatchConfidenceLevel::Medium,
            Some(_) => MatchConfidenceLevel::Low,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            MatchConfidenceLevel::VeryHigh => "Excellent facility matches found - high validation confidence",
            MatchConfidenceLevel::High => "Good facility matches found - proceed with validation",
            MatchConfidenceLevel::Medium => "Moderate facility matches - review for accuracy",
            MatchConfidenceLevel::Low => "Weak facility matches - manual verification recommended",
            MatchConfidenceLevel::None => "No facility matches found - verify company name",
        }
    }
}

/// Ranked, deduplicated matches for one company.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchSummary {
    pub company: String,
    pub normalized_company: String,
    pub state_filter: Option<String>,
    pub matches: Vec<MatchResult>,
    pub best_similarity: Option<f64>,
    pub average_similarity: Option<f64>,
    pub confidence_level: MatchConfidenceLevel,
    pub strategy_breakdown: BTreeMap<MatchStrategy, usize>,
    pub recommendation: String,
}

impl MatchSummary {
    pub fn matches_count(&self) -> usize {
        self.matches.len()
    }

    pub fn top_match(&self) -> Option<&MatchResult> {
        self.matches.first()
    }

    pub fn has_manual_mapping(&self) -> bool {
        self.matches.iter().any(|m| m.strategy == MatchStrategy::ManualMapping)
    }
}

/// Curated company to facility link that bypasses matcher ambiguity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyFacilityMapping {
    pub company: String,
    pub facility_id: String,
    pub facility_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CompanyFacilityMapping {
    pub fn to_record(&self) -> FacilityRecord {
        FacilityRecord {
            registry_id: self.facility_id.clone(),
            facility_name: self.facility_name.clone(),
            state: self.state.clone(),
            county: None,
            city: None,
            zip_code: None,
            source: "MANUAL_MAPPING".to_string(),
            industry_type: None,
            confidence_note: self.notes.clone(),
        }
    }
}
