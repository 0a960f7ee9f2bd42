//! Multi-dimension data quality assessment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    Accuracy,
    Completeness,
    Consistency,
    Timeliness,
    Validity,
}

impl QualityDimension {
    pub const ALL: [QualityDimension; 5] = [
        QualityDimension::Accuracy,
        QualityDimension::Completeness,
        QualityDimension::Consistency,
        QualityDimension::Timeliness,
        QualityDimension::Validity,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            QualityDimension::Accuracy => 0.25,
            QualityDimension::Completeness => 0.25,
            QualityDimension::Consistency => 0.20,
            QualityDimension::Timeliness => 0.15,
            QualityDimension::Validity => 0.15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityDimension::Accuracy => "accuracy",
            QualityDimension::Completeness => "completeness",
            QualityDimension::Consistency => "consistency",
            QualityDimension::Timeliness => "timeliness",
            QualityDimension::Validity => "validity",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DimensionScores {
    pub accuracy: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub validity: f64,
}

impl DimensionScores {
    pub fn get(&self, dimension: QualityDimension) -> f64 {
        match dimension {
            QualityDimension::Accuracy => self.accuracy,
            QualityDimension::Completeness => self.completeness,
            QualityDimension::Consistency => self.consistency,
            QualityDimension::Timeliness => self.timeliness,
            QualityDimension::Validity => self.validity,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (QualityDimension, f64)> + '_ {
        QualityDimension::ALL.iter().map(move |d| (*d, self.get(*d)))
    }

    pub fn weighted_total(&self) -> f64 {
        self.iter().map(|(d, score)| score * d.weight()).sum()
    }

    pub fn mean(&self) -> f64 {
        self.iter().map(|(_, score)| score).sum::<f64>() / QualityDimension::ALL.len() as f64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Unacceptable,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => QualityLevel::Excellent,
            s if s >= 80.0 => QualityLevel::Good,
            s if s >= 70.0 => QualityLevel::Fair,
            s if s >= 60.0 => QualityLevel::Poor,
            _ => QualityLevel::Unacceptable,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityRecommendation {
    pub priority: RecommendationPriority,
    /// Dimension name, or `overall` for the cross-dimension recommendation.
    pub dimension: String,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionScore {
    pub dimension: QualityDimension,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityAssessment {
    pub overall_score: f64,
    pub level: QualityLevel,
    pub dimension_scores: DimensionScores,
    pub strongest: DimensionScore,
    pub weakest: DimensionScore,
    pub needs_attention: Vec<QualityDimension>,
    pub ready_for_filing: bool,
    pub improvement_potential: f64,
    pub recommendations: Vec<QualityRecommendation>,
}
