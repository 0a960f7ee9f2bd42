//! Quality Scorer
//!
//! Five independent data-quality dimensions over the raw submission, combined with
//! fixed weights. Everything here is a pure function of the submission, the
//! validator's report and the reference year.

use chrono::Datelike;
use verdant_models::{
    clamp_score, is_filled, round2, DimensionScore, DimensionScores, QualityAssessment, QualityDimension, QualityLevel,
    QualityRecommendation, RecommendationPriority, Submission,
};
use verdant_utils::ValidationReport;

const ATTENTION_THRESHOLD: f64 = 70.0;
const FILING_THRESHOLD: f64 = 75.0;

/// Completeness shared by the quality and confidence passes:
/// 60% required fields, 30% scope sub-fields, 10% optional metadata.
pub fn data_completeness(submission: &Submission) -> f64 {
    let required_present = [
        !submission.company_trimmed().is_empty(),
        submission.scope1.is_some(),
        submission.scope2.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count();
    let required_ratio = required_present as f64 / 3.0;

    let scope1 = submission
        .scope1
        .as_ref()
        .map(|s| {
            let amount = (s.amount.is_finite() && s.amount != 0.0) as u8 as f64;
            let unit = (!s.unit.trim().is_empty()) as u8 as f64;
            (amount + unit) / 2.0 * 100.0
        })
        .unwrap_or(0.0);
    let scope2 = submission
        .scope2
        .as_ref()
        .map(|s| if s.kwh > 0.0 { 100.0 } else { 0.0 })
        .unwrap_or(0.0);
    let scope_score = (scope1 + scope2) / 2.0;

    let optional_ratio = submission.completeness_optional_present().len() as f64 / 3.0;

    (required_ratio * 100.0 * 0.6 + scope_score * 0.3 + optional_ratio * 100.0 * 0.1).min(100.0)
}

pub struct QualityScorer {
    reference_year: i32,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityScorer {
    /// Scores relative to the current calendar year.
    pub fn new() -> Self {
        Self::with_reference_year(chrono::Utc::now().year())
    }

    pub fn with_reference_year(reference_year: i32) -> Self {
        Self { reference_year }
    }

    pub fn score(&self, submission: &Submission, validation: &ValidationReport) -> QualityAssessment {
        let scores = DimensionScores {
            accuracy: self.accuracy(submission, validation),
            completeness: clamp_score(data_completeness(submission)),
            consistency: self.consistency(submission),
            timeliness: self.timeliness(submission),
            validity: clamp_score(validation.validity_score),
        };
        assess(scores)
    }

    fn accuracy(&self, submission: &Submission, validation: &ValidationReport) -> f64 {
        let penalty = validation.critical_issues * 20 + validation.high_issues * 10 + validation.medium_issues * 5;

        let mut bonus = 0.0;
        if let Some(source) = submission.emission_factors_source.as_deref() {
            let source = source.to_lowercase();
            if source.contains("epa") {
                bonus += 10.0;
            } else if source.contains("official") {
                bonus += 5.0;
            }
        }
        if is_filled(submission.methodology.as_deref()) {
            bonus += 5.0;
        }
        if submission.has_uncertainty() {
            bonus += 5.0;
        }
        clamp_score(80.0 - penalty as f64 + bonus)
    }

    fn consistency(&self, submission: &Submission) -> f64 {
        let mut inconsistencies = 0;

        if let Some(scope1) = &submission.scope1 {
            if let Some(fuel) = scope1.fuel() {
                if !scope1.unit.trim().is_empty() && !fuel.accepts_unit(&scope1.unit) {
                    inconsistencies += 1;
                }
            }
        }

        if let (Some(scope1), Some(scope2)) = (&submission.scope1, &submission.scope2) {
            if scope1.amount > 0.0 && scope2.kwh > 0.0 && scope1.amount > scope2.kwh * 100.0 {
                inconsistencies += 1;
            }
        }

        if let Some(year) = submission.reporting_year() {
            if year > self.reference_year || year < self.reference_year - 5 {
                inconsistencies += 1;
            }
        }

        clamp_score(90.0 - 15.0 * inconsistencies as f64)
    }

    fn timeliness(&self, submission: &Submission) -> f64 {
        let mut score = 85.0;

        if is_filled(submission.reporting_period.as_deref()) {
            score += match submission.reporting_year() {
                Some(year) => match self.reference_year - year {
                    0 => 15.0,
                    1 => 10.0,
                    2 => 5.0,
                    age if age <= 5 => 0.0,
                    _ => -20.0,
                },
                None => -20.0,
            };
        }
        if is_filled(submission.data_collection_date.as_deref()) {
            score += 5.0;
        }
        clamp_score(score)
    }
}

/// Builds the assessment from already computed dimension scores.
pub fn assess(scores: DimensionScores) -> QualityAssessment {
    let overall_score = round2(clamp_score(scores.weighted_total()));

    let mut ranked: Vec<(QualityDimension, f64)> = scores.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let strongest = DimensionScore {
        dimension: ranked[0].0,
        score: ranked[0].1,
    };
    let weakest = DimensionScore {
        dimension: ranked[ranked.len() - 1].0,
        score: ranked[ranked.len() - 1].1,
    };

    let needs_attention: Vec<QualityDimension> = scores
        .iter()
        .filter(|(_, score)| *score < ATTENTION_THRESHOLD)
        .map(|(dimension, _)| dimension)
        .collect();
    let ready_for_filing = overall_score >= FILING_THRESHOLD && needs_attention.len() <= 1;

    QualityAssessment {
        overall_score,
        level: QualityLevel::from_score(overall_score),
        dimension_scores: scores,
        strongest,
        weakest,
        ready_for_filing,
        improvement_potential: round2(100.0 - overall_score),
        recommendations: recommendations(&scores),
        needs_attention,
    }
}

fn recommendations(scores: &DimensionScores) -> Vec<QualityRecommendation> {
    let mut out: Vec<QualityRecommendation> = scores
        .iter()
        .filter(|(_, score)| *score < ATTENTION_THRESHOLD)
        .map(|(dimension, score)| dimension_recommendation(dimension, score))
        .collect();

    if scores.mean() < 60.0 {
        out.push(QualityRecommendation {
            priority: RecommendationPriority::Critical,
            dimension: "overall".to_string(),
            title: "Comprehensive Quality Improvement Required".to_string(),
            description: "Multiple quality dimensions are below acceptable thresholds".to_string(),
            actions: to_strings(&[
                "Implement comprehensive data quality management",
                "Review data collection and validation processes",
                "Consider third-party data verification",
            ]),
        });
    }
    out
}

fn dimension_recommendation(dimension: QualityDimension, score: f64) -> QualityRecommendation {
    let (title, description, actions): (&str, String, &[&str]) = match dimension {
        QualityDimension::Accuracy => (
            "Improve Data Accuracy",
            format!("Accuracy score ({:.1}) indicates potential data quality issues", score),
            &[
                "Verify emission factors and calculation methods",
                "Cross-check data against source documents",
                "Implement data validation checkpoints",
            ],
        ),
        QualityDimension::Completeness => (
            "Enhance Data Completeness",
            format!("Completeness score ({:.1}) shows missing data elements", score),
            &[
                "Fill missing required data fields",
                "Add optional fields for better context",
                "Ensure all emission sources are captured",
            ],
        ),
        QualityDimension::Consistency => (
            "Improve Data Consistency",
            format!("Consistency score ({:.1}) indicates internal data conflicts", score),
            &[
                "Review data for internal consistency",
                "Standardize units and formats",
                "Reconcile conflicting data points",
            ],
        ),
        QualityDimension::Timeliness => (
            "Update Data Timeliness",
            format!("Timeliness score ({:.1}) suggests outdated information", score),
            &[
                "Update to most recent reporting period",
                "Establish regular data refresh cycles",
                "Verify data collection dates",
            ],
        ),
        QualityDimension::Validity => (
            "Enhance Data Validity",
            format!("Validity score ({:.1}) shows format or range issues", score),
            &[
                "Validate data formats and ranges",
                "Check business rule compliance",
                "Fix data type and format issues",
            ],
        ),
    };

    QualityRecommendation {
        priority: if score < 50.0 {
            RecommendationPriority::High
        } else {
            RecommendationPriority::Medium
        },
        dimension: dimension.as_str().to_string(),
        title: title.to_string(),
        description,
        actions: to_strings(actions),
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
