//! # Verdant Core Domain Models
//!
//! Domain models shared by the Verdant emissions validation services. Every model derives
//! serde serialization so reports can be returned over HTTP and cached verbatim.
//!
//! ## Key Models
//!
//! - **Submission**: A company's self-reported Scope 1 / Scope 2 activity data plus metadata
//! - **FacilityRecord**: A registry facility normalized from any upstream schema
//! - **SourceTag**: Provenance of a batch of facility records (which fallback tier served it)
//! - **MatchSummary**: Ranked, deduplicated facility matches for a company
//! - **DeviationAnalysis**: Reported totals compared against authoritative measurements
//! - **QualityAssessment**: Five-dimension data quality scoring
//! - **AnomalyReport**: Heuristic range, magnitude, pattern and business-rule findings
//! - **ConfidenceReport**: The terminal confidence score, risk tiers and filing readiness
//!
//! ## Scores
//!
//! All scores live on a 0-100 scale; use [`clamp_score`] before storing a computed value.

pub mod anomaly;
pub mod confidence;
pub mod deviation;
pub mod facility;
pub mod flag;
pub mod matching;
pub mod quality;
pub mod submission;


pub use anomaly::*;
pub use confidence::*;
pub use deviation::*;
pub use facility::*;
pub use flag::*;
pub use matching::*;
pub use quality::*;
pub use submission::*;

/// Clamps a score to the 0-100 range, mapping NaN to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// Rounds to two decimal places for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-12.0), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(55.5), 55.5);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(86.4999), 86.5);
        assert_eq!(round2(66.666_666), 66.67);
    }

    #[test]
    fn test_submission_builder() {
        let submission = Submission::new("Acme Corp")
            .with_scope1("diesel", 100.0, "gallon")
            .with_scope2(50_000.0, Some("US_default"))
            .with_reporting_period("2023");

        assert_eq!(submission.scope1.as_ref().and_then(|s| s.fuel()), Some(FuelType::Diesel));
        assert_eq!(submission.completeness_optional_present(), vec!["reporting_period"]);
    }
}
