//! Confidence Aggregator
//!
//! Folds the matcher, deviation, quality and anomaly results into one score,
//! risk buckets and a filing-readiness verdict.

use verdant_models::{
    clamp_score, is_filled, round2, ConfidenceDimensions, ConfidenceLevel, ConfidenceReport, DeviationAnalysis,
    FilingReadiness, MatchSummary, QualityAssessment, RiskAssessment, RiskFactor, RiskLevel, Severity, Submission,
    ValidationFlag,
};

use crate::quality::data_completeness;

/// Deviations above this percentage count as a medium risk.
const RISKY_DEVIATION_PCT: f64 = 25.0;
/// Deviations below this percentage earn an EPA-validation bonus.
const CLOSE_DEVIATION_PCT: f64 = 10.0;

/// Everything the aggregator reads; quality and anomaly results are optional.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInputs<'a> {
    pub submission: &'a Submission,
    pub matches: &'a MatchSummary,
    pub flags: &'a [ValidationFlag],
    pub deviations: &'a DeviationAnalysis,
    pub quality: Option<&'a QualityAssessment>,
    pub anomaly_risk: Option<RiskLevel>,
}

pub fn flag_penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 40.0,
        Severity::High => 25.0,
        Severity::Medium => 15.0,
        Severity::Low => 5.0,
    }
}

#[derive(Debug, Default)]
pub struct ConfidenceAggregator;

impl ConfidenceAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, inputs: ConfidenceInputs<'_>) -> ConfidenceReport {
        let dimension_scores = dimensions(&inputs);
        let enhanced_score = round2(clamp_score(dimension_scores.weighted_total()));
        let risk_assessment = assess_risks(&inputs);

        let high_risks = risk_assessment.high.len();
        let medium_risks = risk_assessment.medium.len();
        let level = if enhanced_score >= 85.0 && high_risks == 0 {
            ConfidenceLevel::VeryHigh
        } else if enhanced_score >= 75.0 && high_risks == 0 {
            ConfidenceLevel::High
        } else if enhanced_score >= 60.0 && high_risks <= 1 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        let mut recommendations = vec![level.recommendation().to_string()];
        for (name, score, _) in dimension_scores.entries() {
            if score < 60.0 {
                recommendations.push(format!("Improve {}: {:.1}/100", name.replace('_', " "), score));
            }
        }
        if high_risks > 0 {
            recommendations.push(format!("Address {} high-risk factors before filing", high_risks));
        }
        if medium_risks > 2 {
            recommendations.push(format!("Review {} medium-risk factors", medium_risks));
        }

        let filing_readiness = filing_readiness(level, &inputs, high_risks);

        tracing::debug!(
            company = %inputs.submission.company_trimmed(),
            enhanced_score,
            level = ?level,
            high_risks,
            medium_risks,
            "Confidence aggregated"
        );

        ConfidenceReport {
            enhanced_score,
            level,
            dimension_scores,
            risk_assessment,
            recommendations,
            filing_readiness,
        }
    }
}

fn dimensions(inputs: &ConfidenceInputs<'_>) -> ConfidenceDimensions {
    let submission = inputs.submission;
    let matches = inputs.matches.matches_count();

    let penalties: f64 = inputs.flags.iter().map(|f| flag_penalty(f.severity)).sum();
    let close = inputs
        .deviations
        .quantitative
        .iter()
        .filter(|d| d.deviation_pct < CLOSE_DEVIATION_PCT)
        .count();
    let epa_validation = clamp_score((matches as f64 * 20.0).min(100.0) - penalties + 10.0 * close as f64);

    let mut calculation_accuracy = 70.0;
    if is_filled(submission.emission_factors_source.as_deref()) {
        calculation_accuracy += 15.0;
    }
    if is_filled(submission.calculation_version.as_deref()) || is_filled(submission.methodology.as_deref()) {
        calculation_accuracy += 10.0;
    }
    if submission.has_uncertainty() {
        calculation_accuracy += 5.0;
    }

    let mut source_reliability = 60.0;
    if matches > 0 {
        source_reliability += 20.0;
    }
    if inputs.matches.has_manual_mapping() {
        source_reliability += 15.0;
    }
    if inputs.deviations.has_comparisons() {
        source_reliability += 5.0;
    }

    let mut temporal_consistency = 80.0;
    if is_filled(submission.reporting_period.as_deref()) {
        temporal_consistency += 10.0;
    }
    if is_filled(submission.data_collection_date.as_deref()) {
        temporal_consistency += 10.0;
    }

    ConfidenceDimensions {
        data_completeness: clamp_score(data_completeness(submission)),
        epa_validation,
        calculation_accuracy: clamp_score(calculation_accuracy),
        source_reliability: clamp_score(source_reliability),
        temporal_consistency: clamp_score(temporal_consistency),
    }
}

fn assess_risks(inputs: &ConfidenceInputs<'_>) -> RiskAssessment {
    let mut risks = RiskAssessment::default();
    let count = |severity: Severity| inputs.flags.iter().filter(|f| f.severity == severity).count();

    let critical = count(Severity::Critical);
    if critical > 0 {
        risks.high.push(RiskFactor {
            factor: "critical_validation_flags".to_string(),
            description: format!("{} critical validation issues detected", critical),
            impact: "May prevent SEC filing approval".to_string(),
        });
    }

    let high = count(Severity::High);
    if high > 0 {
        risks.medium.push(RiskFactor {
            factor: "high_severity_flags".to_string(),
            description: format!("{} high-severity validation issues", high),
            impact: "May require additional documentation".to_string(),
        });
    }

    let large = inputs
        .deviations
        .quantitative
        .iter()
        .filter(|d| d.deviation_pct > RISKY_DEVIATION_PCT)
        .count();
    if large > 0 {
        risks.medium.push(RiskFactor {
            factor: "quantitative_deviations".to_string(),
            description: format!("{} significant quantitative deviations", large),
            impact: "May require explanation in SEC filing".to_string(),
        });
    }

    if inputs.matches.matches_count() == 0 {
        risks.medium.push(RiskFactor {
            factor: "no_epa_matches".to_string(),
            description: "No EPA facility matches found".to_string(),
            impact: "May require additional verification".to_string(),
        });
    }
    risks
}

fn filing_readiness(level: ConfidenceLevel, inputs: &ConfidenceInputs<'_>, high_risks: usize) -> FilingReadiness {
    let critical_flag = inputs.flags.iter().any(|f| f.severity == Severity::Critical);
    let anomalous = matches!(inputs.anomaly_risk, Some(RiskLevel::High | RiskLevel::Critical));
    if level == ConfidenceLevel::Low || critical_flag || anomalous {
        return FilingReadiness::NotReady;
    }

    let quality_ready = inputs.quality.map(|q| q.ready_for_filing).unwrap_or(true);
    if level >= ConfidenceLevel::High && high_risks == 0 && quality_ready {
        FilingReadiness::Ready
    } else {
        FilingReadiness::ReviewRecommended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::FacilityMatcher;
    use proptest::prelude::*;
    use verdant_models::{FacilityRecord, FlagCode};

    fn acme() -> Submission {
        Submission::new("Acme Corp")
            .with_scope1("diesel", 100.0, "gallon")
            .with_scope2(50_000.0, Some("US_default"))
    }

    fn summary_with(n: usize) -> MatchSummary {
        let records: Vec<FacilityRecord> = (0..n)
            .map(|i| FacilityRecord::new(format!("{}", i), format!("ACME PLANT {}", i), "TRI"))
            .collect();
        FacilityMatcher::new(0.6).match_facilities("Acme Corp", None, &records)
    }

    fn aggregate(submission: &Submission, matches: &MatchSummary, flags: &[ValidationFlag]) -> ConfidenceReport {
        ConfidenceAggregator::new().aggregate(ConfidenceInputs {
            submission,
            matches,
            flags,
            deviations: &DeviationAnalysis::default(),
            quality: None,
            anomaly_risk: None,
        })
    }

    #[test]
    fn test_five_matches_no_flags_is_very_high() {
        let report = aggregate(&acme(), &summary_with(5), &[]);
        assert_eq!(report.dimension_scores.data_completeness, 90.0);
        assert_eq!(report.dimension_scores.epa_validation, 100.0);
        assert_eq!(report.dimension_scores.calculation_accuracy, 70.0);
        assert_eq!(report.dimension_scores.source_reliability, 80.0);
        assert_eq!(report.dimension_scores.temporal_consistency, 80.0);
        assert_eq!(report.enhanced_score, 86.5);
        assert_eq!(report.level, ConfidenceLevel::VeryHigh);
        assert_eq!(report.recommendations[0], "Excellent confidence - ready for SEC filing");
        assert_eq!(report.filing_readiness, FilingReadiness::Ready);
    }

    #[test]
    fn test_critical_flag_blocks_filing() {
        let flags = vec![ValidationFlag::new(FlagCode::QuantitativeDeviation, Severity::Critical, "CO2 off by 66.7%")];
        let report = aggregate(&acme(), &summary_with(5), &flags);

        assert_eq!(report.dimension_scores.epa_validation, 60.0);
        assert_eq!(report.risk_assessment.high.len(), 1);
        assert_eq!(report.risk_assessment.high[0].factor, "critical_validation_flags");
        assert_eq!(report.level, ConfidenceLevel::Medium);
        assert!(report
            .recommendations
            .contains(&"Address 1 high-risk factors before filing".to_string()));
        assert_eq!(report.filing_readiness, FilingReadiness::NotReady);
    }

    #[test]
    fn test_no_matches_adds_medium_risk_and_dimension_advice() {
        let flags = vec![ValidationFlag::new(FlagCode::NoFacilityMatch, Severity::High, "No facility matches found")];
        let report = aggregate(&acme(), &summary_with(0), &flags);

        assert_eq!(report.dimension_scores.epa_validation, 0.0);
        let factors: Vec<&str> = report.risk_assessment.medium.iter().map(|r| r.factor.as_str()).collect();
        assert_eq!(factors, vec!["high_severity_flags", "no_epa_matches"]);
        assert!(report.recommendations.contains(&"Improve epa validation: 0.0/100".to_string()));
        assert_eq!(report.level, ConfidenceLevel::Medium);
        assert_eq!(report.filing_readiness, FilingReadiness::ReviewRecommended);
    }

    proptest! {
        #[test]
        fn prop_enhanced_score_in_range(matches in 0usize..8, severities in proptest::collection::vec(0u8..4, 0..6)) {
            let flags: Vec<ValidationFlag> = severities
                .iter()
                .map(|s| {
                    let severity = [Severity::Low, Severity::Medium, Severity::High, Severity::Critical][*s as usize];
                    ValidationFlag::new(FlagCode::LowMatchDensity, severity, "generated")
                })
                .collect();
            let report = aggregate(&acme(), &summary_with(matches), &flags);
            prop_assert!((0.0..=100.0).contains(&report.enhanced_score));
            if report.level == ConfidenceLevel::VeryHigh {
                prop_assert!(report.enhanced_score >= 85.0 && report.risk_assessment.high.is_empty());
            }
        }
    }
}
