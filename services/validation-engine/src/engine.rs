//! Validation Engine
//!
//! Sequences every analysis over one immutable submission:
//! validate, score quality and anomalies, fetch facilities, resolve any manual
//! mapping, match, compare against reference measurements, derive flags and
//! aggregate the final confidence report.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use verdant_facility_registry::FacilitySource;
use verdant_models::{
    AnomalyReport, ConfidenceReport, DeviationAnalysis, FacilityMeasurements, FacilityRecord, MatchResult,
    MatchStrategy, MatchSummary, Pollutant, QualityAssessment, SourceTag, Submission, ValidationFlag,
};
use verdant_utils::{PollutantThresholds, SubmissionValidator, ThresholdsConfig, ValidationReport, VerdantResult};

use crate::anomaly::AnomalyDetector;
use crate::calculator::{EmissionsCalculator, EmissionsEstimate, FactorTableCalculator};
use crate::confidence::{ConfidenceAggregator, ConfidenceInputs};
use crate::deviation::{Comparison, DeviationDetector};
use crate::flags::{pollutant_threshold, FlagPolicy};
use crate::mapping::{CompanyMappingStore, InMemoryMappingStore};
use crate::matcher::{merge_matches, summarize, FacilityMatcher};
use crate::quality::QualityScorer;

/// Best-match similarity needed before its measurements are trusted as a reference.
const REFERENCE_MIN_SIMILARITY: f64 = 0.9;
const DEFAULT_FETCH_LIMIT: usize = 100;

/// Everything produced for one submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationOutcome {
    pub report: ConfidenceReport,
    pub matches: MatchSummary,
    pub deviations: DeviationAnalysis,
    pub quality: QualityAssessment,
    pub anomalies: AnomalyReport,
    pub flags: Vec<ValidationFlag>,
    pub source: SourceTag,
    pub validation: ValidationReport,
    pub emissions: EmissionsEstimate,
    pub reference_facility: Option<FacilityRecord>,
    pub reference_measurements: Option<FacilityMeasurements>,
    pub measurement_year: i32,
}

pub struct ValidationEngine {
    source: Arc<dyn FacilitySource>,
    mappings: Arc<dyn CompanyMappingStore>,
    calculator: Arc<dyn EmissionsCalculator>,
    validator: SubmissionValidator,
    matcher: FacilityMatcher,
    deviations: DeviationDetector,
    quality: QualityScorer,
    anomalies: AnomalyDetector,
    aggregator: ConfidenceAggregator,
    flag_policy: FlagPolicy,
    pollutant_thresholds: PollutantThresholds,
    fetch_limit: usize,
    current_year: i32,
}

impl ValidationEngine {
    pub fn new(source: Arc<dyn FacilitySource>, thresholds: &ThresholdsConfig) -> Self {
        let current_year = Utc::now().year();
        Self {
            source,
            mappings: Arc::new(InMemoryMappingStore::new()),
            calculator: Arc::new(FactorTableCalculator),
            validator: SubmissionValidator::new(),
            matcher: FacilityMatcher::from_thresholds(thresholds),
            deviations: DeviationDetector::from_thresholds(thresholds),
            quality: QualityScorer::with_reference_year(current_year),
            anomalies: AnomalyDetector::new(),
            aggregator: ConfidenceAggregator::new(),
            flag_policy: FlagPolicy::from_thresholds(thresholds),
            pollutant_thresholds: thresholds.pollutants.clone(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            current_year,
        }
    }

    pub fn with_mappings(mut self, mappings: Arc<dyn CompanyMappingStore>) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn with_calculator(mut self, calculator: Arc<dyn EmissionsCalculator>) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_matcher(mut self, matcher: FacilityMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }

    /// Pins "now" for quality timeliness and the default measurement year.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self.quality = QualityScorer::with_reference_year(year);
        self
    }

    pub fn source(&self) -> &Arc<dyn FacilitySource> {
        &self.source
    }

    pub fn mappings(&self) -> &Arc<dyn CompanyMappingStore> {
        &self.mappings
    }

    /// Only an invalid submission is returned as an error; every other
    /// failure lowers the score or adds a flag.
    pub async fn evaluate(
        &self,
        submission: &Submission,
        state: Option<&str>,
        year: Option<i32>,
    ) -> VerdantResult<EvaluationOutcome> {
        let validation = self.validator.ensure_valid(submission)?;
        let company = submission.company_trimmed();
        let state = state.map(str::trim).filter(|s| !s.is_empty());

        let quality = self.quality.score(submission, &validation);
        let anomalies = self.anomalies.detect(submission);
        let emissions = self.calculator.calculate(submission)?;

        let batch = self.source.search(company, state, self.fetch_limit).await;
        tracing::info!(
            company = %company,
            state = ?state,
            source = %batch.source,
            records = batch.len(),
            "Facility records fetched"
        );

        let mapping = self.mappings.lookup(company).await;
        let mapped = mapping.as_ref().map(|m| m.to_record());

        let matches = self.matcher.match_facilities(company, state, &batch.records);
        let matches = match &mapped {
            Some(record) => pin_mapping(matches, record.clone()),
            None => matches,
        };

        let reference_facility = mapped.or_else(|| {
            matches
                .top_match()
                .filter(|m| m.similarity >= REFERENCE_MIN_SIMILARITY && !m.facility.is_synthesized())
                .map(|m| m.facility.clone())
        });

        let measurement_year = year
            .or_else(|| submission.reporting_year())
            .unwrap_or(self.current_year - 1);
        let reference_measurements = match &reference_facility {
            Some(facility) => {
                self.source
                    .annual_measurements(&facility.registry_id, measurement_year)
                    .await
            }
            None => None,
        };

        let comparisons = self.comparisons(&emissions, reference_measurements.as_ref());
        let (quantitative, skipped) = self.deviations.quantitative(&comparisons);

        let flags = self.flag_policy.derive(&matches, state, &quantitative, &batch.source);
        let deviations = self.deviations.analyze(quantitative, skipped, &flags);

        let report = self.aggregator.aggregate(ConfidenceInputs {
            submission,
            matches: &matches,
            flags: &flags,
            deviations: &deviations,
            quality: Some(&quality),
            anomaly_risk: Some(anomalies.risk_level),
        });

        tracing::info!(
            company = %company,
            matches = matches.matches_count(),
            flags = flags.len(),
            score = report.enhanced_score,
            level = ?report.level,
            readiness = ?report.filing_readiness,
            "Submission evaluated"
        );

        Ok(EvaluationOutcome {
            report,
            matches,
            deviations,
            quality,
            anomalies,
            flags,
            source: batch.source,
            validation,
            emissions,
            reference_facility,
            reference_measurements,
            measurement_year,
        })
    }

    fn comparisons(&self, emissions: &EmissionsEstimate, reference: Option<&FacilityMeasurements>) -> Vec<Comparison> {
        let reported = emissions.as_reported();
        let source = reference
            .map(|m| m.source.clone())
            .unwrap_or_else(|| "none".to_string());
        Pollutant::ALL
            .iter()
            .map(|&pollutant| Comparison {
                pollutant,
                reported: reported.get(pollutant),
                reference: reference.and_then(|m| m.get(pollutant)),
                threshold: pollutant_threshold(&self.pollutant_thresholds, pollutant),
                source: source.clone(),
            })
            .collect()
    }
}

/// Puts the mapped facility first, replacing any matcher result for the same id.
fn pin_mapping(summary: MatchSummary, record: FacilityRecord) -> MatchSummary {
    let mut found = summary.matches;
    found.push(MatchResult::new(record, 1.0, MatchStrategy::ManualMapping));
    summarize(&summary.company, summary.normalized_company, summary.state_filter, merge_matches(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use verdant_models::{CompanyFacilityMapping, SourceBatch};

    struct StaticSource {
        batch: SourceBatch,
        measurements: Option<FacilityMeasurements>,
    }

    #[async_trait]
    impl FacilitySource for StaticSource {
        async fn search(&self, _company: &str, _state: Option<&str>, _limit: usize) -> SourceBatch {
            self.batch.clone()
        }

        async fn annual_measurements(&self, facility_id: &str, year: i32) -> Option<FacilityMeasurements> {
            self.measurements.clone().map(|mut m| {
                m.facility_id = facility_id.to_string();
                m.year = year;
                m
            })
        }
    }

    fn engine(records: Vec<FacilityRecord>, measurements: Option<FacilityMeasurements>) -> ValidationEngine {
        let source = StaticSource {
            batch: SourceBatch::new(records, SourceTag::Alternative { service: "TRI".to_string() }),
            measurements,
        };
        ValidationEngine::new(Arc::new(source), &ThresholdsConfig::default()).with_current_year(2025)
    }

    #[tokio::test]
    async fn test_invalid_submission_is_the_only_error() {
        let err = engine(Vec::new(), None)
            .evaluate(&Submission::new("   "), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SUBMISSION");
    }

    #[tokio::test]
    async fn test_default_year_is_previous_calendar_year() {
        let outcome = engine(Vec::new(), None)
            .evaluate(&Submission::new("Acme Corp").with_scope2(1000.0, None), None, None)
            .await
            .unwrap();
        assert_eq!(outcome.measurement_year, 2024);

        let outcome = engine(Vec::new(), None)
            .evaluate(
                &Submission::new("Acme Corp").with_scope2(1000.0, None).with_reporting_period("2022-06"),
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.measurement_year, 2022);
    }

    #[tokio::test]
    async fn test_manual_mapping_is_pinned_and_used_as_reference() {
        let store = Arc::new(InMemoryMappingStore::new());
        store
            .save(CompanyFacilityMapping {
                company: "Acme Corp".to_string(),
                facility_id: "9001".to_string(),
                facility_name: "ACME PASADENA PLANT".to_string(),
                state: Some("TX".to_string()),
                notes: None,
            })
            .await
            .unwrap();
        let measurements = FacilityMeasurements {
            co2_tons: Some(20.0),
            source: "EPA_EASEY".to_string(),
            ..FacilityMeasurements::default()
        };
        let engine = engine(vec![FacilityRecord::new("1", "ACME CORP", "TRI")], Some(measurements)).with_mappings(store);

        let submission = Submission::new("Acme Corp").with_scope2(50_000.0, Some("US_default"));
        let outcome = engine.evaluate(&submission, None, Some(2023)).await.unwrap();

        let top = outcome.matches.top_match().unwrap();
        assert_eq!(top.strategy, MatchStrategy::ManualMapping);
        assert_eq!(top.facility.registry_id, "9001");
        assert_eq!(outcome.matches.matches_count(), 2);
        assert_eq!(outcome.reference_facility.unwrap().registry_id, "9001");
        assert_eq!(outcome.deviations.quantitative.len(), 1);
        assert!(outcome.deviations.quantitative[0].deviation_pct < 1e-6);
        assert_eq!(outcome.report.dimension_scores.source_reliability, 100.0);
    }

    #[tokio::test]
    async fn test_weak_match_is_not_a_reference() {
        let measurements = FacilityMeasurements {
            co2_tons: Some(1.0),
            source: "EPA_EASEY".to_string(),
            ..FacilityMeasurements::default()
        };
        let engine = engine(vec![FacilityRecord::new("1", "ACME STEEL WORKS", "TRI")], Some(measurements));
        let outcome = engine
            .evaluate(&Submission::new("Acme Corp").with_scope2(50_000.0, None), None, None)
            .await
            .unwrap();

        assert!(outcome.reference_facility.is_none());
        assert!(outcome.deviations.quantitative.is_empty());
        let reasons: Vec<&str> = outcome.deviations.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(
            reasons,
            vec!["no reference data available", "no reported value", "no reported value"]
        );
    }
}
