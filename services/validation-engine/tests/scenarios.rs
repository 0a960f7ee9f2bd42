//! End-to-end evaluations over stubbed and fully degraded facility sources.

use async_trait::async_trait;
use std::sync::Arc;
use verdant_facility_registry::{FacilitySource, MemoryCache, SourceClient};
use verdant_models::{
    AnomalyKind, ConfidenceLevel, DeviationSeverity, FacilityMeasurements, FacilityRecord, FilingReadiness, FlagCode,
    MatchStrategy, Pollutant, Severity, SourceBatch, SourceTag, Submission,
};
use verdant_utils::ThresholdsConfig;
use verdant_validation_engine::{AnomalyDetector, ValidationEngine};

struct StubSource {
    records: Vec<FacilityRecord>,
    co2_tons: Option<f64>,
}

#[async_trait]
impl FacilitySource for StubSource {
    async fn search(&self, _company: &str, _state: Option<&str>, _limit: usize) -> SourceBatch {
        SourceBatch::new(
            self.records.clone(),
            SourceTag::Primary {
                endpoint: "https://data.epa.gov/efservice".to_string(),
            },
        )
    }

    async fn annual_measurements(&self, facility_id: &str, year: i32) -> Option<FacilityMeasurements> {
        self.co2_tons.map(|co2| FacilityMeasurements {
            facility_id: facility_id.to_string(),
            year,
            co2_tons: Some(co2),
            nox_tons: None,
            so2_tons: None,
            source: "EPA_EASEY".to_string(),
        })
    }
}

fn engine_over(source: Arc<dyn FacilitySource>) -> ValidationEngine {
    ValidationEngine::new(source, &ThresholdsConfig::default()).with_current_year(2025)
}

fn acme() -> Submission {
    Submission::new("Acme Corp")
        .with_scope1("diesel", 100.0, "gallon")
        .with_scope2(50_000.0, Some("US_default"))
}

fn five_acme_facilities() -> Vec<FacilityRecord> {
    (1..=5)
        .map(|i| FacilityRecord::new(i.to_string(), "ACME CORP", "TRI").with_state("TX"))
        .collect()
}

#[tokio::test]
async fn test_five_matches_without_reference_data() {
    let source = Arc::new(StubSource {
        records: five_acme_facilities(),
        co2_tons: None,
    });
    let outcome = engine_over(source).evaluate(&acme(), None, None).await.unwrap();

    assert_eq!(outcome.matches.matches_count(), 5);
    assert!(matches!(outcome.report.level, ConfidenceLevel::VeryHigh | ConfidenceLevel::High));
    assert_eq!(outcome.report.enhanced_score, 86.5);
    assert!(outcome.flags.iter().all(|f| f.code != FlagCode::QuantitativeDeviation));
    assert!(outcome.deviations.quantitative.is_empty());
    assert_eq!(outcome.deviations.skipped.len(), Pollutant::ALL.len());
}

#[tokio::test]
async fn test_exhausted_tiers_fall_back_to_sample_with_lower_confidence() {
    let baseline = engine_over(Arc::new(StubSource {
        records: five_acme_facilities(),
        co2_tons: None,
    }))
    .evaluate(&acme(), None, None)
    .await
    .unwrap();

    let degraded_source = SourceClient::new(Vec::new(), Arc::new(MemoryCache::new(3600)), 900);
    let outcome = engine_over(Arc::new(degraded_source))
        .evaluate(&acme(), None, None)
        .await
        .unwrap();

    assert_eq!(outcome.source, SourceTag::Sample);
    let best = outcome.matches.best_similarity.unwrap();
    assert!(best < 1.0);
    assert!(outcome.reference_facility.is_none());
    assert!(outcome.flags.iter().any(|f| f.code == FlagCode::SynthesizedSourceData));
    assert_eq!(outcome.report.enhanced_score, 56.5);
    assert_eq!(outcome.report.level, ConfidenceLevel::Low);
    assert!(outcome.report.level < baseline.report.level);
    assert_eq!(outcome.report.filing_readiness, FilingReadiness::NotReady);
}

#[tokio::test]
async fn test_reported_co2_far_above_reference_is_critical() {
    let source = Arc::new(StubSource {
        records: vec![FacilityRecord::new("3", "ACME CORP", "TRI").with_state("TX")],
        co2_tons: Some(600.0),
    });
    // 2,500,000 kWh at 0.4 kg/kWh is 1000 t CO2.
    let submission = Submission::new("Acme Corp").with_scope2(2_500_000.0, Some("US_default"));
    let outcome = engine_over(source)
        .evaluate(&submission, Some("TX"), Some(2023))
        .await
        .unwrap();

    assert_eq!(outcome.reference_facility.as_ref().unwrap().registry_id, "3");
    assert_eq!(outcome.reference_measurements.as_ref().unwrap().year, 2023);

    let co2 = &outcome.deviations.quantitative[0];
    assert_eq!(co2.pollutant, Pollutant::Co2);
    assert!((co2.reported - 1000.0).abs() < 1e-6);
    assert!((co2.deviation_pct - 66.67).abs() < 0.01);
    assert_eq!(co2.severity, DeviationSeverity::Critical);

    let flag = outcome
        .flags
        .iter()
        .find(|f| f.code == FlagCode::QuantitativeDeviation)
        .unwrap();
    assert_eq!(flag.severity, Severity::Critical);
    assert_eq!(outcome.report.risk_assessment.high[0].factor, "critical_validation_flags");
    assert_eq!(outcome.report.filing_readiness, FilingReadiness::NotReady);
}

#[tokio::test]
async fn test_same_inputs_give_identical_reports() {
    let engine = engine_over(Arc::new(StubSource {
        records: five_acme_facilities(),
        co2_tons: Some(21.0),
    }));
    let first = engine.evaluate(&acme(), Some("TX"), Some(2023)).await.unwrap();
    let second = engine.evaluate(&acme(), Some("TX"), Some(2023)).await.unwrap();

    assert_eq!(first.report, second.report);
    assert_eq!(first.matches, second.matches);
    assert_eq!(first.matches.top_match().unwrap().strategy, MatchStrategy::Exact);
}

#[test]
fn test_manufacturing_without_scope2_is_a_business_rule_anomaly() {
    let submission = Submission::new("Midwest Manufacturing Inc").with_scope1("natural_gas", 5_000.0, "therm");
    let report = AnomalyDetector::new().detect(&submission);

    assert!(report
        .anomalies
        .iter()
        .any(|a| a.kind == AnomalyKind::BusinessRule && a.severity == Severity::Medium && a.field == "scope2"));
}
