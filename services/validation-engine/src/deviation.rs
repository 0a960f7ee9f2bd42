//! Deviation Detector
//!
//! Compares reported pollutant totals with authoritative reference measurements,
//! classifies each gap, and summarizes the spread when enough comparisons exist.

use verdant_models::{
    Actionability, ConfidenceImpact, DeviationAnalysis, DeviationRecord, DeviationSeverity, DeviationStatistics,
    DistributionPattern, FlagCode, Outlier, Pollutant, QualitativeDeviation, RelativeMagnitude, Severity,
    SeverityCounts, SkippedComparison, ValidationFlag,
};
use verdant_utils::{DeviationThresholds, ThresholdsConfig};

/// Statistics need at least this many deviations.
const MIN_STATISTICAL_SAMPLE: usize = 3;
const OUTLIER_Z: f64 = 2.0;
const STRONG_OUTLIER_Z: f64 = 3.0;

/// One pollutant to compare; either side may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub pollutant: Pollutant,
    pub reported: Option<f64>,
    pub reference: Option<f64>,
    /// Percentage above which the deviation is flagged.
    pub threshold: f64,
    pub source: String,
}

pub struct DeviationDetector {
    thresholds: DeviationThresholds,
}

impl Default for DeviationDetector {
    fn default() -> Self {
        Self::new(ThresholdsConfig::default().deviation)
    }
}

impl DeviationDetector {
    pub fn new(thresholds: DeviationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn from_thresholds(config: &ThresholdsConfig) -> Self {
        Self::new(config.deviation.clone())
    }

    /// Evaluated from critical downwards; each bound is inclusive.
    pub fn classify(&self, deviation_pct: f64) -> DeviationSeverity {
        if deviation_pct >= self.thresholds.critical {
            DeviationSeverity::Critical
        } else if deviation_pct >= self.thresholds.significant {
            DeviationSeverity::Significant
        } else if deviation_pct >= self.thresholds.moderate {
            DeviationSeverity::Moderate
        } else {
            DeviationSeverity::Minor
        }
    }

    pub fn compare(&self, comparison: &Comparison) -> Result<DeviationRecord, SkippedComparison> {
        let skip = |reason: &str| SkippedComparison {
            pollutant: comparison.pollutant,
            reason: reason.to_string(),
        };

        let reported = match comparison.reported {
            Some(v) if v.is_finite() => v,
            Some(_) => return Err(skip("reported value is not a finite number")),
            None => return Err(skip("no reported value")),
        };
        let reference = match comparison.reference {
            Some(v) if v.is_finite() && v > 0.0 => v,
            Some(_) => return Err(skip("reference value is not positive")),
            None => return Err(skip("no reference data available")),
        };

        let deviation_pct = (reported - reference).abs() / reference * 100.0;
        let severity = self.classify(deviation_pct);

        Ok(DeviationRecord {
            pollutant: comparison.pollutant,
            reported,
            reference,
            deviation_pct,
            severity,
            source: comparison.source.clone(),
            threshold: comparison.threshold,
            threshold_exceeded: deviation_pct > comparison.threshold,
            absolute_difference: (reported - reference).abs(),
            relative_magnitude: RelativeMagnitude::from_ratio(reported, reference),
            confidence_impact: quantitative_impact(deviation_pct, severity),
        })
    }

    /// Splits comparisons into computed deviations and skipped pollutants.
    pub fn quantitative(&self, comparisons: &[Comparison]) -> (Vec<DeviationRecord>, Vec<SkippedComparison>) {
        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for comparison in comparisons {
            match self.compare(comparison) {
                Ok(record) => records.push(record),
                Err(skip) => {
                    tracing::debug!(pollutant = %skip.pollutant, reason = %skip.reason, "Comparison skipped");
                    skipped.push(skip);
                }
            }
        }
        (records, skipped)
    }

    pub fn analyze(
        &self,
        quantitative: Vec<DeviationRecord>,
        skipped: Vec<SkippedComparison>,
        flags: &[ValidationFlag],
    ) -> DeviationAnalysis {
        let qualitative: Vec<QualitativeDeviation> = flags.iter().map(qualitative_deviation).collect();

        let values: Vec<f64> = quantitative.iter().map(|d| d.deviation_pct).collect();
        let statistics = self.statistics(&values);

        let mut severity_summary = SeverityCounts::default();
        for record in &quantitative {
            severity_summary.record(record.severity);
        }
        for flag in &qualitative {
            severity_summary.record(deviation_class(flag.severity));
        }

        let recommendations = recommendations(&severity_summary, statistics.as_ref());

        DeviationAnalysis {
            quantitative,
            skipped,
            qualitative,
            statistics,
            severity_summary,
            recommendations,
        }
    }

    pub fn statistics(&self, values: &[f64]) -> Option<DeviationStatistics> {
        if values.len() < MIN_STATISTICAL_SAMPLE {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        let std_dev = variance.sqrt();

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        let outliers = if std_dev > 0.0 {
            values
                .iter()
                .enumerate()
                .filter_map(|(index, &value)| {
                    let z_score = (value - mean).abs() / std_dev;
                    (z_score > OUTLIER_Z).then(|| Outlier {
                        index,
                        value,
                        z_score,
                        severity: if z_score > STRONG_OUTLIER_Z { Severity::High } else { Severity::Medium },
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let mut distribution = SeverityCounts::default();
        for value in values {
            distribution.record(self.classify(*value));
        }
        let pattern = distribution_pattern(&distribution);

        Some(DeviationStatistics {
            count,
            mean,
            median,
            std_dev,
            max: sorted[count - 1],
            min: sorted[0],
            outliers,
            distribution,
            pattern,
        })
    }
}

fn quantitative_impact(deviation_pct: f64, severity: DeviationSeverity) -> ConfidenceImpact {
    let base_impact = severity.base_impact();
    let additional_impact = if deviation_pct > 100.0 {
        -10
    } else if deviation_pct > 75.0 {
        -5
    } else {
        0
    };
    let total_impact = base_impact + additional_impact;
    ConfidenceImpact {
        base_impact,
        additional_impact,
        total_impact,
        description: format!("Confidence reduced by {} points", total_impact.abs()),
    }
}

fn distribution_pattern(counts: &SeverityCounts) -> DistributionPattern {
    let total = counts.total().max(1) as f64;
    let pct = |n: usize| n as f64 / total * 100.0;

    if pct(counts.critical) > 50.0 {
        DistributionPattern::CriticalDominant
    } else if pct(counts.critical + counts.significant) > 60.0 {
        DistributionPattern::HighSeverityDominant
    } else if pct(counts.moderate) > 50.0 {
        DistributionPattern::ModerateDominant
    } else {
        DistributionPattern::LowSeverityDominant
    }
}

/// Flag severities folded onto the deviation scale for the severity summary.
fn deviation_class(severity: Severity) -> DeviationSeverity {
    match severity {
        Severity::Critical => DeviationSeverity::Critical,
        Severity::High => DeviationSeverity::Significant,
        Severity::Medium => DeviationSeverity::Moderate,
        Severity::Low => DeviationSeverity::Minor,
    }
}

fn flag_category(code: FlagCode) -> &'static str {
    match code {
        FlagCode::NoFacilityMatch => "data_availability",
        FlagCode::LowMatchDensity => "data_quality",
        FlagCode::StateMismatch => "geographic_consistency",
        FlagCode::QuantitativeDeviation => "numerical_accuracy",
        FlagCode::SynthesizedSourceData => "source_provenance",
    }
}

fn flag_actionability(code: FlagCode) -> Actionability {
    let (level, actions): (Severity, &[&str]) = match code {
        FlagCode::NoFacilityMatch => (
            Severity::High,
            &["Verify company name", "Check for subsidiaries", "Manual facility search"],
        ),
        FlagCode::LowMatchDensity => (Severity::Medium, &["Expand search criteria", "Check operational locations"]),
        FlagCode::StateMismatch => (Severity::High, &["Verify operational state", "Check facility addresses"]),
        FlagCode::QuantitativeDeviation => (
            Severity::High,
            &["Verify inputs", "Check calculation method", "Review emission factors"],
        ),
        FlagCode::SynthesizedSourceData => (
            Severity::Medium,
            &["Retry registry lookup once sources recover", "Confirm facilities manually"],
        ),
    };
    Actionability {
        level,
        actions: actions.iter().map(|a| a.to_string()).collect(),
    }
}

fn flag_impact(severity: Severity) -> i32 {
    match severity {
        Severity::Critical => -25,
        Severity::High => -15,
        Severity::Medium => -10,
        Severity::Low => -5,
    }
}

fn qualitative_deviation(flag: &ValidationFlag) -> QualitativeDeviation {
    QualitativeDeviation {
        flag_code: flag.code,
        message: flag.message.clone(),
        severity: flag.severity,
        category: flag_category(flag.code).to_string(),
        actionability: flag_actionability(flag.code),
        confidence_impact: flag_impact(flag.severity),
    }
}

fn recommendations(summary: &SeverityCounts, statistics: Option<&DeviationStatistics>) -> Vec<String> {
    let mut out = Vec::new();
    if summary.critical > 0 {
        out.push("Critical deviations detected - immediate investigation required".to_string());
        out.push("Halt SEC filing process until critical issues are resolved".to_string());
    }
    if summary.significant > 0 {
        out.push("Significant deviations found - thorough review needed".to_string());
    }
    if let Some(stats) = statistics {
        if stats.mean > 20.0 {
            out.push("High average deviation - review calculation methodology".to_string());
        }
        if !stats.outliers.is_empty() {
            out.push("Statistical outliers detected - investigate anomalous data points".to_string());
        }
        match stats.pattern {
            DistributionPattern::CriticalDominant => {
                out.push("Critical deviation pattern - comprehensive data review required".to_string())
            }
            DistributionPattern::HighSeverityDominant => {
                out.push("High-severity deviation pattern - enhanced validation needed".to_string())
            }
            _ => {}
        }
    }
    out
}
