//! Heuristic anomaly checks over the raw submission.

use std::collections::{BTreeMap, HashSet};
use verdant_models::{AnomalyKind, AnomalyRecord, AnomalyReport, AnomalySummary, FuelType, RiskLevel, Severity, Submission};

const SCOPE1_AMOUNT_CEILING: f64 = 1_000_000.0;
const SCOPE2_KWH_CEILING: f64 = 100_000_000.0;
const LARGE_ENTITY_MIN_KWH: f64 = 1_000.0;
const MAGNITUDE_RATIO: f64 = 10.0;
const BTU_PER_KWH: f64 = 3_412.0;
const LITERS_PER_GALLON: f64 = 3.78541;

const LARGE_ENTITY_KEYWORDS: [&str; 3] = ["corp", "corporation", "inc"];
const MANUFACTURING_KEYWORDS: [&str; 3] = ["manufacturing", "factory", "plant"];

/// Approximate energy content of one unit of fuel, in BTU.
fn btu_per_unit(fuel: FuelType, unit: &str) -> Option<f64> {
    match (fuel, unit.trim().to_lowercase().as_str()) {
        (FuelType::Gasoline, "gallon") => Some(120_000.0),
        (FuelType::Gasoline, "liter") => Some(120_000.0 / LITERS_PER_GALLON),
        (FuelType::Diesel, "gallon") => Some(138_000.0),
        (FuelType::Diesel, "liter") => Some(138_000.0 / LITERS_PER_GALLON),
        (FuelType::NaturalGas, "therm") => Some(100_000.0),
        (FuelType::NaturalGas, "mmbtu") => Some(1_000_000.0),
        (FuelType::NaturalGas, "m3") => Some(35_315.0),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct AnomalyDetector;

impl AnomalyDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, submission: &Submission) -> AnomalyReport {
        let mut anomalies = Vec::new();
        anomalies.extend(range_anomalies(submission));
        anomalies.extend(magnitude_anomalies(submission));
        anomalies.extend(pattern_anomalies(submission));
        anomalies.extend(business_rule_anomalies(submission));

        let summary = summarize(&anomalies);
        let risk_level = risk_level(&summary);
        let recommendations = recommendations(&anomalies);

        if !anomalies.is_empty() {
            tracing::debug!(
                company = %submission.company_trimmed(),
                count = anomalies.len(),
                risk = ?risk_level,
                "Anomalies detected"
            );
        }

        AnomalyReport {
            anomalies,
            summary,
            risk_message: risk_level.message().to_string(),
            risk_level,
            recommendations,
        }
    }
}

fn anomaly(kind: AnomalyKind, field: &str, severity: Severity, description: impl Into<String>, value: Option<f64>, recommendation: &str) -> AnomalyRecord {
    AnomalyRecord {
        kind,
        field: field.to_string(),
        severity,
        description: description.into(),
        value,
        recommendation: recommendation.to_string(),
    }
}

fn range_anomalies(submission: &Submission) -> Vec<AnomalyRecord> {
    let mut out = Vec::new();

    if let Some(amount) = submission.scope1.as_ref().map(|s| s.amount).filter(|a| a.is_finite()) {
        if amount > SCOPE1_AMOUNT_CEILING {
            out.push(anomaly(
                AnomalyKind::Range,
                "scope1.amount",
                Severity::High,
                "Extremely high Scope 1 amount",
                Some(amount),
                "Verify unit and calculation method",
            ));
        }
        if amount > 1_000.0 && amount % 1_000.0 == 0.0 {
            out.push(anomaly(
                AnomalyKind::Pattern,
                "scope1.amount",
                Severity::Low,
                "Suspiciously round number",
                Some(amount),
                "Verify if this is an estimate or actual measurement",
            ));
        }
    }

    if let Some(kwh) = submission.scope2.as_ref().map(|s| s.kwh).filter(|k| k.is_finite()) {
        if kwh > SCOPE2_KWH_CEILING {
            out.push(anomaly(
                AnomalyKind::Range,
                "scope2.kwh",
                Severity::High,
                "Extremely high kWh consumption",
                Some(kwh),
                "Verify consumption data and units",
            ));
        }
        let company = submission.company.to_lowercase();
        if kwh < LARGE_ENTITY_MIN_KWH && LARGE_ENTITY_KEYWORDS.iter().any(|k| company.contains(k)) {
            out.push(anomaly(
                AnomalyKind::Magnitude,
                "scope2.kwh",
                Severity::Medium,
                "Unusually low electricity consumption for corporation",
                Some(kwh),
                "Verify if this covers all facilities",
            ));
        }
    }
    out
}

fn magnitude_anomalies(submission: &Submission) -> Vec<AnomalyRecord> {
    let (Some(scope1), Some(scope2)) = (&submission.scope1, &submission.scope2) else {
        return Vec::new();
    };
    if !(scope1.amount > 0.0 && scope2.kwh > 0.0) {
        return Vec::new();
    }
    let Some(per_unit) = scope1.fuel().and_then(|fuel| btu_per_unit(fuel, &scope1.unit)) else {
        return Vec::new();
    };

    let ratio = scope1.amount * per_unit / (scope2.kwh * BTU_PER_KWH);
    if !ratio.is_finite() || ratio <= 0.0 {
        return Vec::new();
    }
    if ratio > MAGNITUDE_RATIO {
        vec![anomaly(
            AnomalyKind::Magnitude,
            "scope1_vs_scope2",
            Severity::Medium,
            format!("Scope 1 energy much higher than Scope 2 (ratio: {:.1})", ratio),
            Some(ratio),
            "Verify if all energy sources are properly categorized",
        )]
    } else if ratio < 1.0 / MAGNITUDE_RATIO {
        vec![anomaly(
            AnomalyKind::Magnitude,
            "scope1_vs_scope2",
            Severity::Medium,
            format!("Scope 2 energy much higher than Scope 1 (ratio: {:.1})", 1.0 / ratio),
            Some(ratio),
            "Verify energy consumption patterns",
        )]
    } else {
        Vec::new()
    }
}

/// Digits as a person would write the value: integers without a trailing ".0".
fn digit_string(value: f64) -> String {
    let text = if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    };
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Few distinct digits over a longer value, like 50000 or 1111.
pub fn has_repeated_digits(value: f64) -> bool {
    let digits = digit_string(value);
    let distinct: HashSet<char> = digits.chars().collect();
    digits.len() > 3 && distinct.len() <= 2
}

/// Integer part counts up one digit at a time, wrapping 9 to 0 (1234, 7890).
pub fn has_sequential_digits(value: f64) -> bool {
    if !(value.is_finite() && value >= 0.0 && value < 1e15) {
        return false;
    }
    let digits: Vec<u32> = format!("{}", value.trunc() as u64)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();
    digits.len() >= 4 && digits.windows(2).all(|w| w[1] == (w[0] + 1) % 10)
}

fn pattern_anomalies(submission: &Submission) -> Vec<AnomalyRecord> {
    let fields = [
        ("scope1.amount", submission.scope1.as_ref().map(|s| s.amount)),
        ("scope2.kwh", submission.scope2.as_ref().map(|s| s.kwh)),
    ];

    let mut out = Vec::new();
    for (field, value) in fields {
        let Some(value) = value.filter(|v| v.is_finite() && *v > 0.0) else {
            continue;
        };
        if has_repeated_digits(value) {
            out.push(anomaly(
                AnomalyKind::Pattern,
                field,
                Severity::Low,
                "Repeated digit pattern detected",
                Some(value),
                "Verify if this is actual data or placeholder",
            ));
        }
        if has_sequential_digits(value) {
            out.push(anomaly(
                AnomalyKind::Pattern,
                field,
                Severity::Medium,
                "Sequential digit pattern detected",
                Some(value),
                "Verify if this is actual measured data",
            ));
        }
    }
    out
}

fn business_rule_anomalies(submission: &Submission) -> Vec<AnomalyRecord> {
    let has_scope1 = submission.scope1.is_some();
    let has_scope2 = submission.scope2.is_some();
    let mut out = Vec::new();

    if has_scope1 && !has_scope2 {
        out.push(anomaly(
            AnomalyKind::BusinessRule,
            "scope2",
            Severity::Medium,
            "Scope 1 data present but no Scope 2 data",
            None,
            "Most companies have both direct and indirect emissions",
        ));
    }
    if has_scope2 && !has_scope1 {
        out.push(anomaly(
            AnomalyKind::BusinessRule,
            "scope1",
            Severity::Low,
            "Scope 2 data present but no Scope 1 data",
            None,
            "Verify if company has any direct emissions sources",
        ));
    }

    let company = submission.company.to_lowercase();
    if MANUFACTURING_KEYWORDS.iter().any(|k| company.contains(k)) && !(has_scope1 && has_scope2) {
        out.push(anomaly(
            AnomalyKind::BusinessRule,
            "emissions_completeness",
            Severity::Medium,
            "Manufacturing company missing expected emission scopes",
            None,
            "Manufacturing typically has both direct and indirect emissions",
        ));
    }
    out
}

fn summarize(anomalies: &[AnomalyRecord]) -> AnomalySummary {
    let mut by_severity = BTreeMap::new();
    let mut by_kind = BTreeMap::new();
    let mut by_field: Vec<(&str, usize)> = Vec::new();

    for a in anomalies {
        *by_severity.entry(a.severity).or_insert(0) += 1;
        *by_kind.entry(a.kind).or_insert(0) += 1;
        match by_field.iter_mut().find(|(field, _)| *field == a.field) {
            Some((_, count)) => *count += 1,
            None => by_field.push((a.field.as_str(), 1)),
        }
    }

    // first field to reach the highest count wins ties
    let most_affected_field = by_field
        .iter()
        .fold(None::<(&str, usize)>, |best, &(field, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((field, count)),
        })
        .map(|(field, _)| field.to_string());

    AnomalySummary {
        total: anomalies.len(),
        by_severity,
        by_kind,
        most_affected_field,
    }
}

fn risk_level(summary: &AnomalySummary) -> RiskLevel {
    let high = summary.count(Severity::High);
    if summary.count(Severity::Critical) > 0 {
        RiskLevel::Critical
    } else if high > 2 {
        RiskLevel::High
    } else if high > 0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn recommendations(anomalies: &[AnomalyRecord]) -> Vec<String> {
    let has_severity = |s: Severity| anomalies.iter().any(|a| a.severity == s);
    let has_kind = |k: AnomalyKind| anomalies.iter().any(|a| a.kind == k);

    let mut out = Vec::new();
    if has_severity(Severity::Critical) {
        out.push("Critical anomalies detected - halt processing until resolved".to_string());
    }
    if has_severity(Severity::High) {
        out.push("High-severity anomalies require immediate investigation".to_string());
    }
    if has_kind(AnomalyKind::Range) {
        out.push("Value range anomalies detected - verify data accuracy".to_string());
    }
    if has_kind(AnomalyKind::Pattern) {
        out.push("Pattern anomalies suggest potential data quality issues".to_string());
    }
    if anomalies.len() > 5 {
        out.push("Multiple anomalies detected - comprehensive data review recommended".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(report: &AnomalyReport) -> Vec<(AnomalyKind, &str, Severity)> {
        report
            .anomalies
            .iter()
            .map(|a| (a.kind, a.field.as_str(), a.severity))
            .collect()
    }

    #[test]
    fn test_digit_patterns() {
        assert!(has_repeated_digits(50_000.0));
        assert!(has_repeated_digits(1111.0));
        assert!(!has_repeated_digits(100.0));
        assert!(!has_repeated_digits(12_345.0));

        assert!(has_sequential_digits(1234.0));
        assert!(has_sequential_digits(7890.5));
        assert!(!has_sequential_digits(123.0));
        assert!(!has_sequential_digits(1243.0));
    }

    #[test]
    fn test_manufacturing_without_scope2() {
        let submission = Submission::new("Northern Manufacturing").with_scope1("natural_gas", 2_500.0, "therm");
        let report = AnomalyDetector::new().detect(&submission);
        let found = kinds(&report);

        assert!(found.contains(&(AnomalyKind::BusinessRule, "scope2", Severity::Medium)));
        assert!(found.contains(&(AnomalyKind::BusinessRule, "emissions_completeness", Severity::Medium)));
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_range_and_round_numbers() {
        let submission = Submission::new("Acme Corp")
            .with_scope1("diesel", 2_000_000.0, "gallon")
            .with_scope2(500.0, Some("RFC"));
        let report = AnomalyDetector::new().detect(&submission);
        let found = kinds(&report);

        assert!(found.contains(&(AnomalyKind::Range, "scope1.amount", Severity::High)));
        assert!(found.contains(&(AnomalyKind::Pattern, "scope1.amount", Severity::Low)));
        assert!(found.contains(&(AnomalyKind::Magnitude, "scope2.kwh", Severity::Medium)));
        assert!(found.contains(&(AnomalyKind::Magnitude, "scope1_vs_scope2", Severity::Medium)));
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert_eq!(report.summary.most_affected_field.as_deref(), Some("scope1.amount"));
        assert_eq!(report.recommendations[0], "High-severity anomalies require immediate investigation");
    }

    #[test]
    fn test_scope2_dominates_energy() {
        let submission = Submission::new("Acme Corp")
            .with_scope1("diesel", 100.0, "gallon")
            .with_scope2(50_000.0, Some("US_default"));
        let report = AnomalyDetector::new().detect(&submission);
        let magnitude = report
            .anomalies
            .iter()
            .find(|a| a.field == "scope1_vs_scope2")
            .unwrap();
        assert_eq!(magnitude.description, "Scope 2 energy much higher than Scope 1 (ratio: 12.4)");
        assert_eq!(report.summary.total, report.anomalies.len());
        assert_eq!(report.risk_message, "Minor anomalies detected - monitoring recommended");
    }

    #[test]
    fn test_clean_submission() {
        let submission = Submission::new("Globex")
            .with_scope1("diesel", 1_250.5, "gallon")
            .with_scope2(61_873.0, Some("WECC"));
        let report = AnomalyDetector::new().detect(&submission);
        assert!(report.is_clean());
        assert_eq!(report.summary.most_affected_field, None);
    }
}
