//! Structural validation of emissions submissions.
//!
//! [`SubmissionValidator::validate`] never fails: it collects issues and warnings and scores
//! them. [`SubmissionValidator::ensure_valid`] additionally rejects the submissions no analysis
//! can run on (missing company, negative or non-finite quantities, unsupported fuel/unit).

use crate::error::{VerdantError, VerdantResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};
use verdant_models::{FuelType, Severity, Submission};

pub const SUPPORTED_GRID_REGIONS: [&str; 4] = ["US_default", "RFC", "WECC", "SERC"];

const PLACEHOLDER_COMPANY_NAMES: [&str; 4] = ["test", "demo", "example", "sample"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub critical_issues: usize,
    pub high_issues: usize,
    pub medium_issues: usize,
    pub low_issues: usize,
    /// Mean sub-field completeness of the scope blocks that are present.
    pub completeness_score: f64,
    pub validity_score: f64,
    pub present_optional_fields: Vec<String>,
}

impl ValidationReport {
    fn issue(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        let severity = classify_issue(&message);
        self.issues.push(ValidationIssue {
            field: field.to_string(),
            message,
            severity,
        });
    }

    fn warning(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.into(),
            severity: Severity::Low,
        });
    }

    fn compile(&mut self, scope_completeness: &[f64]) {
        for issue in &self.issues {
            match issue.severity {
                Severity::Critical => self.critical_issues += 1,
                Severity::High => self.high_issues += 1,
                _ => self.medium_issues += 1,
            }
        }
        self.low_issues = self.warnings.len();
        self.valid = self.critical_issues == 0;

        if !scope_completeness.is_empty() {
            self.completeness_score = scope_completeness.iter().sum::<f64>() / scope_completeness.len() as f64;
        }

        let weighted = self.critical_issues * 4 + self.high_issues * 3 + self.medium_issues * 2 + self.low_issues;
        self.validity_score = (100.0 - weighted as f64 * 5.0).max(0.0);
    }
}

/// Critical for missing or malformed requirements, high for unsupported values, medium otherwise.
pub fn classify_issue(message: &str) -> Severity {
    let lower = message.to_lowercase();
    if lower.contains("required") || lower.contains("must be") {
        Severity::Critical
    } else if lower.contains("unsupported") || lower.contains("cannot be") {
        Severity::High
    } else {
        Severity::Medium
    }
}

pub struct SubmissionValidator {
    company_chars: Regex,
    period_format: Regex,
}

impl Default for SubmissionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionValidator {
    pub fn new() -> Self {
        Self {
            company_chars: Regex::new(r"^[a-zA-Z0-9\s.\-&,()]+$").expect("company pattern is valid"),
            period_format: Regex::new(r"^\d{4}(-\d{2}(-\d{2})?| Q[1-4])?$").expect("period pattern is valid"),
        }
    }

    pub fn validate(&self, submission: &Submission) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut scope_completeness = Vec::new();

        self.check_company(submission, &mut report);

        if let Some(scope1) = &submission.scope1 {
            let mut present = 0.0;
            let fuel = scope1.fuel();
            if scope1.fuel_type.trim().is_empty() {
                report.issue("scope1.fuel_type", "Fuel type is required for Scope 1");
            } else if fuel.is_none() {
                report.issue("scope1.fuel_type", format!("Unsupported fuel type: {}", scope1.fuel_type));
            } else {
                present += 1.0;
            }

            let amount = scope1.amount;
            if !amount.is_finite() {
                report.issue("scope1.amount", "Amount must be a finite number");
            } else if amount < 0.0 {
                report.issue("scope1.amount", "Amount cannot be negative");
            } else if amount == 0.0 {
                report.warning("scope1.amount", "Amount is zero - verify if correct");
            } else {
                present += 1.0;
                if amount > 1_000_000.0 {
                    report.warning("scope1.amount", "Very large amount - verify if correct");
                }
            }

            if scope1.unit.trim().is_empty() {
                report.issue("scope1.unit", "Unit is required for Scope 1");
            } else if let Some(fuel) = fuel {
                if fuel.accepts_unit(&scope1.unit) {
                    present += 1.0;
                } else {
                    report.issue(
                        "scope1.unit",
                        format!("Unsupported unit '{}' for fuel type '{}'", scope1.unit, fuel),
                    );
                }
            }
            scope_completeness.push(present / 3.0 * 100.0);
        }

        if let Some(scope2) = &submission.scope2 {
            let mut present = 0.0;
            let kwh = scope2.kwh;
            if !kwh.is_finite() {
                report.issue("scope2.kwh", "kWh must be a finite number");
            } else if kwh < 0.0 {
                report.issue("scope2.kwh", "kWh cannot be negative");
            } else if kwh == 0.0 {
                report.warning("scope2.kwh", "kWh is zero - verify if correct");
            } else {
                present += 1.0;
                if kwh > 100_000_000.0 {
                    report.warning("scope2.kwh", "Very large kWh value - verify if correct");
                }
            }

            if let Some(region) = scope2.grid_region.as_deref().filter(|r| !r.trim().is_empty()) {
                if SUPPORTED_GRID_REGIONS.contains(&region) {
                    present += 0.5;
                } else {
                    report.warning("scope2.grid_region", format!("Unsupported grid region: {}", region));
                }
            }
            scope_completeness.push((present * 100.0_f64).min(100.0));
        }

        self.check_optional_fields(submission, &mut report);
        report.compile(&scope_completeness);
        report
    }

    /// Runs [`validate`](Self::validate) and turns fatal problems into `InvalidSubmission`.
    pub fn ensure_valid(&self, submission: &Submission) -> VerdantResult<ValidationReport> {
        if let Err(errors) = submission.validate() {
            let (field, message) = first_validation_error(&errors);
            return Err(VerdantError::invalid_submission(field, message));
        }

        if let Some(scope1) = &submission.scope1 {
            if !scope1.amount.is_finite() {
                return Err(VerdantError::invalid_submission("scope1.amount", "Amount must be a finite number"));
            }
            let fuel = scope1.fuel().ok_or_else(|| {
                VerdantError::invalid_submission(
                    "scope1.fuel_type",
                    format!("Unsupported fuel type: {}", scope1.fuel_type),
                )
            })?;
            if !fuel.accepts_unit(&scope1.unit) {
                return Err(VerdantError::invalid_submission(
                    "scope1.unit",
                    format!("Unsupported unit '{}' for fuel type '{}'", scope1.unit, fuel),
                ));
            }
        }

        if let Some(scope2) = &submission.scope2 {
            if !scope2.kwh.is_finite() {
                return Err(VerdantError::invalid_submission("scope2.kwh", "kWh must be a finite number"));
            }
        }

        Ok(self.validate(submission))
    }

    fn check_company(&self, submission: &Submission, report: &mut ValidationReport) {
        let company = submission.company_trimmed();
        if company.is_empty() {
            report.issue("company", "Company name is required");
            return;
        }
        if company.chars().count() < 2 {
            report.issue("company", "Company name must be at least 2 characters");
        }
        if company.chars().count() > 200 {
            report.warning("company", "Company name very long (over 200 characters)");
        }
        if !self.company_chars.is_match(company) {
            report.warning("company", "Company name contains unusual characters");
        }
        if PLACEHOLDER_COMPANY_NAMES.contains(&company.to_lowercase().as_str()) {
            report.warning("company", "Company name appears to be a test value");
        }
    }

    fn check_optional_fields(&self, submission: &Submission, report: &mut ValidationReport) {
        let fields = [
            ("reporting_period", submission.reporting_period.as_deref()),
            ("facility_info", submission.facility_info.as_deref()),
            ("methodology", submission.methodology.as_deref()),
            ("emission_factors_source", submission.emission_factors_source.as_deref()),
            ("calculation_version", submission.calculation_version.as_deref()),
        ];
        for (name, value) in fields {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                report.present_optional_fields.push(name.to_string());
                if name == "reporting_period" && !self.period_format.is_match(value.trim()) {
                    report.warning("reporting_period", "Reporting period format not recognized");
                }
            }
        }
    }
}

fn first_validation_error(errors: &ValidationErrors) -> (String, String) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(error) = field_errors.first() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Validation failed for field '{}': {}", field, error.code));
                    return (field.to_string(), message);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                let (inner, message) = first_validation_error(nested);
                return (format!("{}.{}", field, inner), message);
            }
            ValidationErrorsKind::List(items) => {
                if let Some((_, nested)) = items.iter().next() {
                    let (inner, message) = first_validation_error(nested);
                    return (format!("{}.{}", field, inner), message);
                }
            }
        }
    }
    ("submission".to_string(), "Submission failed validation".to_string())
}
