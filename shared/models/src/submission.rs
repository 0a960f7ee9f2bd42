//! Emissions submission models for the Verdant validation engine.
//!
//! A submission is the immutable input to every validation pass: the reporting
//! company, optional Scope 1 (direct fuel combustion) and Scope 2 (purchased
//! electricity) activity data, and optional provenance metadata.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Optional metadata fields that count towards the completeness bonus.
pub const COMPLETENESS_OPTIONAL_FIELDS: [&str; 3] = ["facility_info", "reporting_period", "methodology"];

/// A company's self-reported emissions submission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Default)]
pub struct Submission {
    #[validate(custom = "validate_company_name")]
    pub company: String,
    #[validate]
    #[serde(default)]
    pub scope1: Option<Scope1Activity>,
    #[validate]
    #[serde(default)]
    pub scope2: Option<Scope2Activity>,
    #[serde(default)]
    pub reporting_period: Option<String>,
    #[serde(default)]
    pub methodology: Option<String>,
    #[serde(default)]
    pub emission_factors_source: Option<String>,
    #[serde(default)]
    pub calculation_version: Option<String>,
    #[serde(default)]
    pub uncertainty: Option<f64>,
    #[serde(default)]
    pub data_collection_date: Option<String>,
    #[serde(default)]
    pub facility_info: Option<String>,
}

/// Scope 1 activity: fuel burned on site.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Scope1Activity {
    #[validate(length(min = 1, message = "Fuel type is required for Scope 1"))]
    pub fuel_type: String,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: f64,
    #[validate(length(min = 1, message = "Unit is required for Scope 1"))]
    pub unit: String,
}

/// Scope 2 activity: purchased electricity.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Scope2Activity {
    #[validate(range(min = 0.0, message = "kWh cannot be negative"))]
    pub kwh: f64,
    #[serde(default)]
    pub grid_region: Option<String>,
}

/// Fuels with a known emission factor and energy content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Gasoline,
    Diesel,
    NaturalGas,
}

impl FuelType {
    pub const ALL: [FuelType; 3] = [FuelType::Gasoline, FuelType::Diesel, FuelType::NaturalGas];

    /// Parses a fuel type as written in submissions (`natural_gas`, `Diesel`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gasoline" => Some(Self::Gasoline),
            "diesel" => Some(Self::Diesel),
            "natural_gas" => Some(Self::NaturalGas),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gasoline => "gasoline",
            Self::Diesel => "diesel",
            Self::NaturalGas => "natural_gas",
        }
    }

    /// Units an amount of this fuel may be reported in.
    pub fn supported_units(&self) -> &'static [&'static str] {
        match self {
            Self::Gasoline | Self::Diesel => &["gallon", "liter"],
            Self::NaturalGas => &["m3", "therm", "mmbtu"],
        }
    }

    pub fn accepts_unit(&self, unit: &str) -> bool {
        let unit = unit.trim().to_lowercase();
        self.supported_units().iter().any(|u| *u == unit)
    }
}

impl std::fmt::Display for FuelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Scope1Activity {
    pub fn new(fuel_type: impl Into<String>, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            fuel_type: fuel_type.into(),
            amount,
            unit: unit.into(),
        }
    }

    /// Parsed fuel type, `None` when the submitted value is not supported.
    pub fn fuel(&self) -> Option<FuelType> {
        FuelType::parse(&self.fuel_type)
    }

    /// Lowercased unit as used for factor lookups.
    pub fn normalized_unit(&self) -> String {
        self.unit.trim().to_lowercase()
    }
}

impl Scope2Activity {
    pub fn new(kwh: f64, grid_region: Option<&str>) -> Self {
        Self {
            kwh,
            grid_region: grid_region.map(str::to_string),
        }
    }
}

impl Submission {
    /// Creates a submission carrying only the company name
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            ..Self::default()
        }
    }

    pub fn with_scope1(mut self, fuel_type: &str, amount: f64, unit: &str) -> Self {
        self.scope1 = Some(Scope1Activity::new(fuel_type, amount, unit));
        self
    }

    pub fn with_scope2(mut self, kwh: f64, grid_region: Option<&str>) -> Self {
        self.scope2 = Some(Scope2Activity::new(kwh, grid_region));
        self
    }

    pub fn with_reporting_period(mut self, period: &str) -> Self {
        self.reporting_period = Some(period.to_string());
        self
    }

    pub fn with_methodology(mut self, methodology: &str) -> Self {
        self.methodology = Some(methodology.to_string());
        self
    }

    pub fn with_emission_factors_source(mut self, source: &str) -> Self {
        self.emission_factors_source = Some(source.to_string());
        self
    }

    pub fn company_trimmed(&self) -> &str {
        self.company.trim()
    }

    /// Year the reporting period starts in.
    ///
    /// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and `YYYY Qn`; anything else
    /// yields `None`.
    pub fn reporting_year(&self) -> Option<i32> {
        let period = self.reporting_period.as_deref()?.trim();
        let bytes = period.as_bytes();
        if bytes.len() < 4 || !bytes[..4].iter().all(u8::is_ascii_digit) {
            return None;
        }
        match bytes.get(4) {
            None | Some(b'-') | Some(b' ') => period[..4].parse().ok(),
            _ => None,
        }
    }

    /// Names of the completeness-relevant optional fields that carry a value.
    pub fn completeness_optional_present(&self) -> Vec<&'static str> {
        COMPLETENESS_OPTIONAL_FIELDS
            .iter()
            .copied()
            .filter(|field| match *field {
                "facility_info" => is_filled(self.facility_info.as_deref()),
                "reporting_period" => is_filled(self.reporting_period.as_deref()),
                "methodology" => is_filled(self.methodology.as_deref()),
                _ => false,
            })
            .collect()
    }

    pub fn has_uncertainty(&self) -> bool {
        self.uncertainty.map(|u| u.is_finite()).unwrap_or(false)
    }
}

/// True when an optional text field is present and not blank.
pub fn is_filled(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn validate_company_name(company: &str) -> Result<(), ValidationError> {
    if company.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("Company name is required".into());
        return Err(error);
    }
    Ok(())
}
