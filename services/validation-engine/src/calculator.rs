//! Reported emissions from activity data, using the v0.1 factor table.

use serde::{Deserialize, Serialize};
use verdant_models::{FacilityMeasurements, FuelType, Submission};
use verdant_utils::{VerdantError, VerdantResult};

pub const FACTORS_VERSION: &str = "0.1";

const LITERS_PER_GALLON: f64 = 3.78541;
const DEFAULT_GRID_REGION: &str = "US_default";

/// kg CO2 per kWh by grid region.
const GRID_FACTORS: [(&str, f64); 4] = [("US_default", 0.4), ("RFC", 0.45), ("WECC", 0.35), ("SERC", 0.5)];

/// kg CO2 per unit of fuel, or `None` for an unsupported pair.
pub fn scope1_factor(fuel: FuelType, unit: &str) -> Option<f64> {
    match (fuel, unit.trim().to_lowercase().as_str()) {
        (FuelType::Gasoline, "gallon") => Some(8.887),
        (FuelType::Diesel, "gallon") => Some(10.21),
        (FuelType::Gasoline, "liter") => Some(8.887 / LITERS_PER_GALLON),
        (FuelType::Diesel, "liter") => Some(10.21 / LITERS_PER_GALLON),
        (FuelType::NaturalGas, "m3") => Some(1.9),
        (FuelType::NaturalGas, "therm") => Some(5.3),
        (FuelType::NaturalGas, "mmbtu") => Some(53.06),
        _ => None,
    }
}

/// Unknown or missing regions fall back to the US average.
pub fn grid_factor(region: Option<&str>) -> (&'static str, f64) {
    let region = region.map(str::trim).unwrap_or_default();
    GRID_FACTORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(region))
        .copied()
        .unwrap_or((DEFAULT_GRID_REGION, GRID_FACTORS[0].1))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeEmissions {
    pub basis: String,
    pub factor: f64,
    pub emissions_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionsEstimate {
    pub version: String,
    pub scope1: Option<ScopeEmissions>,
    pub scope2: Option<ScopeEmissions>,
    pub total_kg: f64,
    pub total_tonnes: f64,
}

impl EmissionsEstimate {
    /// Reported totals in the shape of a reference measurement; only CO2 is estimated.
    pub fn as_reported(&self) -> FacilityMeasurements {
        FacilityMeasurements {
            co2_tons: Some(self.total_tonnes),
            source: format!("calculator_v{}", self.version),
            ..FacilityMeasurements::default()
        }
    }
}

pub trait EmissionsCalculator: Send + Sync {
    fn calculate(&self, submission: &Submission) -> VerdantResult<EmissionsEstimate>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FactorTableCalculator;

impl EmissionsCalculator for FactorTableCalculator {
    fn calculate(&self, submission: &Submission) -> VerdantResult<EmissionsEstimate> {
        let scope1 = match &submission.scope1 {
            Some(activity) => {
                let fuel = activity.fuel().ok_or_else(|| {
                    VerdantError::invalid_submission("scope1.fuel_type", format!("Unsupported fuel type: {}", activity.fuel_type))
                })?;
                let factor = scope1_factor(fuel, &activity.unit).ok_or_else(|| {
                    VerdantError::invalid_submission(
                        "scope1.unit",
                        format!("Unsupported fuel/unit: {}/{}", activity.fuel_type, activity.unit),
                    )
                })?;
                Some(ScopeEmissions {
                    basis: format!("{}/{}", fuel.as_str(), activity.normalized_unit()),
                    factor,
                    emissions_kg: activity.amount * factor,
                })
            }
            None => None,
        };

        let scope2 = submission.scope2.as_ref().map(|activity| {
            let (region, factor) = grid_factor(activity.grid_region.as_deref());
            ScopeEmissions {
                basis: region.to_string(),
                factor,
                emissions_kg: activity.kwh * factor,
            }
        });

        let total_kg: f64 = scope1.iter().chain(scope2.iter()).map(|s| s.emissions_kg).sum();
        Ok(EmissionsEstimate {
            version: FACTORS_VERSION.to_string(),
            scope1,
            scope2,
            total_kg,
            total_tonnes: total_kg / 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope1_and_scope2_totals() {
        let submission = Submission::new("Acme Corp")
            .with_scope1("diesel", 100.0, "gallon")
            .with_scope2(50_000.0, Some("US_default"));
        let estimate = FactorTableCalculator.calculate(&submission).unwrap();

        assert!((estimate.scope1.as_ref().unwrap().emissions_kg - 1021.0).abs() < 1e-9);
        assert!((estimate.scope2.as_ref().unwrap().emissions_kg - 20_000.0).abs() < 1e-9);
        assert!((estimate.total_tonnes - 21.021).abs() < 1e-9);
        assert_eq!(estimate.as_reported().co2_tons, Some(estimate.total_tonnes));
    }

    #[test]
    fn test_liters_and_natural_gas() {
        assert!((scope1_factor(FuelType::Gasoline, "Liter").unwrap() - 2.3477).abs() < 1e-4);
        assert_eq!(scope1_factor(FuelType::NaturalGas, "therm"), Some(5.3));
        assert_eq!(scope1_factor(FuelType::NaturalGas, "gallon"), None);
    }

    #[test]
    fn test_grid_region_fallback() {
        assert_eq!(grid_factor(Some("wecc")), ("WECC", 0.35));
        assert_eq!(grid_factor(Some("MARS")), ("US_default", 0.4));
        assert_eq!(grid_factor(None), ("US_default", 0.4));
    }

    #[test]
    fn test_unsupported_pair_is_invalid_submission() {
        let submission = Submission::new("Acme").with_scope1("diesel", 5.0, "m3");
        let err = FactorTableCalculator.calculate(&submission).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SUBMISSION");
    }
}
