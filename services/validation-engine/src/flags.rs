//! Cross-validation flags derived from matching, provenance and deviations.

use verdant_models::{DeviationRecord, FlagCode, MatchSummary, Pollutant, Severity, SourceTag, ValidationFlag};
use verdant_utils::{PollutantThresholds, ThresholdsConfig};

/// Match-count limits that drive the density flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagPolicy {
    pub min_match_count: usize,
    pub low_match_density: usize,
}

impl Default for FlagPolicy {
    fn default() -> Self {
        Self::from_thresholds(&ThresholdsConfig::default())
    }
}

impl FlagPolicy {
    pub fn from_thresholds(thresholds: &ThresholdsConfig) -> Self {
        Self {
            min_match_count: thresholds.min_match_count,
            low_match_density: thresholds.low_match_density,
        }
    }

    /// Flags in a fixed order: matching, state, deviations, provenance.
    pub fn derive(
        &self,
        matches: &MatchSummary,
        requested_state: Option<&str>,
        deviations: &[DeviationRecord],
        source: &SourceTag,
    ) -> Vec<ValidationFlag> {
        let mut flags = Vec::new();
        let count = matches.matches_count();

        if count < self.min_match_count {
            flags.push(ValidationFlag::new(
                FlagCode::NoFacilityMatch,
                Severity::High,
                format!("No facility matches found for {}", matches.company.trim()),
            ));
        } else if count < self.low_match_density {
            flags.push(ValidationFlag::new(
                FlagCode::LowMatchDensity,
                Severity::Medium,
                format!("Only {} facility match(es) found", count),
            ));
        }

        if let Some(state) = requested_state.map(str::trim).filter(|s| !s.is_empty()) {
            if count > 0 && !matches.matches.iter().any(|m| m.facility.in_state(state)) {
                flags.push(ValidationFlag::new(
                    FlagCode::StateMismatch,
                    Severity::Medium,
                    format!("No matched facility is located in {}", state.to_uppercase()),
                ));
            }
        }

        for deviation in deviations.iter().filter(|d| d.threshold_exceeded) {
            flags.push(ValidationFlag::new(
                FlagCode::QuantitativeDeviation,
                deviation.severity.flag_severity(),
                format!(
                    "{} reported {:.2} vs reference {:.2} ({:.2}% deviation, threshold {}%)",
                    deviation.pollutant, deviation.reported, deviation.reference, deviation.deviation_pct, deviation.threshold
                ),
            ));
        }

        if source.is_sample() {
            flags.push(ValidationFlag::new(
                FlagCode::SynthesizedSourceData,
                Severity::Medium,
                "Facility data was synthesized because no registry source responded",
            ));
        }

        flags
    }
}

pub fn pollutant_threshold(thresholds: &PollutantThresholds, pollutant: Pollutant) -> f64 {
    match pollutant {
        Pollutant::Co2 => thresholds.co2,
        Pollutant::Nox => thresholds.nox,
        Pollutant::So2 => thresholds.so2,
    }
}
