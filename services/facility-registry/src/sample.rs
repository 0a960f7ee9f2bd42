//! Deterministic placeholder facilities used when every registry tier is exhausted.

use verdant_models::{FacilityRecord, SYNTHESIZED_SOURCE};

const SAMPLE_NOTE: &str = "Sample data generated because registry sources were unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Industry {
    Manufacturing,
    Energy,
    Chemical,
    Automotive,
    Aerospace,
    Technology,
    General,
}

impl Industry {
    /// Checked in order; the first industry with a keyword contained in the name wins.
    const KEYWORDS: [(Industry, &'static [&'static str]); 6] = [
        (Industry::Manufacturing, &["manufacturing", "factory", "plant", "production", "assembly"]),
        (Industry::Energy, &["energy", "power", "electric", "utility", "generation"]),
        (Industry::Chemical, &["chemical", "petrochemical", "refinery", "oil", "gas"]),
        (Industry::Automotive, &["automotive", "auto", "motor", "vehicle", "car"]),
        (Industry::Aerospace, &["aerospace", "aircraft", "aviation", "boeing", "airbus"]),
        (Industry::Technology, &["tech", "technology", "software", "data", "computer"]),
    ];

    pub fn detect(company: &str) -> Self {
        let lower = company.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(industry, _)| *industry)
            .unwrap_or(Industry::General)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Industry::Manufacturing => "MANUFACTURING",
            Industry::Energy => "ENERGY",
            Industry::Chemical => "CHEMICAL",
            Industry::Automotive => "AUTOMOTIVE",
            Industry::Aerospace => "AEROSPACE",
            Industry::Technology => "TECHNOLOGY",
            Industry::General => "GENERAL",
        }
    }

    /// (name suffix, default state, county, city, industry type)
    fn templates(&self) -> &'static [(&'static str, &'static str, &'static str, &'static str, &'static str)] {
        match self {
            Industry::Manufacturing => &[
                ("Manufacturing Plant", "OH", "Manufacturing County", "Industrial City", "Manufacturing"),
                ("Assembly Facility", "MI", "Assembly County", "Production City", "Manufacturing"),
            ],
            Industry::Energy => &[("Power Plant", "TX", "Energy County", "Power City", "Energy Generation")],
            Industry::Chemical => &[("Chemical Plant", "LA", "Chemical County", "Refinery City", "Chemical Processing")],
            Industry::Automotive => &[
                ("Vehicle Assembly Plant", "MI", "Motor County", "Assembly City", "Automotive"),
                ("Parts Facility", "OH", "Parts County", "Supplier City", "Automotive"),
            ],
            Industry::Aerospace => &[("Aircraft Facility", "WA", "Aviation County", "Airfield City", "Aerospace")],
            Industry::Technology => &[("Data Center", "VA", "Tech County", "Server City", "Technology")],
            Industry::General => &[("Facility", "CA", "Business County", "Corporate City", "General Business")],
        }
    }
}

/// Placeholder records for `company`, always non-empty and identical for identical input.
pub fn synthesize(company: &str, state: Option<&str>) -> Vec<FacilityRecord> {
    let company = company.trim();
    let industry = Industry::detect(company);
    let state = state.map(str::trim).filter(|s| !s.is_empty());

    industry
        .templates()
        .iter()
        .enumerate()
        .map(|(i, (suffix, default_state, county, city, industry_type))| FacilityRecord {
            registry_id: format!("SAMPLE-{}-{}", industry.code(), i + 1),
            facility_name: format!("{} {}", company, suffix),
            state: Some(state.unwrap_or(default_state).to_uppercase()),
            county: Some(county.to_string()),
            city: Some(city.to_string()),
            zip_code: None,
            source: SYNTHESIZED_SOURCE.to_string(),
            industry_type: Some(industry_type.to_string()),
            confidence_note: Some(SAMPLE_NOTE.to_string()),
        })
        .collect()
}
