//! Verdant Validation Engine
//!
//! Decides whether a self-reported emissions submission is trustworthy enough to
//! file. Each analysis is a pure function over the submission; [`ValidationEngine`]
//! sequences them around a [`FacilitySource`](verdant_facility_registry::FacilitySource)
//! and returns a [`ConfidenceReport`](verdant_models::ConfidenceReport) with every
//! intermediate result attached.

pub mod anomaly;
pub mod calculator;
pub mod confidence;
pub mod deviation;
pub mod engine;
pub mod flags;
pub mod mapping;
pub mod matcher;
pub mod middleware;
pub mod quality;
pub mod routes;

pub use anomaly::AnomalyDetector;
pub use calculator::{EmissionsCalculator, EmissionsEstimate, FactorTableCalculator};
pub use confidence::{ConfidenceAggregator, ConfidenceInputs};
pub use deviation::{Comparison, DeviationDetector};
pub use engine::{EvaluationOutcome, ValidationEngine};
pub use flags::FlagPolicy;
pub use mapping::{CompanyMappingStore, InMemoryMappingStore};
pub use matcher::{FacilityMatcher, NameNormalizer};
pub use quality::QualityScorer;
pub use routes::{create_router, AppState};
