pub mod config;
pub mod logging;
pub mod error;
pub mod validation;

pub use config::*;
pub use logging::*;
pub use error::*;
pub use validation::*;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use verdant_models::Submission;

    #[test]
    fn test_config_loading() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn test_error_handling() {
        let error = VerdantError::invalid_submission("company", "Company name is required");
        assert_eq!(error.error_code(), "INVALID_SUBMISSION");
        assert_eq!(error.http_status_code(), 400);

        let response = ErrorResponse::from(error);
        assert_eq!(response.code, "INVALID_SUBMISSION");
        assert_eq!(response.details.unwrap()["field"], "company");
    }

    proptest! {
        #[test]
        fn validity_score_is_bounded(
            company in "[A-Za-z!@#]{0,12}",
            amount in -10.0f64..2_000_000.0,
            kwh in -10.0f64..200_000_000.0
        ) {
            let submission = Submission::new(company)
                .with_scope1("diesel", amount, "gallon")
                .with_scope2(kwh, Some("RFC"));
            let report = SubmissionValidator::new().validate(&submission);
            prop_assert!((0.0..=100.0).contains(&report.validity_score));
            prop_assert!((0.0..=100.0).contains(&report.completeness_score));
        }
    }
}
