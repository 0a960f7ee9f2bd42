use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerdantError {
    #[error("Invalid submission: {field} - {message}")]
    InvalidSubmission { field: String, message: String },

    #[error("Invalid request: {field} - {message}")]
    InvalidRequest { field: String, message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl VerdantError {
    pub fn invalid_submission(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSubmission {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_request(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSubmission { .. } => "INVALID_SUBMISSION",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Cache { .. } => "CACHE_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidSubmission { .. } => 400,
            Self::InvalidRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Configuration { .. } => 500,
            Self::ExternalService { .. } => 502,
            Self::Cache { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }
}

pub type VerdantResult<T> = Result<T, VerdantError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<VerdantError> for ErrorResponse {
    fn from(error: VerdantError) -> Self {
        let details = match &error {
            VerdantError::InvalidSubmission { field, .. } | VerdantError::InvalidRequest { field, .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        };
        Self {
            error: error.to_string(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            details,
        }
    }
}

// Conversion from common error types
impl From<redis::RedisError> for VerdantError {
    fn from(error: redis::RedisError) -> Self {
        Self::cache(error.to_string())
    }
}

impl From<reqwest::Error> for VerdantError {
    fn from(error: reqwest::Error) -> Self {
        Self::external_service("HTTP Client", error.to_string())
    }
}

impl From<serde_json::Error> for VerdantError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal(format!("JSON: {}", error))
    }
}

impl From<config::ConfigError> for VerdantError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}
