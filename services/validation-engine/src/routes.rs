//! HTTP surface over the validation engine.

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use verdant_models::{CompanyFacilityMapping, Submission};
use verdant_utils::{ErrorResponse, VerdantError};

use crate::engine::{EvaluationOutcome, ValidationEngine};
use crate::middleware::request_id_middleware;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ValidationEngine>,
}

impl AppState {
    pub fn new(engine: ValidationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/sources", get(source_health))
        .route("/api/v1/validations", post(validate))
        .route("/api/v1/mappings", get(list_mappings).post(save_mapping))
        .route("/api/v1/mappings/:company", get(get_mapping))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers([header::CONTENT_TYPE]),
                ),
        )
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "validation-engine",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceHealthResponse {
    pub status: String,
    pub healthy: usize,
    pub total: usize,
    pub endpoints: BTreeMap<String, bool>,
}

async fn source_health(State(state): State<AppState>) -> Json<SourceHealthResponse> {
    let endpoints = state.engine.source().endpoint_health().await;
    let healthy = endpoints.values().filter(|ok| **ok).count();
    let total = endpoints.len();
    let status = if healthy == total {
        "healthy"
    } else if healthy > 0 {
        "degraded"
    } else {
        "unhealthy"
    };
    Json(SourceHealthResponse {
        status: status.to_string(),
        healthy,
        total,
        endpoints,
    })
}

#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    pub submission: Submission,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

/// Maps a [`VerdantError`] onto its status code and JSON error body.
pub struct ApiError(VerdantError);

impl From<VerdantError> for ApiError {
    fn from(error: VerdantError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}

async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidationRequest>,
) -> Result<Json<EvaluationOutcome>, ApiError> {
    let outcome = state
        .engine
        .evaluate(&request.submission, request.state.as_deref(), request.year)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Submission rejected");
            e
        })?;
    Ok(Json(outcome))
}

const MAX_MAPPING_PAGE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct MappingRequest {
    pub company: String,
    pub facility_id: String,
    /// Defaults to the facility id.
    #[serde(default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MappingPage {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_mapping_limit")]
    pub limit: usize,
}

fn default_mapping_limit() -> usize {
    100
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MappingListResponse {
    pub data: Vec<CompanyFacilityMapping>,
    pub count: usize,
}

async fn save_mapping(
    State(state): State<AppState>,
    Json(request): Json<MappingRequest>,
) -> Result<Json<CompanyFacilityMapping>, ApiError> {
    let facility_name = request
        .facility_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| request.facility_id.trim().to_string());
    let mapping = CompanyFacilityMapping {
        company: request.company,
        facility_id: request.facility_id,
        facility_name,
        state: request.state,
        notes: request.notes,
    };
    let stored = state.engine.mappings().save(mapping).await?;
    Ok(Json(stored))
}

async fn get_mapping(
    State(state): State<AppState>,
    Path(company): Path<String>,
) -> Result<Json<CompanyFacilityMapping>, ApiError> {
    match state.engine.mappings().lookup(&company).await {
        Some(mapping) => Ok(Json(mapping)),
        None => Err(VerdantError::not_found(format!("mapping for {}", company)).into()),
    }
}

async fn list_mappings(
    State(state): State<AppState>,
    Query(page): Query<MappingPage>,
) -> Result<Json<MappingListResponse>, ApiError> {
    if page.limit == 0 || page.limit > MAX_MAPPING_PAGE {
        return Err(VerdantError::invalid_request(
            "limit",
            format!("limit must be within 1..={}", MAX_MAPPING_PAGE),
        )
        .into());
    }
    let data = state.engine.mappings().list(page.offset, page.limit).await;
    Ok(Json(MappingListResponse { count: data.len(), data }))
}
