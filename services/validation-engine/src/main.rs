//! Verdant Validation Service
//!
//! Serves submission validation over HTTP.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use verdant_facility_registry::{build_cache, FacilityCache, MemoryCache, SourceClient};
use verdant_utils::{init_logging, AppConfig};
use verdant_validation_engine::{create_router, AppState, ValidationEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        AppConfig::default()
    });
    config.validate()?;

    init_logging(&config.logging)?;
    info!("Starting Verdant Validation Engine");

    let cache: Arc<dyn FacilityCache> = match build_cache(&config.cache).await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(error = %e, "Cache backend unavailable, falling back to in-memory cache");
            Arc::new(MemoryCache::from_config(&config.cache))
        }
    };
    let source = SourceClient::from_config(&config.sources, &config.cache, cache)?;
    if config.sources.api_key.is_none() {
        warn!("No measurements API key configured; quantitative comparisons will be skipped");
    }

    let engine = ValidationEngine::new(Arc::new(source), &config.thresholds)
        .with_fetch_limit(config.sources.fetch_limit);
    let app = create_router(AppState::new(engine));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Validation Engine listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
