//! Tiered facility lookup.
//!
//! Order: fresh cache entry, primary endpoints, backup endpoints, alternate-schema
//! services, last-known-good cache entry, synthesized sample. The first non-empty
//! batch wins. Nothing in here returns an error to the caller.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use verdant_models::{FacilityMeasurements, SourceBatch, SourceTag};
use verdant_utils::{CacheConfig, SourcesConfig};

use crate::adapters::{
    build_url, EchoAdapter, EndpointTier, EnvirofactsEndpoint, FacilityQuery, FrsAdapter, HttpContext,
    SourceAdapter, TriAdapter,
};
use crate::cache::{cache_key, ttl_duration, CachedBatch, FacilityCache};
use crate::measurements::MeasurementsClient;
use crate::retry::RetryPolicy;
use crate::sample;

/// What the validation engine needs from the registry layer.
#[async_trait]
pub trait FacilitySource: Send + Sync {
    async fn search(&self, company: &str, state: Option<&str>, limit: usize) -> SourceBatch;

    async fn annual_measurements(&self, facility_id: &str, year: i32) -> Option<FacilityMeasurements>;

    /// Reachability per configured endpoint; empty when the source has none.
    async fn endpoint_health(&self) -> BTreeMap<String, bool> {
        BTreeMap::new()
    }
}

pub struct SourceClient {
    adapters: Vec<Box<dyn SourceAdapter>>,
    cache: Arc<dyn FacilityCache>,
    fresh_ttl: chrono::Duration,
    measurements: Option<MeasurementsClient>,
    health_endpoints: Vec<String>,
    health_http: Option<HttpContext>,
    health_timeout: Duration,
}

impl SourceClient {
    /// Client with an explicit adapter chain and no measurements or health checks.
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>, cache: Arc<dyn FacilityCache>, fresh_ttl_seconds: u64) -> Self {
        Self {
            adapters,
            cache,
            fresh_ttl: ttl_duration(fresh_ttl_seconds),
            measurements: None,
            health_endpoints: Vec::new(),
            health_http: None,
            health_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_measurements(mut self, measurements: MeasurementsClient) -> Self {
        self.measurements = Some(measurements);
        self
    }

    pub fn with_health_checks(mut self, endpoints: Vec<String>, http: HttpContext, timeout: Duration) -> Self {
        self.health_endpoints = endpoints;
        self.health_http = Some(http);
        self.health_timeout = timeout;
        self
    }

    /// Builds the full chain from configuration.
    pub fn from_config(sources: &SourcesConfig, cache_config: &CacheConfig, cache: Arc<dyn FacilityCache>) -> Result<Self> {
        let http = HttpContext::new(&sources.user_agent, RetryPolicy::from_config(sources))?;
        let primary_timeout = Duration::from_secs(sources.request_timeout_seconds);
        let alternate_timeout = Duration::from_secs(sources.alternate_timeout_seconds);

        let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
        for endpoint in &sources.primary_endpoints {
            adapters.push(Box::new(EnvirofactsEndpoint::new(
                endpoint,
                EndpointTier::Primary,
                http.clone(),
                primary_timeout,
            )));
        }
        for endpoint in &sources.backup_endpoints {
            adapters.push(Box::new(EnvirofactsEndpoint::new(
                endpoint,
                EndpointTier::Backup,
                http.clone(),
                primary_timeout,
            )));
        }
        adapters.push(Box::new(EchoAdapter::new(sources.echo_urls.clone(), http.clone(), alternate_timeout)));
        adapters.push(Box::new(FrsAdapter::new(&sources.frs_url, http.clone(), alternate_timeout)));
        adapters.push(Box::new(TriAdapter::new(&sources.tri_url, http.clone(), alternate_timeout)));

        let measurements = MeasurementsClient::new(
            &sources.measurements_url,
            sources.api_key.clone(),
            http.clone(),
            primary_timeout,
        );
        let health_http = HttpContext {
            client: http.client.clone(),
            retry: RetryPolicy::none(),
        };
        let health_endpoints = sources
            .primary_endpoints
            .iter()
            .chain(sources.backup_endpoints.iter())
            .cloned()
            .collect();

        tracing::info!(
            adapters = adapters.len(),
            measurements = measurements.is_configured(),
            cache_fresh_ttl = cache_config.fresh_ttl_seconds,
            "Facility source client configured"
        );

        Ok(Self::new(adapters, cache, cache_config.fresh_ttl_seconds)
            .with_measurements(measurements)
            .with_health_checks(
                health_endpoints,
                health_http,
                Duration::from_secs(sources.health_timeout_seconds),
            ))
    }

    /// Always returns a non-empty batch for a non-empty company name.
    pub async fn fetch(&self, company: &str, state: Option<&str>, limit: usize) -> SourceBatch {
        let query = FacilityQuery::new(company, state, limit);
        let key = cache_key(&query.company, query.state.as_deref());
        let cached = self.read_cache(&key).await;

        if let Some(entry) = &cached {
            if entry.age(Utc::now()) < self.fresh_ttl {
                tracing::debug!(cache_key = %key, count = entry.records.len(), "Serving fresh cache entry");
                return SourceBatch::new(entry.records.clone(), SourceTag::Cached);
            }
        }

        for adapter in &self.adapters {
            if let Some(batch) = adapter.fetch(&query).await {
                if batch.is_empty() {
                    continue;
                }
                if batch.source.is_live() {
                    self.write_cache(&key, &batch).await;
                }
                return batch;
            }
            tracing::debug!(adapter = adapter.name(), company = %query.company, "Source tier yielded nothing");
        }

        if let Some(entry) = cached {
            tracing::warn!(
                company = %query.company,
                age_seconds = entry.age(Utc::now()).num_seconds(),
                "All live sources failed, serving last-known-good cache entry"
            );
            return SourceBatch::new(entry.records, SourceTag::Cached);
        }

        tracing::warn!(company = %query.company, "All sources failed, synthesizing sample facilities");
        SourceBatch::new(sample::synthesize(&query.company, query.state.as_deref()), SourceTag::Sample)
    }

    async fn read_cache(&self, key: &str) -> Option<CachedBatch> {
        match self.cache.get(key).await {
            Ok(entry) => entry.filter(|e| !e.records.is_empty()),
            Err(err) => {
                tracing::warn!(cache_key = key, error = %err, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn write_cache(&self, key: &str, batch: &SourceBatch) {
        if let Err(err) = self.cache.put(key, CachedBatch::new(batch.records.clone())).await {
            tracing::warn!(cache_key = key, error = %err, "Cache write failed");
        }
    }

    pub async fn annual_measurements(&self, facility_id: &str, year: i32) -> Option<FacilityMeasurements> {
        match &self.measurements {
            Some(client) => client.annual(facility_id, year).await,
            None => None,
        }
    }

    pub async fn endpoint_health(&self) -> BTreeMap<String, bool> {
        let Some(http) = &self.health_http else {
            return BTreeMap::new();
        };

        let checks = self.health_endpoints.iter().map(|endpoint| async move {
            let healthy = match build_url(endpoint, &["tri_facility", "rows", "0:1", "JSON"]) {
                Ok(url) => http.get_json(url, self.health_timeout).await.is_ok(),
                Err(_) => false,
            };
            if !healthy {
                tracing::warn!(endpoint = %endpoint, "Endpoint health check failed");
            }
            (endpoint.clone(), healthy)
        });
        join_all(checks).await.into_iter().collect()
    }
}

#[async_trait]
impl FacilitySource for SourceClient {
    async fn search(&self, company: &str, state: Option<&str>, limit: usize) -> SourceBatch {
        self.fetch(company, state, limit).await
    }

    async fn annual_measurements(&self, facility_id: &str, year: i32) -> Option<FacilityMeasurements> {
        SourceClient::annual_measurements(self, facility_id, year).await
    }

    async fn endpoint_health(&self) -> BTreeMap<String, bool> {
        SourceClient::endpoint_health(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use verdant_models::FacilityRecord;

    struct FixedAdapter {
        batch: Option<SourceBatch>,
    }

    #[async_trait]
    impl SourceAdapter for FixedAdapter {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, _query: &FacilityQuery) -> Option<SourceBatch> {
            self.batch.clone()
        }
    }

    fn primary(records: Vec<FacilityRecord>) -> SourceBatch {
        SourceBatch::new(records, SourceTag::Primary { endpoint: "http://primary".into() })
    }

    #[tokio::test]
    async fn test_first_non_empty_tier_wins_and_is_cached() {
        let cache = Arc::new(MemoryCache::new(3600));
        let client = SourceClient::new(
            vec![
                Box::new(FixedAdapter { batch: None }),
                Box::new(FixedAdapter { batch: Some(primary(vec![])) }),
                Box::new(FixedAdapter {
                    batch: Some(primary(vec![FacilityRecord::new("1", "ACME PLANT", "TRI")])),
                }),
            ],
            cache.clone(),
            900,
        );

        let batch = client.fetch("Acme", None, 10).await;
        assert!(matches!(batch.source, SourceTag::Primary { .. }));
        assert_eq!(cache.len().await, 1);

        let again = client.fetch("Acme", None, 10).await;
        assert_eq!(again.source, SourceTag::Cached);
        assert_eq!(again.records, batch.records);
    }

    #[tokio::test]
    async fn test_stale_entry_served_only_after_live_tiers() {
        let cache = Arc::new(MemoryCache::new(86_400));
        let mut entry = CachedBatch::new(vec![FacilityRecord::new("9", "ACME OLD SITE", "TRI")]);
        entry.stored_at = Utc::now() - chrono::Duration::seconds(3_600);
        cache.put(&cache_key("Acme", None), entry).await.unwrap();

        let client = SourceClient::new(vec![Box::new(FixedAdapter { batch: None })], cache, 900);
        let batch = client.fetch("Acme", None, 10).await;
        assert_eq!(batch.source, SourceTag::Cached);
        assert_eq!(batch.records[0].registry_id, "9");
    }

    #[tokio::test]
    async fn test_sample_is_last_resort() {
        let client = SourceClient::new(Vec::new(), Arc::new(MemoryCache::default()), 900);
        let batch = client.fetch("Acme Corp", Some("tx"), 10).await;
        assert_eq!(batch.source, SourceTag::Sample);
        assert!(!batch.is_empty());
        assert!(batch.records.iter().all(|r| r.is_synthesized()));
        assert!(client.endpoint_health().await.is_empty());
        assert!(client.annual_measurements("1", 2023).await.is_none());
    }
}
