//! Facility Cache
//!
//! Read-through cache of facility batches keyed by company and state. Entries are
//! immutable once written; a write replaces the whole entry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use verdant_models::FacilityRecord;
use verdant_utils::{CacheBackend, CacheConfig, VerdantError, VerdantResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedBatch {
    pub records: Vec<FacilityRecord>,
    pub stored_at: DateTime<Utc>,
}

impl CachedBatch {
    pub fn new(records: Vec<FacilityRecord>) -> Self {
        Self {
            records,
            stored_at: Utc::now(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.stored_at
    }
}

#[async_trait]
pub trait FacilityCache: Send + Sync {
    async fn get(&self, key: &str) -> VerdantResult<Option<CachedBatch>>;

    async fn put(&self, key: &str, batch: CachedBatch) -> VerdantResult<()>;
}

/// `facility:<lowercased alphanumerics of company>[_<state>]`
pub fn cache_key(company: &str, state: Option<&str>) -> String {
    let company_clean: String = company
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    match state.map(str::trim).filter(|s| !s.is_empty()) {
        Some(state) => format!("facility:{}_{}", company_clean, state.to_lowercase()),
        None => format!("facility:{}", company_clean),
    }
}

/// Converts a configured TTL, saturating instead of overflowing.
pub fn ttl_duration(seconds: u64) -> Duration {
    Duration::from_std(std::time::Duration::from_secs(seconds)).unwrap_or(Duration::MAX)
}

/// In-process cache. Expired entries are dropped on read and swept on every write;
/// once `max_entries` live entries are held, the oldest one is evicted.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Arc<CachedBatch>>>,
    stale_ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(stale_ttl_seconds: u64) -> Self {
        Self::with_max_entries(stale_ttl_seconds, CacheConfig::default().memory_max_entries)
    }

    pub fn with_max_entries(stale_ttl_seconds: u64, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stale_ttl: ttl_duration(stale_ttl_seconds),
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_max_entries(config.stale_ttl_seconds, config.memory_max_entries)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[async_trait]
impl FacilityCache for MemoryCache {
    async fn get(&self, key: &str) -> VerdantResult<Option<CachedBatch>> {
        let entry = self.entries.read().await.get(key).cloned();
        match entry {
            Some(entry) if entry.age(Utc::now()) < self.stale_ttl => Ok(Some((*entry).clone())),
            Some(_) => {
                self.entries.write().await.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, batch: CachedBatch) -> VerdantResult<()> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.age(now) < self.stale_ttl);

        while !entries.contains_key(key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(oldest) => {
                    tracing::debug!(key = %oldest, "Evicting oldest facility cache entry");
                    entries.remove(&oldest);
                }
                None => break,
            }
        }

        entries.insert(key.to_string(), Arc::new(batch));
        Ok(())
    }
}

/// Redis-backed cache; expiry is delegated to `SET ... EX`.
pub struct RedisCache {
    connection: ConnectionManager,
    prefix: String,
    ttl_seconds: u64,
}

impl RedisCache {
    pub async fn connect(config: &CacheConfig) -> VerdantResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;
        tracing::info!(prefix = %config.key_prefix, "Connected to Redis facility cache");
        Ok(Self {
            connection,
            prefix: config.key_prefix.clone(),
            ttl_seconds: config.stale_ttl_seconds,
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl FacilityCache for RedisCache {
    async fn get(&self, key: &str) -> VerdantResult<Option<CachedBatch>> {
        let mut con = self.connection.clone();
        let raw: Option<String> = con.get(self.full_key(key)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, batch: CachedBatch) -> VerdantResult<()> {
        let payload = serde_json::to_string(&batch)?;
        let mut con = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(self.full_key(key))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut con)
            .await?;
        Ok(())
    }
}

/// Builds the configured backend.
pub async fn build_cache(config: &CacheConfig) -> VerdantResult<Arc<dyn FacilityCache>> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::from_config(config))),
        CacheBackend::Redis => {
            let cache = RedisCache::connect(config)
                .await
                .map_err(|e| VerdantError::cache(format!("redis unavailable at {}: {}", config.redis_url, e)))?;
            Ok(Arc::new(cache))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(cache_key("Acme Corp.", None), "facility:acmecorp");
        assert_eq!(cache_key("Acme Corp.", Some("TX")), "facility:acmecorp_tx");
        assert_eq!(cache_key("Acme Corp.", Some("  ")), "facility:acmecorp");
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new(3600);
        let batch = CachedBatch::new(vec![FacilityRecord::new("1", "ACME PLANT", "TRI")]);
        cache.put("facility:acme", batch.clone()).await.unwrap();

        let hit = cache.get("facility:acme").await.unwrap();
        assert_eq!(hit, Some(batch));
        assert_eq!(cache.get("facility:other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_evicts_expired_entries() {
        let cache = MemoryCache::new(60);
        let mut batch = CachedBatch::new(vec![FacilityRecord::new("1", "ACME PLANT", "TRI")]);
        batch.stored_at = Utc::now() - Duration::seconds(120);
        cache.put("facility:acme", batch).await.unwrap();

        assert_eq!(cache.get("facility:acme").await.unwrap(), None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_memory_cache_sweeps_expired_entries_on_write() {
        let cache = MemoryCache::new(60);
        for i in 0..100 {
            let mut batch = CachedBatch::new(vec![]);
            batch.stored_at = Utc::now() - Duration::seconds(120);
            cache.put(&format!("facility:old{}", i), batch).await.unwrap();
        }

        cache.put("facility:acme", CachedBatch::new(vec![])).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_cache_evicts_oldest_at_capacity() {
        let cache = MemoryCache::with_max_entries(3600, 2);
        let mut oldest = CachedBatch::new(vec![FacilityRecord::new("1", "ACME PLANT", "TRI")]);
        oldest.stored_at = Utc::now() - Duration::seconds(30);
        cache.put("facility:acme", oldest).await.unwrap();
        cache.put("facility:globex", CachedBatch::new(vec![])).await.unwrap();
        cache.put("facility:initech", CachedBatch::new(vec![])).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("facility:acme").await.unwrap(), None);
        assert!(cache.get("facility:initech").await.unwrap().is_some());

        // rewriting a held key never evicts a neighbour
        cache.put("facility:globex", CachedBatch::new(vec![])).await.unwrap();
        assert!(cache.get("facility:initech").await.unwrap().is_some());
    }

    #[test]
    fn test_ttl_duration_saturates() {
        assert_eq!(ttl_duration(90), Duration::seconds(90));
        assert_eq!(ttl_duration(u64::MAX), Duration::MAX);
    }

    proptest! {
        #[test]
        fn prop_cache_key_ignores_case_and_punctuation(name in "[A-Za-z]{1,8}( [A-Za-z]{1,8}){0,3}") {
            let shouted = name.to_uppercase();
            let punctuated = format!("{}.,", name.replace(' ', "-"));
            prop_assert_eq!(cache_key(&name, Some("tx")), cache_key(&shouted, Some("TX")));
            prop_assert_eq!(cache_key(&name, None), cache_key(&punctuated, None));
        }
    }
}
