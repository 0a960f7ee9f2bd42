//! Curated company to facility mappings.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use verdant_models::CompanyFacilityMapping;
use verdant_utils::{VerdantError, VerdantResult};

use crate::matcher::NameNormalizer;

#[async_trait]
pub trait CompanyMappingStore: Send + Sync {
    async fn lookup(&self, company: &str) -> Option<CompanyFacilityMapping>;

    /// Stores `mapping`, replacing any entry for the same company.
    async fn save(&self, mapping: CompanyFacilityMapping) -> VerdantResult<CompanyFacilityMapping>;

    /// Mappings ordered by company name.
    async fn list(&self, offset: usize, limit: usize) -> Vec<CompanyFacilityMapping>;
}

/// Mappings keyed by normalized company name, so "Acme Corp." and "ACME" share an entry.
pub struct InMemoryMappingStore {
    normalizer: NameNormalizer,
    mappings: RwLock<HashMap<String, CompanyFacilityMapping>>,
}

impl Default for InMemoryMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self {
            normalizer: NameNormalizer::new(),
            mappings: RwLock::new(HashMap::new()),
        }
    }

    pub async fn remove(&self, company: &str) -> Option<CompanyFacilityMapping> {
        let key = self.normalizer.normalize(company);
        self.mappings.write().await.remove(&key)
    }

    pub async fn len(&self) -> usize {
        self.mappings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mappings.read().await.is_empty()
    }
}

#[async_trait]
impl CompanyMappingStore for InMemoryMappingStore {
    async fn lookup(&self, company: &str) -> Option<CompanyFacilityMapping> {
        let key = self.normalizer.normalize(company);
        if key.is_empty() {
            return None;
        }
        self.mappings.read().await.get(&key).cloned()
    }

    async fn save(&self, mapping: CompanyFacilityMapping) -> VerdantResult<CompanyFacilityMapping> {
        let key = self.normalizer.normalize(&mapping.company);
        if key.is_empty() {
            return Err(VerdantError::invalid_request("company", "Company name is required"));
        }
        let mapping = CompanyFacilityMapping {
            company: mapping.company.trim().to_string(),
            facility_id: mapping.facility_id.trim().to_string(),
            ..mapping
        };
        if mapping.facility_id.is_empty() {
            return Err(VerdantError::invalid_request("facility_id", "Facility id is required"));
        }

        tracing::info!(company = %mapping.company, facility_id = %mapping.facility_id, "Company mapping stored");
        self.mappings.write().await.insert(key, mapping.clone());
        Ok(mapping)
    }

    async fn list(&self, offset: usize, limit: usize) -> Vec<CompanyFacilityMapping> {
        let mut all: Vec<CompanyFacilityMapping> = self.mappings.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.company.cmp(&b.company));
        all.into_iter().skip(offset).take(limit).collect()
    }
}
