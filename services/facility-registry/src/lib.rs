//! Verdant Facility Registry
//!
//! Resolves a company name to candidate facility records from the public EPA
//! registries. Lookups fall through primary endpoints, backup endpoints,
//! alternate-schema services, cache and finally a synthesized sample, so a
//! caller always gets a tagged, non-empty batch back.

pub mod adapters;
pub mod cache;
pub mod client;
pub mod measurements;
pub mod retry;
pub mod sample;

pub use adapters::{
    filter_by_company, EchoAdapter, EndpointTier, EnvirofactsEndpoint, FacilityQuery, FrsAdapter, HttpContext,
    SourceAdapter, TriAdapter,
};
pub use cache::{build_cache, cache_key, ttl_duration, CachedBatch, FacilityCache, MemoryCache, RedisCache};
pub use client::{FacilitySource, SourceClient};
pub use measurements::MeasurementsClient;
pub use retry::{send_with_retry, RetryPolicy};
