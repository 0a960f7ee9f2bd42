use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub thresholds: ThresholdsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
    pub timeout_seconds: u64,
}

/// Upstream registry endpoints and network budgets for the fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub primary_endpoints: Vec<String>,
    pub backup_endpoints: Vec<String>,
    pub echo_urls: Vec<String>,
    pub frs_url: String,
    pub tri_url: String,
    pub measurements_url: String,
    pub api_key: Option<String>,
    pub request_timeout_seconds: u64,
    pub alternate_timeout_seconds: u64,
    pub health_timeout_seconds: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub fetch_limit: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub fresh_ttl_seconds: u64,
    pub stale_ttl_seconds: u64,
    /// Upper bound on live entries held by the in-memory backend.
    pub memory_max_entries: usize,
}

/// Longest TTL accepted for either cache window (one year).
pub const MAX_CACHE_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviationThresholds {
    pub critical: f64,
    pub significant: f64,
    pub moderate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollutantThresholds {
    pub co2: f64,
    pub nox: f64,
    pub so2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdsConfig {
    pub fuzzy_min_similarity: f64,
    pub deviation: DeviationThresholds,
    pub pollutants: PollutantThresholds,
    pub min_match_count: usize,
    pub low_match_density: usize,
    pub require_state_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Start from the compiled-in defaults so partial files are enough
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with VERDANT prefix
            .add_source(
                Environment::with_prefix("VERDANT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sources.primary_endpoints")
                    .with_list_parse_key("sources.backup_endpoints")
                    .with_list_parse_key("sources.echo_urls")
                    .try_parsing(true),
            );

        config.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), crate::VerdantError> {
        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.fuzzy_min_similarity) {
            return Err(crate::VerdantError::configuration(
                "thresholds.fuzzy_min_similarity must be within 0.0..=1.0",
            ));
        }
        let d = &t.deviation;
        if !(d.critical > d.significant && d.significant > d.moderate && d.moderate >= 0.0) {
            return Err(crate::VerdantError::configuration(
                "thresholds.deviation must satisfy critical > significant > moderate >= 0",
            ));
        }
        if self.cache.stale_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(crate::VerdantError::configuration(format!(
                "cache.stale_ttl_seconds cannot exceed {}",
                MAX_CACHE_TTL_SECONDS
            )));
        }
        if self.cache.memory_max_entries == 0 {
            return Err(crate::VerdantError::configuration("cache.memory_max_entries must be positive"));
        }
        if self.cache.fresh_ttl_seconds > self.cache.stale_ttl_seconds {
            return Err(crate::VerdantError::configuration(
                "cache.fresh_ttl_seconds cannot exceed cache.stale_ttl_seconds",
            ));
        }
        if self.sources.fetch_limit == 0 {
            return Err(crate::VerdantError::configuration("sources.fetch_limit must be positive"));
        }
        Ok(())
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_similarity: 0.6,
            deviation: DeviationThresholds {
                critical: 50.0,
                significant: 25.0,
                moderate: 15.0,
            },
            pollutants: PollutantThresholds {
                co2: 15.0,
                nox: 20.0,
                so2: 25.0,
            },
            min_match_count: 1,
            low_match_density: 3,
            require_state_match: false,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary_endpoints: vec![
                "https://data.epa.gov/efservice".to_string(),
                "https://enviro.epa.gov/efservice".to_string(),
                "https://iaspub.epa.gov/efservice".to_string(),
            ],
            backup_endpoints: vec![
                "https://echo.epa.gov/efservice".to_string(),
                "https://www3.epa.gov/efservice".to_string(),
            ],
            echo_urls: vec![
                "https://echo.epa.gov/efservice/echo_rest_services.get_facilities".to_string(),
                "https://echo.epa.gov/efservice/get_facilities".to_string(),
            ],
            frs_url: "https://data.epa.gov/efservice/FRS_FACILITY_SITE".to_string(),
            tri_url: "https://data.epa.gov/efservice/tri_facility".to_string(),
            measurements_url: "https://api.epa.gov/easey".to_string(),
            api_key: None,
            request_timeout_seconds: 15,
            alternate_timeout_seconds: 20,
            health_timeout_seconds: 10,
            max_retries: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 8000,
            fetch_limit: 100,
            user_agent: "Verdant-Emissions-Validator/0.1".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "verdant".to_string(),
            fresh_ttl_seconds: 15 * 60,
            stale_ttl_seconds: 24 * 60 * 60,
            memory_max_entries: 10_000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_request_size: 1024 * 1024, // 1MB
                timeout_seconds: 60,
            },
            sources: SourcesConfig::default(),
            cache: CacheConfig::default(),
            thresholds: ThresholdsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
                file_path: None,
            },
        }
    }
}
