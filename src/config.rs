//! Configuration management with validation and defaults
//!
//! TOML file, then `LEDGER_GATEWAY_*` environment overrides, then validation.

use crate::errors::{ConfigurationError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Complete gateway configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub services: ServicesConfig,
    pub logging: LoggingConfig,
}

/// Two-tier cache settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries held by the process-local tier
    pub local_capacity: usize,
    /// Upper bound for local TTLs; `None` keeps the caller's TTL
    pub local_ttl_cap_secs: Option<u64>,
    /// Interval of the background purge of expired local entries
    pub maintenance_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: 10_000,
            local_ttl_cap_secs: None,
            maintenance_interval_secs: 300, // Every 5 minutes
        }
    }
}

/// Search backend limits
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Hard maximum for `from + size` of a paginated query
    pub max_result_window: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_result_window: 10_000,
        }
    }
}

/// How read paths treat queries carrying a free-text search term
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchCachePolicy {
    /// Searched queries go straight to the backend
    Bypass,
    /// Searched queries are cached under a search-inclusive key
    ShortLived { ttl_secs: u64 },
}

/// TTLs and policies of the read-through services
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServicesConfig {
    pub tags_ttl_secs: u64,
    pub transaction_count_ttl_secs: u64,
    pub economics_ttl_secs: u64,
    pub search_cache: SearchCachePolicy,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            tags_ttl_secs: 3600, // 1 hour
            transaction_count_ttl_secs: 6, // About one round
            economics_ttl_secs: 600, // 10 minutes
            search_cache: SearchCachePolicy::Bypass,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "ledger_gateway=info".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn local_ttl_cap(&self) -> Option<Duration> {
        self.local_ttl_cap_secs.map(Duration::from_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

impl ServicesConfig {
    pub fn tags_ttl(&self) -> Duration {
        Duration::from_secs(self.tags_ttl_secs)
    }

    pub fn transaction_count_ttl(&self) -> Duration {
        Duration::from_secs(self.transaction_count_ttl_secs)
    }

    pub fn economics_ttl(&self) -> Duration {
        Duration::from_secs(self.economics_ttl_secs)
    }

    /// TTL for queries carrying a search term; `None` when they bypass the cache
    pub fn search_cache_ttl(&self) -> Option<Duration> {
        match self.search_cache {
            SearchCachePolicy::Bypass => None,
            SearchCachePolicy::ShortLived { ttl_secs } => Some(Duration::from_secs(ttl_secs)),
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> GatewayResult<GatewayConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => GatewayConfig::default(),
        };

        apply_overrides(&mut config, |name| env::var(name).ok())?;
        validate(&config)?;

        Ok(config)
    }

    fn load_from_file(path: &str) -> GatewayResult<GatewayConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        Ok(toml::from_str(&content).map_err(ConfigurationError::from)?)
    }

    /// Save configuration to file
    pub fn save(&self, config: &GatewayConfig, path: &str) -> GatewayResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: String, reason: &str) -> Result<T, ConfigurationError> {
    value.parse().map_err(|_| ConfigurationError::InvalidValue {
        field: name.to_string(),
        value,
        reason: reason.to_string(),
    })
}

/// Apply `LEDGER_GATEWAY_*` overrides read through `lookup`
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    const CAPACITY: &str = "LEDGER_GATEWAY_CACHE_CAPACITY";
    const TTL_CAP: &str = "LEDGER_GATEWAY_LOCAL_TTL_CAP_SECS";
    const MAX_WINDOW: &str = "LEDGER_GATEWAY_MAX_RESULT_WINDOW";
    const TAGS_TTL: &str = "LEDGER_GATEWAY_TAGS_TTL_SECS";
    const LOG_FILTER: &str = "LEDGER_GATEWAY_LOG";

    if let Some(value) = lookup(CAPACITY) {
        config.cache.local_capacity = parse_var(CAPACITY, value, "Invalid entry count")?;
    }
    if let Some(value) = lookup(TTL_CAP) {
        config.cache.local_ttl_cap_secs = Some(parse_var(TTL_CAP, value, "Invalid number of seconds")?);
    }
    if let Some(value) = lookup(MAX_WINDOW) {
        config.search.max_result_window = parse_var(MAX_WINDOW, value, "Invalid window size")?;
    }
    if let Some(value) = lookup(TAGS_TTL) {
        config.services.tags_ttl_secs = parse_var(TAGS_TTL, value, "Invalid number of seconds")?;
    }
    if let Some(filter) = lookup(LOG_FILTER) {
        config.logging.filter = filter;
    }

    Ok(())
}

/// Validate configuration values
pub fn validate(config: &GatewayConfig) -> Result<(), ConfigurationError> {
    if config.cache.local_capacity == 0 {
        return Err(ConfigurationError::InvalidValue {
            field: "cache.local_capacity".to_string(),
            value: "0".to_string(),
            reason: "Local cache capacity cannot be zero".to_string(),
        });
    }

    if config.cache.maintenance_interval_secs == 0 {
        return Err(ConfigurationError::InvalidValue {
            field: "cache.maintenance_interval_secs".to_string(),
            value: "0".to_string(),
            reason: "Maintenance interval cannot be zero".to_string(),
        });
    }

    if config.search.max_result_window == 0 {
        return Err(ConfigurationError::InvalidValue {
            field: "search.max_result_window".to_string(),
            value: "0".to_string(),
            reason: "Result window cannot be zero".to_string(),
        });
    }

    if let SearchCachePolicy::ShortLived { ttl_secs: 0 } = config.services.search_cache {
        return Err(ConfigurationError::ValidationFailed(
            "services.search_cache.ttl_secs must be > 0 for short_lived".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.cache.local_capacity, 10_000);
        assert_eq!(config.search.max_result_window, 10_000);
        assert_eq!(config.services.tags_ttl(), Duration::from_secs(3600));
        assert_eq!(config.services.search_cache, SearchCachePolicy::Bypass);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GatewayConfig::default();
        config.cache.local_capacity = 0;
        assert!(validate(&config).is_err());

        let mut config = GatewayConfig::default();
        config.services.search_cache = SearchCachePolicy::ShortLived { ttl_secs: 0 };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LEDGER_GATEWAY_CACHE_CAPACITY", "42"),
            ("LEDGER_GATEWAY_MAX_RESULT_WINDOW", "500"),
            ("LEDGER_GATEWAY_LOCAL_TTL_CAP_SECS", "30"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.cache.local_capacity, 42);
        assert_eq!(config.search.max_result_window, 500);
        assert_eq!(config.cache.local_ttl_cap(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_override() {
        let mut config = GatewayConfig::default();
        let err = apply_overrides(&mut config, |k| {
            (k == "LEDGER_GATEWAY_CACHE_CAPACITY").then(|| "lots".to_string())
        })
        .unwrap_err();

        match err {
            ConfigurationError::InvalidValue { field, value, .. } => {
                assert_eq!(field, "LEDGER_GATEWAY_CACHE_CAPACITY");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_save_and_load_config() -> GatewayResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut original_config = GatewayConfig::default();
        original_config.services.search_cache = SearchCachePolicy::ShortLived { ttl_secs: 30 };

        let loader = ConfigLoader::new();
        loader.save(&original_config, path)?;

        let loaded_config = ConfigLoader::new().with_path(path).load()?;
        assert_eq!(loaded_config.services, original_config.services);
        assert_eq!(loaded_config.search, original_config.search);

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [search]
            max_result_window = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.search.max_result_window, 2000);
        assert_eq!(config.cache, CacheConfig::default());
    }
}
