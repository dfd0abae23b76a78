//! Error types for the ledger gateway core
//!
//! One root error carried through the cache orchestrator, the query builder
//! and the services. The root error is `Clone` because a single outcome of a
//! miss episode is handed to every waiter of that episode.

use thiserror::Error;

/// Root error type for all gateway operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Search backend could not be reached (transient, retryable by the caller)
    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Query description is invalid (caller bug, never retried)
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// Single-item lookup found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Shared cache tier is unreachable
    #[error("Cache backend error: {0}")]
    Cache(String),

    /// Cached payload could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Upstream node gateway rejected or failed the call
    #[error("Upstream gateway error: {0}")]
    Upstream(String),

    /// Request precondition failed before any backend call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Computation of a miss episode ended without producing an outcome
    #[error("Computation aborted: {0}")]
    ComputeAborted(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

impl GatewayError {
    /// Whether a caller may retry the failed operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::BackendUnavailable(_) | GatewayError::Cache(_) | GatewayError::ComputeAborted(_)
        )
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        ConfigurationError::LoadFailed(e.to_string())
    }
}

impl From<toml::de::Error> for ConfigurationError {
    fn from(e: toml::de::Error) -> Self {
        ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e))
    }
}

// Convenience type alias for Results
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let config_error = ConfigurationError::ValidationFailed("test".to_string());
        let gateway_error = GatewayError::Configuration(config_error);

        assert!(gateway_error.to_string().contains("Configuration error"));
        assert!(gateway_error.to_string().contains("test"));
    }

    #[test]
    fn test_invalid_value_details() {
        let err = ConfigurationError::InvalidValue {
            field: "cache.local_capacity".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };

        assert!(err.to_string().contains("cache.local_capacity"));
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn test_error_conversion() {
        let config_error = ConfigurationError::ValidationFailed("test".to_string());
        let gateway_error: GatewayError = config_error.into();

        match gateway_error {
            GatewayError::Configuration(_) => {}
            _ => panic!("Expected configuration error"),
        }
    }

    #[test]
    fn test_error_source() {
        let gateway_error = GatewayError::Configuration(ConfigurationError::ValidationFailed("x".into()));
        assert!(gateway_error.source().is_some());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(GatewayError::BackendUnavailable("down".into()).is_retryable());
        assert!(!GatewayError::MalformedQuery("bad".into()).is_retryable());
        assert!(!GatewayError::NotFound("tag".into()).is_retryable());
    }

    #[test]
    fn test_clone_preserves_kind() {
        let err = GatewayError::BackendUnavailable("timeout".into());
        assert_eq!(err.clone(), err);
    }
}
