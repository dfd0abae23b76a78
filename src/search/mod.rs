//! Search backend adapter interface
//!
//! Executes a built [`QueryDescription`] against the indexing engine. Errors
//! distinguish an unreachable backend (`BackendUnavailable`) from a query the
//! backend rejects (`MalformedQuery`); "no match" is an empty result, not an
//! error.

use crate::errors::GatewayResult;
use crate::query::QueryDescription;
use async_trait::async_trait;

pub mod elastic;
pub mod memory;

pub use memory::InMemorySearchBackend;

/// Opaque key-value record as stored in the index
pub type SearchRecord = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Records matching the query, sorted and windowed
    async fn list(&self, query: &QueryDescription) -> GatewayResult<Vec<SearchRecord>>;

    /// Number of records matching the query; pagination and sort are ignored
    async fn count(&self, query: &QueryDescription) -> GatewayResult<u64>;

    /// Record of `collection` whose `key_field` equals `key`
    async fn get_item(&self, collection: &str, key_field: &str, key: &str) -> GatewayResult<Option<SearchRecord>>;
}
