//! Ledger Gateway - read-through query layer for a ledger explorer API
//!
//! Fluent, backend-neutral search queries executed against an index, fronted
//! by a two-tier cache (process-local LRU over a shared store) that collapses
//! concurrent misses on the same key into a single computation.

pub mod cache;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod query;
pub mod search;
pub mod services;

pub use cache::{CacheOrchestrator, CacheWarmer, LocalCache, NoopRemoteCache, RemoteCache, SharedMemoryCache};
pub use config::{ConfigLoader, GatewayConfig};
pub use errors::{ConfigurationError, GatewayError, GatewayResult};
pub use gateway::{NodeGateway, StaticNodeGateway};
pub use query::{
    Condition, QueryBuilder, QueryConditionOptions, QueryDescription, QueryLimits, QueryPagination, SortOrder,
    SortSpec,
};
pub use search::{InMemorySearchBackend, SearchBackend, SearchRecord};
pub use services::{ServiceBuilder, ServiceContainer};
