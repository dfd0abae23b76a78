//! Two-tier caching: process-local LRU in front of a shared store

pub mod entry;
pub mod local;
pub mod orchestrator;
pub mod remote;
pub mod stats;
pub mod warmer;

pub use entry::{CacheEntry, Payload};
pub use local::{LocalCache, LocalCacheStats};
pub use orchestrator::CacheOrchestrator;
pub use remote::{NoopRemoteCache, RemoteCache, SharedMemoryCache};
pub use stats::{CacheMetrics, CacheStatsSnapshot};
pub use warmer::{CacheWarmer, WarmReport, INITIALIZED_KEY};
