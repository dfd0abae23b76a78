//! Shared cache tier
//!
//! The remote tier is shared by every gateway process and is the source of
//! truth for cross-instance consistency. Concurrent writers on the same key
//! are last-write-wins.

use super::entry::{CacheEntry, Payload};
use crate::errors::{GatewayError, GatewayResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// Unexpired payload for `key`
    async fn get(&self, key: &str) -> GatewayResult<Option<Payload>>;

    /// Store `value` for `ttl`, replacing any previous value
    async fn set(&self, key: &str, value: Payload, ttl: Duration) -> GatewayResult<()>;
}

/// Remote tier for a single-instance deployment: always misses
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRemoteCache;

#[async_trait]
impl RemoteCache for NoopRemoteCache {
    async fn get(&self, _key: &str) -> GatewayResult<Option<Payload>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Payload, _ttl: Duration) -> GatewayResult<()> {
        Ok(())
    }
}

/// Keyed TTL store shared by every orchestrator holding a clone.
///
/// Clones share the same backing map, so several orchestrators built over
/// clones behave like separate processes sharing one store.
#[derive(Clone, Default)]
pub struct SharedMemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    offline: Arc<AtomicBool>,
}

impl SharedMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a cache error (or recover)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_online(&self) -> GatewayResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(GatewayError::Cache("shared cache unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteCache for SharedMemoryCache {
    async fn get(&self, key: &str) -> GatewayResult<Option<Payload>> {
        self.ensure_online()?;

        // Guard must be released before `remove` touches the same shard
        let hit = self.entries.get(key).map(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match hit {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Payload, ttl: Duration) -> GatewayResult<()> {
        self.ensure_online()?;

        if ttl.is_zero() {
            return Ok(());
        }
        self.entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }
}
