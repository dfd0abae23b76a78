//! Process-local cache tier
//!
//! Size-bounded LRU with per-entry TTL, split into independently locked
//! shards picked by key hash. A lookup only ever locks the shard of its own
//! key, so unrelated keys never wait on each other. Evicting a slot never
//! invalidates a payload a reader already holds, since payloads are
//! reference-counted.

use super::entry::{CacheEntry, Payload};
use lru::LruCache;
use serde::Serialize;
use std::{
    collections::hash_map::RandomState,
    hash::BuildHasher,
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

/// Smallest per-shard capacity worth splitting for; below it LRU order
/// stays global
const MIN_SHARD_CAPACITY: usize = 64;

type Shard = Mutex<LruCache<String, CacheEntry>>;

pub struct LocalCache {
    capacity: usize,
    hasher: RandomState,
    shards: Box<[Shard]>,
}

/// Local tier statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LocalCacheStats {
    pub capacity: usize,
    pub shards: usize,
    pub size: usize,
    pub expired_entries: usize,
}

fn default_shard_amount() -> usize {
    let parallelism = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    (parallelism * 4).next_power_of_two()
}

impl LocalCache {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let shards = (capacity / MIN_SHARD_CAPACITY).clamp(1, default_shard_amount());
        Self::with_shards(capacity, shards)
    }

    /// Create a cache with an explicit shard count. Capacity is split evenly,
    /// and each shard holds at least one entry.
    pub fn with_shards(capacity: usize, shards: usize) -> Self {
        let capacity = capacity.max(1);
        let shard_count = shards.clamp(1, capacity);
        let base = capacity / shard_count;
        let remainder = capacity % shard_count;

        let shards = (0..shard_count)
            .map(|i| {
                let size = base + usize::from(i < remainder);
                Mutex::new(LruCache::new(NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN)))
            })
            .collect();

        Self {
            capacity,
            hasher: RandomState::new(),
            shards,
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    fn lock(shard: &Shard) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        shard.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_key(&self, key: &str) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        Self::lock(&self.shards[self.shard_index(key)])
    }

    /// Unexpired payload for `key`; expired entries are dropped on the way
    pub fn get(&self, key: &str) -> Option<Payload> {
        let mut entries = self.lock_key(key);
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`, replacing any previous entry. A zero TTL stores nothing.
    pub fn set(&self, key: &str, value: Payload, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.lock_key(key).put(key.to_string(), CacheEntry::new(value, ttl));
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| Self::lock(shard).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            Self::lock(shard).clear();
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        for shard in self.shards.iter() {
            let mut entries = Self::lock(shard);
            let expired: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                entries.pop(key);
            }
            removed += expired.len();
        }
        removed
    }

    pub fn stats(&self) -> LocalCacheStats {
        let now = Instant::now();
        let mut size = 0;
        let mut expired_entries = 0;

        for shard in self.shards.iter() {
            let entries = Self::lock(shard);
            size += entries.len();
            expired_entries += entries.iter().filter(|(_, e)| e.is_expired_at(now)).count();
        }

        LocalCacheStats {
            capacity: self.capacity,
            shards: self.shards.len(),
            size,
            expired_entries,
        }
    }
}
