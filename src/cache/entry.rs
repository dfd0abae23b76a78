use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Encoded cache payload shared between a tier and its readers
pub type Payload = Arc<[u8]>;

/// Immutable cached value with TTL. A write replaces the entry.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: Payload,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: Payload, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Expired once `now - stored_at >= ttl`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Time left before expiry
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.stored_at.elapsed())
    }
}
