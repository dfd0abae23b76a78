//! Cache counters and their Prometheus text rendering

use super::local::LocalCacheStats;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Orchestrator counters
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub local_hits: AtomicU64,
    pub remote_hits: AtomicU64,
    pub computations: AtomicU64,
    pub coalesced_waiters: AtomicU64,
    pub compute_failures: AtomicU64,
    pub remote_errors: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, local: &LocalCacheStats, in_flight: usize) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            coalesced_waiters: self.coalesced_waiters.load(Ordering::Relaxed),
            compute_failures: self.compute_failures.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            local_entries: local.size,
            local_expired_entries: local.expired_entries,
            local_capacity: local.capacity,
            local_shards: local.shards,
            in_flight,
        }
    }
}

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub local_hits: u64,
    pub remote_hits: u64,
    pub computations: u64,
    pub coalesced_waiters: u64,
    pub compute_failures: u64,
    pub remote_errors: u64,
    pub local_entries: usize,
    pub local_expired_entries: usize,
    pub local_capacity: usize,
    pub local_shards: usize,
    pub in_flight: usize,
}

impl CacheStatsSnapshot {
    /// Share of lookups answered by either tier
    pub fn hit_ratio(&self) -> f64 {
        let hits = (self.local_hits + self.remote_hits) as f64;
        let total = hits + self.computations as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Generate Prometheus metrics format
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("cache_local_hits_total", "Lookups answered by the local tier", self.local_hits),
            ("cache_remote_hits_total", "Lookups answered by the shared tier", self.remote_hits),
            ("cache_computations_total", "Miss episodes that ran their computation", self.computations),
            ("cache_coalesced_waiters_total", "Callers that joined an in-flight computation", self.coalesced_waiters),
            ("cache_compute_failures_total", "Computations that failed", self.compute_failures),
            ("cache_remote_errors_total", "Shared tier calls that failed", self.remote_errors),
        ];

        for (name, help, value) in counters {
            let _ = write!(
                output,
                "# HELP ledger_gateway_{name} {help}\n\
                 # TYPE ledger_gateway_{name} counter\n\
                 ledger_gateway_{name} {value}\n\n"
            );
        }

        let gauges = [
            ("cache_local_entries", "Entries held by the local tier", self.local_entries),
            ("cache_local_expired_entries", "Expired local entries awaiting purge", self.local_expired_entries),
            ("cache_local_capacity", "Maximum entries of the local tier", self.local_capacity),
            ("cache_in_flight", "Miss episodes currently in flight", self.in_flight),
        ];

        for (name, help, value) in gauges {
            let _ = write!(
                output,
                "# HELP ledger_gateway_{name} {help}\n\
                 # TYPE ledger_gateway_{name} gauge\n\
                 ledger_gateway_{name} {value}\n\n"
            );
        }

        let _ = write!(
            output,
            "# HELP ledger_gateway_cache_hit_ratio Share of lookups answered by either tier\n\
             # TYPE ledger_gateway_cache_hit_ratio gauge\n\
             ledger_gateway_cache_hit_ratio {:.4}\n",
            self.hit_ratio()
        );

        output
    }
}
