//! Two-tier read-through cache with per-key single flight
//!
//! `get_or_set` answers from the local tier when it can. Otherwise the first
//! caller for a key registers an in-flight record and starts a miss episode:
//! the shared tier is consulted, and only if it also misses is the
//! computation run. Every caller that arrives while the episode is in flight
//! waits for the same outcome instead of computing again.
//!
//! The episode runs in its own task, so dropping any caller (the one that
//! started it included) never cancels the computation for the others.
//! Failures are handed to every waiter and never written to either tier.

use super::{
    entry::Payload,
    local::LocalCache,
    remote::RemoteCache,
    stats::{CacheMetrics, CacheStatsSnapshot},
};
use crate::config::CacheConfig;
use crate::errors::{GatewayError, GatewayResult};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

type Outcome = Result<Payload, GatewayError>;

/// One miss episode in progress
struct InFlight {
    episode: u64,
    outcome: watch::Receiver<Option<Outcome>>,
}

struct Inner {
    local: LocalCache,
    remote: Arc<dyn RemoteCache>,
    in_flight: DashMap<String, InFlight>,
    local_ttl_cap: Option<Duration>,
    metrics: CacheMetrics,
    next_episode: AtomicU64,
}

impl Inner {
    fn local_ttl(&self, ttl: Duration) -> Duration {
        match self.local_ttl_cap {
            Some(cap) => ttl.min(cap),
            None => ttl,
        }
    }
}

/// Removes the in-flight record of its episode when dropped, including when
/// the computation panics.
struct EpisodeGuard {
    inner: Arc<Inner>,
    key: String,
    episode: u64,
}

impl Drop for EpisodeGuard {
    fn drop(&mut self) {
        let episode = self.episode;
        self.inner
            .in_flight
            .remove_if(&self.key, |_, in_flight| in_flight.episode == episode);
    }
}

/// Cache front shared by every service; cheap to clone
#[derive(Clone)]
pub struct CacheOrchestrator {
    inner: Arc<Inner>,
}

impl CacheOrchestrator {
    pub fn new(local: LocalCache, remote: Arc<dyn RemoteCache>, local_ttl_cap: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                in_flight: DashMap::new(),
                local_ttl_cap,
                metrics: CacheMetrics::default(),
                next_episode: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig, remote: Arc<dyn RemoteCache>) -> Self {
        Self::new(LocalCache::new(config.local_capacity), remote, config.local_ttl_cap())
    }

    /// Cached value for `key`, computing and storing it on a miss.
    ///
    /// At most one `compute` runs per key at a time within this process; its
    /// result (or error) is returned to every concurrent caller of the key.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> GatewayResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = GatewayResult<T>> + Send + 'static,
    {
        if let Some(value) = self.local_hit(key) {
            return Ok(value);
        }

        let (outcome, owned_episode) = match self.inner.in_flight.entry(key.to_string()) {
            Entry::Occupied(in_flight) => {
                CacheMetrics::bump(&self.inner.metrics.coalesced_waiters);
                debug!(key = %key, "joining in-flight computation");
                (in_flight.get().outcome.clone(), None)
            }
            Entry::Vacant(slot) => {
                // An episode may have settled between the local read and taking the slot
                if let Some(value) = self.local_hit(key) {
                    return Ok(value);
                }

                let episode = self.inner.next_episode.fetch_add(1, Ordering::Relaxed);
                let (sender, outcome) = watch::channel(None);
                slot.insert(InFlight {
                    episode,
                    outcome: outcome.clone(),
                });
                (outcome, Some((episode, sender)))
            }
        };

        // Shard lock is released; start the episode outside of it
        if let Some((episode, sender)) = owned_episode {
            let guard = EpisodeGuard {
                inner: self.inner.clone(),
                key: key.to_string(),
                episode,
            };
            tokio::spawn(run_episode(guard, ttl, sender, compute));
        }

        let payload = await_outcome(outcome).await?;
        decode(&payload)
    }

    fn local_hit<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.inner.local.get(key)?;
        match decode(&payload) {
            Ok(value) => {
                CacheMetrics::bump(&self.inner.metrics.local_hits);
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "undecodable local entry, treating as miss");
                None
            }
        }
    }

    /// Value held by the local tier
    pub fn get_local<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner.local.get(key).and_then(|payload| decode(&payload).ok())
    }

    pub fn set_local<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> GatewayResult<()> {
        let payload = encode(value)?;
        self.inner.local.set(key, payload, self.inner.local_ttl(ttl));
        Ok(())
    }

    /// Value held by the shared tier; tier failures are returned
    pub async fn get_remote<T: DeserializeOwned>(&self, key: &str) -> GatewayResult<Option<T>> {
        match self.inner.remote.get(key).await? {
            Some(payload) => decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    pub async fn set_remote<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> GatewayResult<()> {
        let payload = encode(value)?;
        self.inner.remote.set(key, payload, ttl).await
    }

    /// Local tier first, then the shared tier; never computes.
    ///
    /// A shared tier failure reads as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> GatewayResult<Option<T>> {
        if let Some(value) = self.local_hit(key) {
            return Ok(Some(value));
        }

        match self.inner.remote.get(key).await {
            Ok(Some(payload)) => {
                CacheMetrics::bump(&self.inner.metrics.remote_hits);
                decode(&payload).map(Some)
            }
            Ok(None) => Ok(None),
            Err(e) => {
                CacheMetrics::bump(&self.inner.metrics.remote_errors);
                warn!(key = %key, error = %e, "shared cache read failed");
                Ok(None)
            }
        }
    }

    /// Write both tiers, replacing whatever is cached for `key`
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> GatewayResult<()> {
        let payload = encode(value)?;
        self.inner.local.set(key, payload.clone(), self.inner.local_ttl(ttl));
        self.inner.remote.set(key, payload, ttl).await
    }

    /// Drop expired local entries
    pub fn purge_expired(&self) -> usize {
        self.inner.local.purge_expired()
    }

    /// Number of miss episodes currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner
            .metrics
            .snapshot(&self.inner.local.stats(), self.inner.in_flight.len())
    }

    /// Start background purge of expired local entries
    pub fn start_maintenance_task(&self, interval: Duration) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = orchestrator.purge_expired();

                if removed > 0 {
                    info!(removed, "cache maintenance: purged expired local entries");
                }
            }
        })
    }
}

/// Resolve one miss episode and publish its outcome
async fn run_episode<T, F, Fut>(
    guard: EpisodeGuard,
    ttl: Duration,
    sender: watch::Sender<Option<Outcome>>,
    compute: F,
) where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = GatewayResult<T>> + Send + 'static,
{
    let outcome = resolve(&guard.inner, &guard.key, ttl, compute).await;
    sender.send_replace(Some(outcome));
    // `guard` drops here, after every waiter can observe the outcome
}

async fn resolve<T, F, Fut>(inner: &Inner, key: &str, ttl: Duration, compute: F) -> Outcome
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    match inner.remote.get(key).await {
        Ok(Some(payload)) => {
            CacheMetrics::bump(&inner.metrics.remote_hits);
            inner.local.set(key, payload.clone(), inner.local_ttl(ttl));
            debug!(key = %key, "promoted shared entry to local tier");
            return Ok(payload);
        }
        Ok(None) => {}
        Err(e) => {
            CacheMetrics::bump(&inner.metrics.remote_errors);
            warn!(key = %key, error = %e, "shared cache read failed, treating as miss");
        }
    }

    CacheMetrics::bump(&inner.metrics.computations);
    let value = match compute().await {
        Ok(value) => value,
        Err(e) => {
            CacheMetrics::bump(&inner.metrics.compute_failures);
            debug!(key = %key, error = %e, "computation failed, nothing cached");
            return Err(e);
        }
    };

    let payload = encode(&value)?;
    if !ttl.is_zero() {
        if let Err(e) = inner.remote.set(key, payload.clone(), ttl).await {
            CacheMetrics::bump(&inner.metrics.remote_errors);
            warn!(key = %key, error = %e, "shared cache write failed");
        }
        inner.local.set(key, payload.clone(), inner.local_ttl(ttl));
    }

    Ok(payload)
}

async fn await_outcome(mut outcome: watch::Receiver<Option<Outcome>>) -> Outcome {
    let settled = match outcome.wait_for(|outcome| outcome.is_some()).await {
        Ok(settled) => (*settled).clone(),
        Err(_) => None,
    };

    settled.unwrap_or_else(|| {
        Err(GatewayError::ComputeAborted(
            "computation ended without producing a result".to_string(),
        ))
    })
}

fn encode<T: Serialize + ?Sized>(value: &T) -> GatewayResult<Payload> {
    Ok(Payload::from(serde_json::to_vec(value)?))
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> GatewayResult<T> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::remote::{NoopRemoteCache, SharedMemoryCache};
    use std::sync::atomic::AtomicUsize;

    const HOUR: Duration = Duration::from_secs(3600);

    fn orchestrator() -> CacheOrchestrator {
        CacheOrchestrator::new(LocalCache::new(100), Arc::new(NoopRemoteCache), None)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value: u64 = cache
                .get_or_set("nftTagsCount", HOUR, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.local_hits, 2);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_zero_ttl_runs_every_time() {
        let cache = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _: u64 = cache
                .get_or_set("volatile", Duration::ZERO, move || async move {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) as u64)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.get_local::<u64>("volatile").is_none());
    }

    #[tokio::test]
    async fn test_local_ttl_cap() {
        let cache = CacheOrchestrator::new(
            LocalCache::new(10),
            Arc::new(NoopRemoteCache),
            Some(Duration::from_millis(30)),
        );
        cache.set_local("k", &1u8, HOUR).unwrap();
        assert_eq!(cache.get_local::<u8>("k"), Some(1));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get_local::<u8>("k").is_none());
    }

    #[tokio::test]
    async fn test_panicking_computation_releases_waiters() {
        let cache = orchestrator();

        async fn explode() -> GatewayResult<u64> {
            panic!("index exploded")
        }

        let err = cache.get_or_set("boom", HOUR, explode).await.unwrap_err();
        assert!(matches!(err, GatewayError::ComputeAborted(_)));
        assert_eq!(cache.in_flight_count(), 0);

        let value: u64 = cache.get_or_set("boom", HOUR, || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_explicit_tier_helpers() {
        let remote = SharedMemoryCache::new();
        let cache = CacheOrchestrator::new(LocalCache::new(10), Arc::new(remote.clone()), None);

        cache.set_remote("isInitialized", &true, HOUR).await.unwrap();
        assert_eq!(cache.get_remote::<bool>("isInitialized").await.unwrap(), Some(true));
        assert!(cache.get_local::<bool>("isInitialized").is_none());
        assert_eq!(cache.get::<bool>("isInitialized").await.unwrap(), Some(true));

        cache.set("both", &"x".to_string(), HOUR).await.unwrap();
        assert_eq!(cache.get_local::<String>("both").as_deref(), Some("x"));
        assert_eq!(remote.len(), 2);

        remote.set_offline(true);
        assert!(cache.get_remote::<bool>("isInitialized").await.is_err());
        assert_eq!(cache.get::<bool>("isInitialized").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_maintenance_task_purges() {
        let cache = orchestrator();
        cache.set_local("short", &1u8, Duration::from_millis(10)).unwrap();

        let handle = cache.start_maintenance_task(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(70)).await;
        handle.abort();

        assert_eq!(cache.stats().local_entries, 0);
    }
}
