//! Cache pre-population
//!
//! Warm jobs load a value and write it through both tiers, replacing whatever
//! is cached. Once a run completes without failures the shared tier records
//! `isInitialized = true` so other processes can tell the cache is warm.

use super::orchestrator::CacheOrchestrator;
use crate::errors::GatewayResult;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Shared-tier key marking a completed warm run
pub const INITIALIZED_KEY: &str = "isInitialized";

type Loader = Box<dyn Fn() -> BoxFuture<'static, GatewayResult<Value>> + Send + Sync>;

struct WarmJob {
    key: String,
    ttl: Duration,
    load: Loader,
}

/// Outcome of one warm run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WarmReport {
    pub warmed: Vec<String>,
    pub failed: Vec<String>,
    pub initialized: bool,
}

pub struct CacheWarmer {
    cache: CacheOrchestrator,
    jobs: Vec<WarmJob>,
    initialized_ttl: Duration,
}

impl CacheWarmer {
    pub fn new(cache: CacheOrchestrator) -> Self {
        Self {
            cache,
            jobs: Vec::new(),
            initialized_ttl: Duration::from_secs(3600),
        }
    }

    /// How long the `isInitialized` flag lives in the shared tier
    pub fn with_initialized_ttl(mut self, ttl: Duration) -> Self {
        self.initialized_ttl = ttl;
        self
    }

    /// Register a job that stores the loader's value under `key`
    pub fn register<F>(mut self, key: impl Into<String>, ttl: Duration, load: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, GatewayResult<Value>> + Send + Sync + 'static,
    {
        self.jobs.push(WarmJob {
            key: key.into(),
            ttl,
            load: Box::new(load),
        });
        self
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Run every registered job once
    pub async fn run(&self) -> WarmReport {
        let started = Instant::now();
        let mut report = WarmReport::default();

        for job in &self.jobs {
            let stored = match (job.load)().await {
                Ok(value) => self.cache.set(&job.key, &value, job.ttl).await,
                Err(e) => Err(e),
            };

            match stored {
                Ok(()) => report.warmed.push(job.key.clone()),
                Err(e) => {
                    warn!(key = %job.key, error = %e, "warm job failed");
                    report.failed.push(job.key.clone());
                }
            }
        }

        if report.failed.is_empty() {
            match self
                .cache
                .set_remote(INITIALIZED_KEY, &true, self.initialized_ttl)
                .await
            {
                Ok(()) => report.initialized = true,
                Err(e) => warn!(error = %e, "could not record warm state"),
            }
        }

        info!(
            warmed = report.warmed.len(),
            failed = report.failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cache warm run finished"
        );
        report
    }
}
