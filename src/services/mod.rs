//! Read-through services and their wiring
//!
//! The container is built once: configuration, search backend, shared cache
//! tier and node gateway go in, the cache orchestrator is built from them and
//! every service receives handles to the shared components. Services never
//! depend on each other. When built inside a tokio runtime the container also
//! runs the periodic purge of expired local entries until it is dropped.

pub mod network;
pub mod tags;
pub mod transactions;

pub use network::NetworkService;
pub use tags::TagService;
pub use transactions::{TransactionFilter, TransactionService};

use crate::{
    cache::{CacheOrchestrator, NoopRemoteCache, RemoteCache},
    config::{validate, ConfigLoader, GatewayConfig},
    errors::GatewayResult,
    gateway::{NodeGateway, StaticNodeGateway},
    query::QueryLimits,
    search::{InMemorySearchBackend, SearchBackend},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Service container for dependency injection
pub struct ServiceContainer {
    config: GatewayConfig,
    cache: CacheOrchestrator,
    tags: TagService,
    transactions: TransactionService,
    network: NetworkService,
    maintenance: Option<JoinHandle<()>>,
}

impl ServiceContainer {
    pub fn new(
        config: GatewayConfig,
        backend: Arc<dyn SearchBackend>,
        remote: Arc<dyn RemoteCache>,
        gateway: Arc<dyn NodeGateway>,
    ) -> Self {
        let cache = CacheOrchestrator::from_config(&config.cache, remote);
        let limits = QueryLimits::from(&config.search);

        let tags = TagService::new(backend.clone(), cache.clone(), limits, config.services.clone());
        let transactions = TransactionService::new(
            backend,
            gateway.clone(),
            cache.clone(),
            limits,
            config.services.clone(),
        );
        let network = NetworkService::new(gateway, cache.clone(), config.services.clone());

        let maintenance = match tokio::runtime::Handle::try_current() {
            Ok(_) => Some(cache.start_maintenance_task(config.cache.maintenance_interval())),
            Err(_) => {
                debug!("no tokio runtime, local cache maintenance not started");
                None
            }
        };

        info!(
            local_capacity = config.cache.local_capacity,
            max_result_window = limits.max_result_window,
            maintenance_interval_secs = config.cache.maintenance_interval_secs,
            "service container ready"
        );

        Self {
            config,
            cache,
            tags,
            transactions,
            network,
            maintenance,
        }
    }

    /// Whether the background purge of the local tier is running
    pub fn maintenance_running(&self) -> bool {
        self.maintenance.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheOrchestrator {
        &self.cache
    }

    pub fn tags(&self) -> &TagService {
        &self.tags
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.transactions
    }

    pub fn network(&self) -> &NetworkService {
        &self.network
    }
}

impl Drop for ServiceContainer {
    fn drop(&mut self) {
        if let Some(handle) = self.maintenance.take() {
            handle.abort();
        }
    }
}

/// Service builder for creating configured service containers
#[derive(Default)]
pub struct ServiceBuilder {
    config_path: Option<String>,
    config_override: Option<GatewayConfig>,
    backend_override: Option<Arc<dyn SearchBackend>>,
    remote_override: Option<Arc<dyn RemoteCache>>,
    gateway_override: Option<Arc<dyn NodeGateway>>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use `config` as is; takes precedence over a config path
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config_override = Some(config);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.backend_override = Some(backend);
        self
    }

    pub fn with_remote_cache(mut self, remote: Arc<dyn RemoteCache>) -> Self {
        self.remote_override = Some(remote);
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn NodeGateway>) -> Self {
        self.gateway_override = Some(gateway);
        self
    }

    /// Build the container; missing components default to an empty
    /// in-memory index, no shared tier and a static node
    pub fn build(self) -> GatewayResult<ServiceContainer> {
        let config = match (self.config_override, self.config_path) {
            (Some(config), _) => {
                validate(&config)?;
                config
            }
            (None, Some(path)) => ConfigLoader::new().with_path(path).load()?,
            (None, None) => ConfigLoader::new().load()?,
        };

        let backend: Arc<dyn SearchBackend> = match self.backend_override {
            Some(backend) => backend,
            None => Arc::new(InMemorySearchBackend::new(QueryLimits::from(&config.search))),
        };
        let remote: Arc<dyn RemoteCache> = match self.remote_override {
            Some(remote) => remote,
            None => Arc::new(NoopRemoteCache),
        };
        let gateway: Arc<dyn NodeGateway> = match self.gateway_override {
            Some(gateway) => gateway,
            None => Arc::new(StaticNodeGateway::default()),
        };

        Ok(ServiceContainer::new(config, backend, remote, gateway))
    }
}
