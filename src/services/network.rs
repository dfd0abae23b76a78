//! Network figures read from the node, cached for `economics_ttl_secs`

use crate::cache::CacheOrchestrator;
use crate::config::ServicesConfig;
use crate::errors::GatewayResult;
use crate::gateway::NodeGateway;
use crate::models::{DelegationLegacy, Economics};
use std::sync::Arc;

pub struct NetworkService {
    gateway: Arc<dyn NodeGateway>,
    cache: CacheOrchestrator,
    config: ServicesConfig,
}

impl NetworkService {
    pub fn new(gateway: Arc<dyn NodeGateway>, cache: CacheOrchestrator, config: ServicesConfig) -> Self {
        Self { gateway, cache, config }
    }

    pub async fn get_economics(&self) -> GatewayResult<Economics> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_set("economics", self.config.economics_ttl(), move || async move {
                gateway.get_economics().await
            })
            .await
    }

    pub async fn get_delegation_legacy(&self) -> GatewayResult<DelegationLegacy> {
        let gateway = self.gateway.clone();
        self.cache
            .get_or_set("delegationLegacy", self.config.economics_ttl(), move || async move {
                gateway.get_delegation_legacy().await
            })
            .await
    }
}
