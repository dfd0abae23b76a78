//! Upstream node access
//!
//! Calls that must reach a node rather than the search index: broadcasting a
//! signed transaction and reading live network figures.

use crate::errors::{GatewayError, GatewayResult};
use crate::models::{DelegationLegacy, Economics, TransactionCreate, TransactionSendResult, TransactionStatus};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex,
};

#[async_trait]
pub trait NodeGateway: Send + Sync {
    /// Broadcast a signed transaction
    async fn send_transaction(&self, transaction: TransactionCreate) -> GatewayResult<TransactionSendResult>;

    /// Current supply, staking and price figures
    async fn get_economics(&self) -> GatewayResult<Economics>;

    /// Totals of the legacy delegation contract
    async fn get_delegation_legacy(&self) -> GatewayResult<DelegationLegacy>;
}

/// In-process node that answers from fixed figures.
///
/// Accepted transactions are kept so callers can inspect what was broadcast.
pub struct StaticNodeGateway {
    economics: Economics,
    delegation: DelegationLegacy,
    shard_count: u32,
    online: AtomicBool,
    calls: AtomicU64,
    sent: Mutex<Vec<TransactionCreate>>,
}

impl StaticNodeGateway {
    pub fn new(economics: Economics, delegation: DelegationLegacy) -> Self {
        Self {
            economics,
            delegation,
            shard_count: 3,
            online: AtomicBool::new(true),
            calls: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of calls that reached this node
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent_transactions(&self) -> Vec<TransactionCreate> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn enter(&self) -> GatewayResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::Upstream("node unreachable".to_string()))
        }
    }

    /// Shard owning `address`, taken from its last byte
    fn shard_of(&self, address: &str) -> u32 {
        address
            .as_bytes()
            .last()
            .map(|byte| u32::from(*byte) % self.shard_count)
            .unwrap_or(0)
    }
}

impl Default for StaticNodeGateway {
    fn default() -> Self {
        Self::new(Economics::default(), DelegationLegacy::default())
    }
}

#[async_trait]
impl NodeGateway for StaticNodeGateway {
    async fn send_transaction(&self, transaction: TransactionCreate) -> GatewayResult<TransactionSendResult> {
        self.enter()?;

        if transaction.gas_limit == 0 {
            return Err(GatewayError::Upstream("insufficient gas limit".to_string()));
        }

        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        let result = TransactionSendResult {
            tx_hash: format!("{:064x}", sent.len() + 1),
            sender: transaction.sender.clone(),
            sender_shard: self.shard_of(&transaction.sender),
            receiver: transaction.receiver.clone(),
            receiver_shard: self.shard_of(&transaction.receiver),
            status: TransactionStatus::Pending,
        };
        sent.push(transaction);
        Ok(result)
    }

    async fn get_economics(&self) -> GatewayResult<Economics> {
        self.enter()?;
        Ok(self.economics.clone())
    }

    async fn get_delegation_legacy(&self) -> GatewayResult<DelegationLegacy> {
        self.enter()?;
        Ok(self.delegation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed() -> TransactionCreate {
        TransactionCreate {
            sender: "erd1alice".into(),
            receiver: "erd1bob".into(),
            signature: "ab".into(),
            gas_limit: 50_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_records_transaction() {
        let node = StaticNodeGateway::default();
        let result = node.send_transaction(signed()).await.unwrap();

        assert_eq!(result.status, TransactionStatus::Pending);
        assert_eq!(result.tx_hash.len(), 64);
        assert!(result.sender_shard < 3);
        assert_eq!(node.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_zero_gas() {
        let node = StaticNodeGateway::default();
        let mut tx = signed();
        tx.gas_limit = 0;

        assert!(matches!(node.send_transaction(tx).await, Err(GatewayError::Upstream(_))));
        assert!(node.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_offline_node() {
        let node = StaticNodeGateway::default();
        node.set_online(false);

        assert!(node.get_economics().await.is_err());
        assert_eq!(node.calls(), 1);
    }
}
