//! Transactions
//!
//! Listings and single lookups go straight to the index. Counts are cached
//! briefly under a key derived from the whole filter. Broadcasting is
//! forwarded to the node and never cached.

use crate::cache::CacheOrchestrator;
use crate::config::ServicesConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::gateway::NodeGateway;
use crate::models::{from_record, Transaction, TransactionCreate, TransactionSendResult, TransactionStatus};
use crate::query::{Condition, QueryBuilder, QueryConditionOptions, QueryLimits, QueryPagination, SortOrder, SortSpec};
use crate::search::SearchBackend;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const COLLECTION: &str = "transactions";
const KEY_FIELD: &str = "txHash";

/// Listing and count filters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionFilter {
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub token: Option<String>,
    pub sender_shard: Option<u32>,
    pub receiver_shard: Option<u32>,
    pub mini_block_hash: Option<String>,
    pub hashes: Vec<String>,
    pub status: Option<TransactionStatus>,
    /// Free text matched inside the data field
    pub search: Option<String>,
    pub function: Option<String>,
    /// Inclusive upper timestamp bound
    pub before: Option<u64>,
    /// Inclusive lower timestamp bound
    pub after: Option<u64>,
    pub condition: Option<QueryConditionOptions>,
    pub order: Option<SortOrder>,
}

impl TransactionFilter {
    /// Cache key of the count for this filter.
    ///
    /// Sort order does not change a count, so it is left out of the key.
    pub fn cache_key(&self) -> GatewayResult<String> {
        let mut keyed = self.clone();
        keyed.order = None;
        Ok(format!("txCount:{}", serde_json::to_string(&keyed)?))
    }

    fn has_search(&self) -> bool {
        self.search.as_deref().is_some_and(|term| !term.is_empty())
    }

    /// Query over the filtered transactions, newest first unless `order` says otherwise
    pub fn to_query(&self, limits: QueryLimits) -> QueryBuilder {
        let mut filters = Vec::new();

        if let Some(sender) = &self.sender {
            filters.push(Condition::term("sender", sender.as_str()));
        }
        if let Some(receiver) = &self.receiver {
            filters.push(Condition::term("receiver", receiver.as_str()));
        }
        if let Some(token) = &self.token {
            filters.push(Condition::term("tokens", token.as_str()));
        }
        if let Some(shard) = self.sender_shard {
            filters.push(Condition::term("senderShard", shard));
        }
        if let Some(shard) = self.receiver_shard {
            filters.push(Condition::term("receiverShard", shard));
        }
        if let Some(hash) = &self.mini_block_hash {
            filters.push(Condition::term("miniBlockHash", hash.as_str()));
        }
        if let Some(status) = self.status {
            filters.push(Condition::term("status", status.as_str()));
        }
        if let Some(function) = &self.function {
            filters.push(Condition::term("function", function.as_str()));
        }

        let order = self.order.unwrap_or(SortOrder::Descending);
        let search = self.search.as_deref().filter(|term| !term.is_empty());

        QueryBuilder::with_limits(COLLECTION, limits)
            .with_condition_options(self.condition.unwrap_or_default(), filters)
            .with_terms(KEY_FIELD, self.hashes.clone())
            .with_search_wildcard_condition(search, &["data"])
            .with_range("timestamp", self.after.map(|t| json!(t)), self.before.map(|t| json!(t)))
            .with_sort(vec![SortSpec {
                field: "timestamp".to_string(),
                order,
            }])
    }
}

pub struct TransactionService {
    backend: Arc<dyn SearchBackend>,
    gateway: Arc<dyn NodeGateway>,
    cache: CacheOrchestrator,
    limits: QueryLimits,
    config: ServicesConfig,
}

impl TransactionService {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        gateway: Arc<dyn NodeGateway>,
        cache: CacheOrchestrator,
        limits: QueryLimits,
        config: ServicesConfig,
    ) -> Self {
        Self {
            backend,
            gateway,
            cache,
            limits,
            config,
        }
    }

    pub async fn get_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: QueryPagination,
    ) -> GatewayResult<Vec<Transaction>> {
        let records = filter
            .to_query(self.limits)
            .with_pagination(pagination)?
            .list(self.backend.as_ref())
            .await?;

        records.into_iter().map(from_record).collect()
    }

    pub async fn get_transaction_count(&self, filter: &TransactionFilter) -> GatewayResult<u64> {
        let query = filter.to_query(self.limits).build();

        let ttl = if filter.has_search() {
            match self.config.search_cache_ttl() {
                Some(ttl) => ttl,
                None => return self.backend.count(&query).await,
            }
        } else {
            self.config.transaction_count_ttl()
        };

        let key = filter.cache_key()?;
        let backend = self.backend.clone();
        self.cache
            .get_or_set(&key, ttl, move || async move { backend.count(&query).await })
            .await
    }

    /// Transaction by hash; `None` when it is not indexed
    pub async fn get_transaction(&self, tx_hash: &str) -> GatewayResult<Option<Transaction>> {
        let found = QueryBuilder::with_limits(COLLECTION, self.limits)
            .with_term(KEY_FIELD, tx_hash)
            .get_one(self.backend.as_ref())
            .await?;

        match found {
            Some(record) => from_record(record).map(Some),
            None => {
                debug!(tx_hash = %tx_hash, "transaction not indexed");
                Ok(None)
            }
        }
    }

    /// Validate and broadcast a signed transaction
    pub async fn create_transaction(&self, transaction: TransactionCreate) -> GatewayResult<TransactionSendResult> {
        if transaction.sender.is_empty() {
            return Err(GatewayError::InvalidRequest("Sender must be provided".to_string()));
        }
        if transaction.receiver.is_empty() {
            return Err(GatewayError::InvalidRequest("Receiver must be provided".to_string()));
        }
        if transaction.signature.is_empty() {
            return Err(GatewayError::InvalidRequest("Signature must be provided".to_string()));
        }

        let result = self.gateway.send_transaction(transaction).await?;
        info!(tx_hash = %result.tx_hash, sender_shard = result.sender_shard, "transaction broadcast");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LocalCache, NoopRemoteCache};
    use crate::gateway::StaticNodeGateway;
    use crate::search::InMemorySearchBackend;

    fn backend() -> Arc<InMemorySearchBackend> {
        let data = json!({
            "transactions": [
                { "txHash": "a1", "sender": "erd1alice", "receiver": "erd1bob", "status": "success", "timestamp": 100, "data": "transfer" },
                { "txHash": "a2", "sender": "erd1alice", "receiver": "erd1carol", "status": "fail", "timestamp": 200, "data": "claimRewards" },
                { "txHash": "a3", "sender": "erd1bob", "receiver": "erd1alice", "status": "success", "timestamp": 300 },
            ]
        });
        Arc::new(InMemorySearchBackend::from_json(data, QueryLimits::default()).unwrap())
    }

    fn service(backend: Arc<InMemorySearchBackend>, gateway: Arc<StaticNodeGateway>) -> TransactionService {
        let cache = CacheOrchestrator::new(LocalCache::new(64), Arc::new(NoopRemoteCache), None);
        TransactionService::new(backend, gateway, cache, QueryLimits::default(), ServicesConfig::default())
    }

    fn hashes(transactions: &[Transaction]) -> Vec<&str> {
        transactions.iter().map(|tx| tx.tx_hash.as_str()).collect()
    }

    #[tokio::test]
    async fn test_newest_first_by_default() {
        let service = service(backend(), Arc::new(StaticNodeGateway::default()));

        let all = service
            .get_transactions(&TransactionFilter::default(), QueryPagination::default())
            .await
            .unwrap();
        assert_eq!(hashes(&all), vec!["a3", "a2", "a1"]);

        let filter = TransactionFilter {
            order: Some(SortOrder::Ascending),
            ..Default::default()
        };
        let ascending = service.get_transactions(&filter, QueryPagination::default()).await.unwrap();
        assert_eq!(hashes(&ascending), vec!["a1", "a2", "a3"]);
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let service = service(backend(), Arc::new(StaticNodeGateway::default()));

        let must = TransactionFilter {
            sender: Some("erd1alice".into()),
            status: Some(TransactionStatus::Success),
            ..Default::default()
        };
        let found = service.get_transactions(&must, QueryPagination::default()).await.unwrap();
        assert_eq!(hashes(&found), vec!["a1"]);

        let should = TransactionFilter {
            condition: Some(QueryConditionOptions::Should),
            ..must
        };
        let found = service.get_transactions(&should, QueryPagination::default()).await.unwrap();
        assert_eq!(hashes(&found), vec!["a3", "a2", "a1"]);

        let window = TransactionFilter {
            after: Some(150),
            before: Some(300),
            hashes: vec!["a1".into(), "a2".into(), "a3".into()],
            ..Default::default()
        };
        let found = service.get_transactions(&window, QueryPagination::default()).await.unwrap();
        assert_eq!(hashes(&found), vec!["a3", "a2"]);

        let search = TransactionFilter {
            search: Some("Rewards".into()),
            ..Default::default()
        };
        assert_eq!(service.get_transaction_count(&search).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_cached_per_filter() {
        let backend = backend();
        let service = service(backend.clone(), Arc::new(StaticNodeGateway::default()));

        let alice = TransactionFilter {
            sender: Some("erd1alice".into()),
            ..Default::default()
        };
        assert_eq!(service.get_transaction_count(&alice).await.unwrap(), 2);
        assert_eq!(service.get_transaction_count(&alice).await.unwrap(), 2);
        assert_eq!(backend.queries_served(), 1);

        let reversed = TransactionFilter {
            order: Some(SortOrder::Ascending),
            ..alice.clone()
        };
        assert_eq!(reversed.cache_key().unwrap(), alice.cache_key().unwrap());
        assert_eq!(service.get_transaction_count(&reversed).await.unwrap(), 2);
        assert_eq!(backend.queries_served(), 1);

        let bob = TransactionFilter {
            sender: Some("erd1bob".into()),
            ..Default::default()
        };
        assert_ne!(bob.cache_key().unwrap(), alice.cache_key().unwrap());
        assert_eq!(service.get_transaction_count(&bob).await.unwrap(), 1);
        assert_eq!(backend.queries_served(), 2);
    }

    #[tokio::test]
    async fn test_get_transaction() {
        let service = service(backend(), Arc::new(StaticNodeGateway::default()));

        let tx = service.get_transaction("a2").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Fail);
        assert!(service.get_transaction("ff").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_transaction_validation() {
        let gateway = Arc::new(StaticNodeGateway::default());
        let service = service(backend(), gateway.clone());

        let mut tx = TransactionCreate {
            sender: "erd1alice".into(),
            receiver: "erd1bob".into(),
            gas_limit: 50_000,
            ..Default::default()
        };
        let err = service.create_transaction(tx.clone()).await.unwrap_err();
        assert_eq!(err, GatewayError::InvalidRequest("Signature must be provided".into()));
        assert_eq!(gateway.calls(), 0);

        tx.signature = "ab".into();
        let result = service.create_transaction(tx).await.unwrap();
        assert_eq!(result.status, TransactionStatus::Pending);
        assert_eq!(gateway.sent_transactions().len(), 1);
    }
}
