//! NFT tags
//!
//! Unfiltered listings and the total count are cached for an hour. Searched
//! queries follow the configured search policy.

use crate::cache::CacheOrchestrator;
use crate::config::ServicesConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::models::{from_record, Tag};
use crate::query::{QueryBuilder, QueryDescription, QueryLimits, QueryPagination, SortSpec};
use crate::search::SearchBackend;
use std::sync::Arc;
use tracing::debug;

const COLLECTION: &str = "tags";
const KEY_FIELD: &str = "tag";

pub struct TagService {
    backend: Arc<dyn SearchBackend>,
    cache: CacheOrchestrator,
    limits: QueryLimits,
    config: ServicesConfig,
}

impl TagService {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        cache: CacheOrchestrator,
        limits: QueryLimits,
        config: ServicesConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            limits,
            config,
        }
    }

    /// Tags ordered by usage, most used first
    pub async fn get_nft_tags(&self, pagination: QueryPagination, search: Option<&str>) -> GatewayResult<Vec<Tag>> {
        let search = search.filter(|term| !term.is_empty());
        let query = self.tags_query(search).with_pagination(pagination)?.build();

        let (key, ttl) = match search {
            None => (
                format!("nftTags:{}:{}", pagination.from, pagination.size),
                self.config.tags_ttl(),
            ),
            Some(term) => match self.config.search_cache_ttl() {
                Some(ttl) => (format!("nftTags:{}:{}:{}", pagination.from, pagination.size, term), ttl),
                None => {
                    debug!(search = %term, "tag search bypasses cache");
                    return fetch_tags(self.backend.as_ref(), &query).await;
                }
            },
        };

        let backend = self.backend.clone();
        self.cache
            .get_or_set(&key, ttl, move || async move { fetch_tags(backend.as_ref(), &query).await })
            .await
    }

    /// Number of tags, optionally restricted to those containing `search`
    pub async fn get_nft_tag_count(&self, search: Option<&str>) -> GatewayResult<u64> {
        let search = search.filter(|term| !term.is_empty());
        let query = self.tags_query(search).build();

        let (key, ttl) = match search {
            None => ("nftTagsCount".to_string(), self.config.tags_ttl()),
            Some(term) => match self.config.search_cache_ttl() {
                Some(ttl) => (format!("nftTagsCount:{term}"), ttl),
                None => return self.backend.count(&query).await,
            },
        };

        let backend = self.backend.clone();
        self.cache
            .get_or_set(&key, ttl, move || async move { backend.count(&query).await })
            .await
    }

    /// Single tag by name; uncached
    pub async fn get_nft_tag(&self, tag: &str) -> GatewayResult<Tag> {
        match self.backend.get_item(COLLECTION, KEY_FIELD, tag).await? {
            Some(record) => from_record(record),
            None => Err(GatewayError::NotFound(format!("tag '{tag}' not found"))),
        }
    }

    fn tags_query(&self, search: Option<&str>) -> QueryBuilder {
        QueryBuilder::with_limits(COLLECTION, self.limits)
            .with_search_wildcard_condition(search, &[KEY_FIELD])
            .with_sort(vec![SortSpec::descending("count")])
    }
}

async fn fetch_tags(backend: &dyn SearchBackend, query: &QueryDescription) -> GatewayResult<Vec<Tag>> {
    backend.list(query).await?.into_iter().map(from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LocalCache, NoopRemoteCache};
    use crate::config::SearchCachePolicy;
    use crate::search::InMemorySearchBackend;
    use serde_json::json;

    fn backend() -> Arc<InMemorySearchBackend> {
        let data = json!({
            "tags": [
                { "tag": "sunny", "count": 46135 },
                { "tag": "sunset", "count": 120 },
                { "tag": "rain", "count": 900 },
                { "tag": "untallied" },
            ]
        });
        Arc::new(InMemorySearchBackend::from_json(data, QueryLimits::default()).unwrap())
    }

    fn service(backend: Arc<InMemorySearchBackend>, config: ServicesConfig) -> TagService {
        let cache = CacheOrchestrator::new(LocalCache::new(64), Arc::new(NoopRemoteCache), None);
        TagService::new(backend, cache, QueryLimits::default(), config)
    }

    #[tokio::test]
    async fn test_tags_sorted_by_count_and_cached() {
        let backend = backend();
        let service = service(backend.clone(), ServicesConfig::default());

        let tags = service.get_nft_tags(QueryPagination::new(0, 10), None).await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(names, vec!["sunny", "rain", "sunset", "untallied"]);
        assert_eq!(tags[3].count, None);

        let served = backend.queries_served();
        let again = service.get_nft_tags(QueryPagination::new(0, 10), None).await.unwrap();
        assert_eq!(again, tags);
        assert_eq!(backend.queries_served(), served);
        assert!(service.cache.get_local::<Vec<Tag>>("nftTags:0:10").is_some());
    }

    #[tokio::test]
    async fn test_search_bypasses_cache_by_default() {
        let backend = backend();
        let service = service(backend.clone(), ServicesConfig::default());

        for _ in 0..2 {
            let tags = service.get_nft_tags(QueryPagination::new(0, 10), Some("sun")).await.unwrap();
            assert_eq!(tags.len(), 2);
        }
        assert_eq!(backend.queries_served(), 2);
        assert_eq!(service.cache.stats().computations, 0);

        assert_eq!(service.get_nft_tag_count(Some("sun")).await.unwrap(), 2);
        assert_eq!(service.get_nft_tag_count(None).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_short_lived_search_policy() {
        let backend = backend();
        let config = ServicesConfig {
            search_cache: SearchCachePolicy::ShortLived { ttl_secs: 30 },
            ..Default::default()
        };
        let service = service(backend.clone(), config);

        service.get_nft_tags(QueryPagination::new(0, 10), Some("sun")).await.unwrap();
        service.get_nft_tags(QueryPagination::new(0, 10), Some("sun")).await.unwrap();
        assert_eq!(backend.queries_served(), 1);
        assert!(service.cache.get_local::<Vec<Tag>>("nftTags:0:10:sun").is_some());
    }

    #[tokio::test]
    async fn test_get_single_tag() {
        let service = service(backend(), ServicesConfig::default());

        let tag = service.get_nft_tag("rain").await.unwrap();
        assert_eq!(tag.count, Some(900));
        assert!(matches!(service.get_nft_tag("snow").await, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_window_rejected_before_cache() {
        let service = service(backend(), ServicesConfig::default());

        let err = service
            .get_nft_tags(QueryPagination::new(9_995, 10), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedQuery(_)));
        assert_eq!(service.cache.stats().computations, 0);
    }
}
