//! Fluent construction of backend-neutral queries
//!
//! The builder accumulates filters (append-only), one pagination window and
//! one sort sequence. It performs no I/O; the terminal helpers hand the built
//! description to a [`SearchBackend`].

use super::{Condition, QueryConditionOptions, QueryPagination, SortSpec};
use crate::config::SearchConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::search::{SearchBackend, SearchRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hard limits of the search backend a query is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Maximum `from + size` the backend serves
    pub max_result_window: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_result_window: 10_000,
        }
    }
}

impl From<&SearchConfig> for QueryLimits {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_result_window: config.max_result_window,
        }
    }
}

/// Fully built query. Conditions are implicitly AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescription {
    pub collection: String,
    pub conditions: Vec<Condition>,
    /// `None` leaves the window to the backend default
    pub pagination: Option<QueryPagination>,
    /// Empty means backend default order (not stable across pages)
    pub sort: Vec<SortSpec>,
}

impl QueryDescription {
    pub fn empty(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            conditions: Vec::new(),
            pagination: None,
            sort: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    limits: QueryLimits,
    description: QueryDescription,
}

impl QueryBuilder {
    /// Empty query for `collection` with default limits
    pub fn create(collection: impl Into<String>) -> Self {
        Self::with_limits(collection, QueryLimits::default())
    }

    pub fn with_limits(collection: impl Into<String>, limits: QueryLimits) -> Self {
        Self {
            limits,
            description: QueryDescription::empty(collection),
        }
    }

    /// Attach the window verbatim, or fail if the backend cannot serve it.
    ///
    /// Callers clamp user input upstream; this never truncates.
    pub fn with_pagination(mut self, pagination: QueryPagination) -> GatewayResult<Self> {
        let max = self.limits.max_result_window;

        if pagination.size == 0 {
            return Err(GatewayError::MalformedQuery(
                "pagination size must be positive".to_string(),
            ));
        }

        if pagination.size > max {
            return Err(GatewayError::MalformedQuery(format!(
                "pagination size {} exceeds the maximum of {}",
                pagination.size, max
            )));
        }

        if pagination.end() > max {
            return Err(GatewayError::MalformedQuery(format!(
                "result window from {} + size {} exceeds the maximum of {}",
                pagination.from, pagination.size, max
            )));
        }

        self.description.pagination = Some(pagination);
        Ok(self)
    }

    /// Replace any previous sort
    pub fn with_sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.description.sort = sort;
        self
    }

    /// Match records where any of `fields` contains `term` as a substring.
    ///
    /// No-op for `None` or an empty term.
    pub fn with_search_wildcard_condition(mut self, term: Option<&str>, fields: &[&str]) -> Self {
        let term = match term {
            Some(term) if !term.is_empty() => term,
            _ => return self,
        };

        let pattern = format!("*{}*", escape_wildcard(term));
        let should = fields
            .iter()
            .map(|field| Condition::wildcard(*field, pattern.clone()))
            .collect();

        self.description.conditions.push(Condition::any_of(should));
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.description.conditions.push(condition);
        self
    }

    pub fn with_term(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_condition(Condition::term(field, value))
    }

    /// Field equals any of `values`; no-op when `values` is empty
    pub fn with_terms<V: Into<Value>>(self, field: &str, values: Vec<V>) -> Self {
        if values.is_empty() {
            return self;
        }

        let terms = values.into_iter().map(|value| Condition::term(field, value)).collect();
        self.with_condition(Condition::any_of(terms))
    }

    /// Inclusive range; no-op when both bounds are open
    pub fn with_range(self, field: &str, gte: Option<Value>, lte: Option<Value>) -> Self {
        if gte.is_none() && lte.is_none() {
            return self;
        }

        self.with_condition(Condition::range(field, gte, lte))
    }

    pub fn with_exists(self, field: &str) -> Self {
        self.with_condition(Condition::exists(field))
    }

    /// Add `conditions` as one group combined per `options`
    pub fn with_condition_options(self, options: QueryConditionOptions, conditions: Vec<Condition>) -> Self {
        match options.combine(conditions) {
            Some(condition) => self.with_condition(condition),
            None => self,
        }
    }

    pub fn description(&self) -> &QueryDescription {
        &self.description
    }

    pub fn build(self) -> QueryDescription {
        self.description
    }

    pub async fn list<B>(self, backend: &B) -> GatewayResult<Vec<SearchRecord>>
    where
        B: SearchBackend + ?Sized,
    {
        backend.list(&self.description).await
    }

    pub async fn count<B>(self, backend: &B) -> GatewayResult<u64>
    where
        B: SearchBackend + ?Sized,
    {
        backend.count(&self.description).await
    }

    /// First record of the window, if any
    pub async fn get_one<B>(mut self, backend: &B) -> GatewayResult<Option<SearchRecord>>
    where
        B: SearchBackend + ?Sized,
    {
        let from = self.description.pagination.map(|p| p.from).unwrap_or(0);
        self.description.pagination = Some(QueryPagination::new(from, 1));
        Ok(backend.list(&self.description).await?.into_iter().next())
    }
}

/// Escape wildcard metacharacters so `term` matches literally
fn escape_wildcard(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use serde_json::json;

    fn tags_query(search: Option<&str>) -> GatewayResult<QueryDescription> {
        Ok(QueryBuilder::create("tags")
            .with_search_wildcard_condition(search, &["tag"])
            .with_sort(vec![SortSpec::descending("count")])
            .with_pagination(QueryPagination::new(0, 10))?
            .build())
    }

    #[test]
    fn test_composition() {
        let query = tags_query(Some("sun")).unwrap();

        assert_eq!(query.collection, "tags");
        assert_eq!(query.pagination, Some(QueryPagination::new(0, 10)));
        assert_eq!(query.sort, vec![SortSpec { field: "count".into(), order: SortOrder::Descending }]);
        assert_eq!(
            query.conditions,
            vec![Condition::any_of(vec![Condition::wildcard("tag", "*sun*")])]
        );
    }

    #[test]
    fn test_empty_search_adds_nothing() {
        assert!(tags_query(None).unwrap().conditions.is_empty());
        assert!(tags_query(Some("")).unwrap().conditions.is_empty());
    }

    #[test]
    fn test_wildcard_spans_all_fields() {
        let query = QueryBuilder::create("transactions")
            .with_search_wildcard_condition(Some("claim"), &["data", "function"])
            .build();

        match &query.conditions[0] {
            Condition::Bool { must, should } => {
                assert!(must.is_empty());
                assert_eq!(should.len(), 2);
            }
            other => panic!("expected bool group, got {:?}", other),
        }
    }

    #[test]
    fn test_wildcard_term_is_escaped() {
        let query = QueryBuilder::create("tags")
            .with_search_wildcard_condition(Some("a*b?"), &["tag"])
            .build();

        assert_eq!(
            query.conditions,
            vec![Condition::any_of(vec![Condition::wildcard("tag", "*a\\*b\\?*")])]
        );
    }

    #[test]
    fn test_rejects_oversized_page() {
        let err = QueryBuilder::create("tags")
            .with_pagination(QueryPagination::new(0, 1_000_000))
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedQuery(_)));
    }

    #[test]
    fn test_rejects_window_overflow() {
        let err = QueryBuilder::create("tags")
            .with_pagination(QueryPagination::new(9_995, 10))
            .unwrap_err();
        assert!(err.to_string().contains("9995"));

        assert!(QueryBuilder::create("tags")
            .with_pagination(QueryPagination::new(9_990, 10))
            .is_ok());
    }

    #[test]
    fn test_rejects_zero_size() {
        assert!(QueryBuilder::create("tags")
            .with_pagination(QueryPagination::new(0, 0))
            .is_err());
    }

    #[test]
    fn test_configured_limits() {
        let limits = QueryLimits { max_result_window: 100 };
        assert!(QueryBuilder::with_limits("tags", limits)
            .with_pagination(QueryPagination::new(0, 101))
            .is_err());
    }

    #[test]
    fn test_sort_replaces() {
        let query = QueryBuilder::create("tags")
            .with_sort(vec![SortSpec::ascending("tag")])
            .with_sort(vec![SortSpec::descending("count"), SortSpec::ascending("tag")])
            .build();

        assert_eq!(query.sort.len(), 2);
        assert_eq!(query.sort[0].field, "count");
    }

    #[test]
    fn test_conditions_are_append_only() {
        let query = QueryBuilder::create("transactions")
            .with_term("status", "success")
            .with_terms::<&str>("txHash", vec![])
            .with_range("timestamp", None, None)
            .with_range("timestamp", Some(json!(100)), None)
            .with_exists("function")
            .build();

        assert_eq!(query.conditions.len(), 3);
        assert_eq!(query.conditions[0], Condition::term("status", "success"));
    }

    #[test]
    fn test_rebuild_is_structurally_equal() {
        assert_eq!(tags_query(Some("sun")).unwrap(), tags_query(Some("sun")).unwrap());
    }
}
