//! Elasticsearch request bodies
//!
//! Translates a [`QueryDescription`] into the engine's native query DSL. The
//! HTTP transport that posts these bodies lives outside this crate.

use crate::query::{Condition, QueryDescription};
use serde_json::{json, Map, Value};

/// Path of the `_search` endpoint for the query's collection
pub fn search_path(query: &QueryDescription) -> String {
    format!("/{}/_search", query.collection)
}

/// Path of the `_count` endpoint for the query's collection
pub fn count_path(query: &QueryDescription) -> String {
    format!("/{}/_count", query.collection)
}

/// Body for `_search`: window, sort (missing values last) and query
pub fn render_search(query: &QueryDescription) -> Value {
    let mut body = Map::new();

    if let Some(pagination) = query.pagination {
        body.insert("from".into(), json!(pagination.from));
        body.insert("size".into(), json!(pagination.size));
    }

    if !query.sort.is_empty() {
        let sort: Vec<Value> = query
            .sort
            .iter()
            .map(|spec| json!({ spec.field.clone(): { "order": spec.order.as_str(), "missing": "_last" } }))
            .collect();
        body.insert("sort".into(), Value::Array(sort));
    }

    body.insert("query".into(), render_query(&query.conditions));
    Value::Object(body)
}

/// Body for `_count`: the query only
pub fn render_count(query: &QueryDescription) -> Value {
    json!({ "query": render_query(&query.conditions) })
}

fn render_query(conditions: &[Condition]) -> Value {
    if conditions.is_empty() {
        return json!({ "match_all": {} });
    }

    json!({ "bool": { "must": conditions.iter().map(render_condition).collect::<Vec<_>>() } })
}

fn render_condition(condition: &Condition) -> Value {
    match condition {
        Condition::Term { field, value } => json!({ "term": { field.clone(): value } }),
        Condition::Wildcard { field, pattern } => json!({ "wildcard": { field.clone(): { "value": pattern } } }),
        Condition::Range { field, gte, lte } => {
            let mut bounds = Map::new();
            if let Some(gte) = gte {
                bounds.insert("gte".into(), gte.clone());
            }
            if let Some(lte) = lte {
                bounds.insert("lte".into(), lte.clone());
            }
            json!({ "range": { field.clone(): bounds } })
        }
        Condition::Exists { field } => json!({ "exists": { "field": field } }),
        Condition::Bool { must, should } => {
            let mut group = Map::new();
            if !must.is_empty() {
                group.insert("must".into(), Value::Array(must.iter().map(render_condition).collect()));
            }
            if !should.is_empty() {
                group.insert("should".into(), Value::Array(should.iter().map(render_condition).collect()));
                group.insert("minimum_should_match".into(), json!(1));
            }
            json!({ "bool": group })
        }
    }
}
