//! In-process search backend
//!
//! Evaluates query descriptions against JSON records held in memory. Used by
//! the CLI for local data files and by tests as a stand-in for the indexing
//! engine. Semantics follow the engine's conventions:
//! - wildcard matching is case-sensitive (`*` any run, `?` one char, `\` escapes)
//! - ranges compare numbers numerically and strings lexically
//! - records missing a sort field (or holding null) sort last in either order;
//!   values of different JSON types order by type (bool, number, string)
//! - an unsorted query returns records in insertion order

use super::{SearchBackend, SearchRecord};
use crate::errors::{GatewayError, GatewayResult};
use crate::query::{Condition, QueryDescription, QueryLimits, SortOrder, SortSpec};
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering},
        RwLock,
    },
};
use tracing::debug;

/// Page size used when a query carries no pagination
const DEFAULT_PAGE_SIZE: u64 = 10;

pub struct InMemorySearchBackend {
    collections: RwLock<HashMap<String, Vec<SearchRecord>>>,
    limits: QueryLimits,
    available: AtomicBool,
    queries_served: AtomicU64,
}

impl InMemorySearchBackend {
    pub fn new(limits: QueryLimits) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            limits,
            available: AtomicBool::new(true),
            queries_served: AtomicU64::new(0),
        }
    }

    /// Load `{ "<collection>": [ {record}, ... ], ... }`
    pub fn from_json(data: Value, limits: QueryLimits) -> GatewayResult<Self> {
        let backend = Self::new(limits);
        let collections = match data {
            Value::Object(collections) => collections,
            _ => {
                return Err(GatewayError::InvalidRequest(
                    "data file must be an object of collections".to_string(),
                ))
            }
        };

        for (collection, records) in collections {
            let records = match records {
                Value::Array(records) => records,
                _ => {
                    return Err(GatewayError::InvalidRequest(format!(
                        "collection '{}' must be an array of records",
                        collection
                    )))
                }
            };

            for record in records {
                match record {
                    Value::Object(record) => backend.insert(&collection, record),
                    other => {
                        return Err(GatewayError::InvalidRequest(format!(
                            "record in '{}' is not an object: {}",
                            collection, other
                        )))
                    }
                }
            }
        }

        Ok(backend)
    }

    pub fn insert(&self, collection: &str, record: SearchRecord) {
        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        collections.entry(collection.to_string()).or_default().push(record);
    }

    /// Simulate the engine going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Number of list/count/get calls that reached the data
    pub fn queries_served(&self) -> u64 {
        self.queries_served.load(AtomicOrdering::SeqCst)
    }

    fn ensure_available(&self) -> GatewayResult<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            self.queries_served.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        } else {
            Err(GatewayError::BackendUnavailable("in-memory index is offline".to_string()))
        }
    }

    fn matching(&self, query: &QueryDescription) -> Vec<SearchRecord> {
        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        collections
            .get(&query.collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| query.conditions.iter().all(|c| matches_condition(record, c)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchBackend for InMemorySearchBackend {
    async fn list(&self, query: &QueryDescription) -> GatewayResult<Vec<SearchRecord>> {
        self.ensure_available()?;

        let (from, size) = query
            .pagination
            .map(|p| (p.from, p.size))
            .unwrap_or((0, DEFAULT_PAGE_SIZE));

        if from.saturating_add(size) > self.limits.max_result_window {
            return Err(GatewayError::MalformedQuery(format!(
                "result window is too large, from + size must be less than or equal to {}",
                self.limits.max_result_window
            )));
        }

        let mut records = self.matching(query);
        if !query.sort.is_empty() {
            records.sort_by(|a, b| compare_records(a, b, &query.sort));
        }

        debug!(collection = %query.collection, matched = records.len(), from, size, "in-memory list");

        Ok(records
            .into_iter()
            .skip(from as usize)
            .take(size as usize)
            .collect())
    }

    async fn count(&self, query: &QueryDescription) -> GatewayResult<u64> {
        self.ensure_available()?;
        Ok(self.matching(query).len() as u64)
    }

    async fn get_item(&self, collection: &str, key_field: &str, key: &str) -> GatewayResult<Option<SearchRecord>> {
        self.ensure_available()?;

        let collections = self.collections.read().unwrap_or_else(|e| e.into_inner());
        Ok(collections.get(collection).and_then(|records| {
            records
                .iter()
                .find(|record| lookup(record, key_field).and_then(text_of).as_deref() == Some(key))
                .cloned()
        }))
    }
}

/// Resolve a dotted field path
fn lookup<'a>(record: &'a SearchRecord, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn matches_condition(record: &SearchRecord, condition: &Condition) -> bool {
    match condition {
        Condition::Term { field, value } => {
            any_value(lookup(record, field), |candidate| values_equal(candidate, value))
        }
        Condition::Wildcard { field, pattern } => any_value(lookup(record, field), |candidate| {
            text_of(candidate).is_some_and(|text| wildcard_match(pattern, &text))
        }),
        Condition::Range { field, gte, lte } => any_value(lookup(record, field), |candidate| {
            let above = gte
                .as_ref()
                .map_or(true, |bound| matches!(compare_scalars(candidate, bound), Some(Ordering::Greater | Ordering::Equal)));
            let below = lte
                .as_ref()
                .map_or(true, |bound| matches!(compare_scalars(candidate, bound), Some(Ordering::Less | Ordering::Equal)));
            above && below
        }),
        Condition::Exists { field } => lookup(record, field).is_some_and(|value| !value.is_null()),
        Condition::Bool { must, should } => {
            must.iter().all(|c| matches_condition(record, c))
                && (should.is_empty() || should.iter().any(|c| matches_condition(record, c)))
        }
    }
}

/// Apply `predicate` to a scalar, or to each element of an array field
fn any_value<F>(value: Option<&Value>, predicate: F) -> bool
where
    F: Fn(&Value) -> bool,
{
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items.iter().any(|item| predicate(item)),
        Some(value) => predicate(value),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Integers compare exactly; floats (or mixed signs beyond `i64`) as `f64`
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

/// Rank of a value's JSON type, so values of different types still order
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_records(a: &SearchRecord, b: &SearchRecord, sort: &[SortSpec]) -> Ordering {
    for spec in sort {
        let left = lookup(a, &spec.field).filter(|v| !v.is_null());
        let right = lookup(b, &spec.field).filter(|v| !v.is_null());

        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            // Missing values sort last whatever the direction
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let natural = type_rank(x)
                    .cmp(&type_rank(y))
                    .then_with(|| compare_scalars(x, y).unwrap_or(Ordering::Equal));
                match spec.order {
                    SortOrder::Ascending => natural,
                    SortOrder::Descending => natural.reverse(),
                }
            }
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[derive(Debug, PartialEq)]
enum Token {
    Any,
    One,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => Token::Any,
            '?' => Token::One,
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            c => Token::Literal(c),
        });
    }
    tokens
}

/// Glob match with single-star backtracking
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                star = Some((p, t));
                p += 1;
            }
            Some(Token::One) => {
                p += 1;
                t += 1;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    star = Some((star_p, star_t + 1));
                    p = star_p + 1;
                    t = star_t + 1;
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| *token == Token::Any)
}
