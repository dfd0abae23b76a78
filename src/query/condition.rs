//! Backend-neutral filter conditions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single filter over a record.
///
/// `Bool` matches when every `must` condition matches and, if `should` is not
/// empty, at least one `should` condition matches. Groups nest freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Term { field: String, value: Value },
    Wildcard { field: String, pattern: String },
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    Exists { field: String },
    Bool {
        must: Vec<Condition>,
        should: Vec<Condition>,
    },
}

impl Condition {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Wildcard {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Inclusive range; an absent bound is open
    pub fn range(field: impl Into<String>, gte: Option<Value>, lte: Option<Value>) -> Self {
        Condition::Range {
            field: field.into(),
            gte,
            lte,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Condition::Exists { field: field.into() }
    }

    /// Matches if any of `conditions` matches
    pub fn any_of(conditions: Vec<Condition>) -> Self {
        Condition::Bool {
            must: Vec::new(),
            should: conditions,
        }
    }

    /// Matches if all of `conditions` match
    pub fn all_of(conditions: Vec<Condition>) -> Self {
        Condition::Bool {
            must: conditions,
            should: Vec::new(),
        }
    }
}

/// How a set of filters is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryConditionOptions {
    /// Every filter must match
    #[default]
    Must,
    /// At least one filter must match
    Should,
}

impl QueryConditionOptions {
    /// Fold `conditions` into a single condition honouring this option
    pub fn combine(self, conditions: Vec<Condition>) -> Option<Condition> {
        if conditions.is_empty() {
            return None;
        }

        Some(match self {
            QueryConditionOptions::Must => Condition::all_of(conditions),
            QueryConditionOptions::Should => Condition::any_of(conditions),
        })
    }
}
