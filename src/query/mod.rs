//! Query construction
//!
//! Value types describing "what subset, in what order, filtered how" and the
//! builder that assembles them into a [`QueryDescription`].

pub mod builder;
pub mod condition;
pub mod pagination;
pub mod sort;

pub use builder::{QueryBuilder, QueryDescription, QueryLimits};
pub use condition::{Condition, QueryConditionOptions};
pub use pagination::QueryPagination;
pub use sort::{SortOrder, SortSpec};
