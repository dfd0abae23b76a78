use serde::{Deserialize, Serialize};

/// Offset/limit window of a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryPagination {
    pub from: u64,
    pub size: u64,
}

impl QueryPagination {
    pub fn new(from: u64, size: u64) -> Self {
        Self { from, size }
    }

    /// Last offset (exclusive) this window reaches into the result set
    pub fn end(&self) -> u64 {
        self.from.saturating_add(self.size)
    }
}

impl Default for QueryPagination {
    fn default() -> Self {
        Self { from: 0, size: 25 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_saturates() {
        assert_eq!(QueryPagination::new(10, 5).end(), 15);
        assert_eq!(QueryPagination::new(u64::MAX, 5).end(), u64::MAX);
    }
}
