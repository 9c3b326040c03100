//! Index query shapes and their key bounds

use relaydb_core::key;
use relaydb_core::KeyRange;

/// A query over the value segment of an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Entries whose value equals the given bytes
    Value(Vec<u8>),
    /// Entries whose value lies in `[start, end)`
    Range {
        /// Inclusive lower bound
        start: Vec<u8>,
        /// Exclusive upper bound
        end: Vec<u8>,
    },
    /// Entries whose value starts with the given bytes; empty matches all
    Prefix(Vec<u8>),
}

impl IndexQuery {
    /// Exact-match query
    pub fn value(value: impl Into<Vec<u8>>) -> Self {
        IndexQuery::Value(value.into())
    }

    /// Half-open range query
    pub fn range(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        IndexQuery::Range {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Prefix query
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        IndexQuery::Prefix(prefix.into())
    }

    /// Whether an entry with value segment `value` satisfies the query
    pub fn matches(&self, value: &[u8]) -> bool {
        match self {
            IndexQuery::Value(wanted) => value == wanted.as_slice(),
            IndexQuery::Range { start, end } => start.as_slice() <= value && value < end.as_slice(),
            IndexQuery::Prefix(prefix) => value.starts_with(prefix),
        }
    }

    /// Store key range holding at least the matching entries of `index` in
    /// `collection`; entries outside the query are removed with
    /// [`IndexQuery::matches`]
    pub fn bounds(&self, collection: &str, index: &str) -> KeyRange {
        match self {
            IndexQuery::Value(value) => key::value_bounds(collection, index, value),
            IndexQuery::Range { start, end } => key::range_bounds(collection, index, start, end),
            IndexQuery::Prefix(prefix) => key::prefix_bounds(collection, index, prefix),
        }
    }
}
