//! Key codec for record rows and index entries
//!
//! Two key families live in the store:
//!
//! ```text
//! model:<collection>:<primary key>
//! index:<collection>:<index name>:<value>:<primary key>
//! ```
//!
//! Byte-wise comparison of encoded index keys groups entries by collection
//! and index name. Every query is a half-open scan over the store followed
//! by a filter on the value segment.
//!
//! Segments are joined with `:` and are not escaped. Scan bounds are
//! therefore supersets, and a query recovers each entry's exact value with
//! [`entry_value`] from the primary key stored alongside it. A value and a
//! primary key that both contain the separator can still encode to the same
//! entry key.

/// Segment separator
pub const SEPARATOR: u8 = b':';

/// Leading segment of record row keys
pub const MODEL_TAG: &[u8] = b"model";

/// Leading segment of index entry keys
pub const INDEX_TAG: &[u8] = b"index";

/// Half-open byte key range `[start, end)`
///
/// `end == None` means the range is unbounded above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Inclusive lower bound
    pub start: Vec<u8>,
    /// Exclusive upper bound
    pub end: Option<Vec<u8>>,
}

impl KeyRange {
    /// Range covering every key that starts with `prefix`
    pub fn prefix(prefix: Vec<u8>) -> Self {
        let end = prefix_successor(&prefix);
        KeyRange { start: prefix, end }
    }

    /// Whether `key` falls inside the range
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice()
            && match &self.end {
                Some(end) => key < end.as_slice(),
                None => true,
            }
    }
}

/// Lowest byte string greater than every string that starts with `prefix`
///
/// Trailing `0xFF` bytes are dropped and the last remaining byte is
/// incremented. Returns `None` when no such string exists (empty prefix or
/// all `0xFF`).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

fn join(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len() + 1).sum();
    let mut key = Vec::with_capacity(len);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(SEPARATOR);
        }
        key.extend_from_slice(part);
    }
    key
}

/// `model:<collection>:<primary key>`
pub fn row_key(collection: &str, primary_key: &[u8]) -> Vec<u8> {
    join(&[MODEL_TAG, collection.as_bytes(), primary_key])
}

/// `model:<collection>:`, the prefix shared by every row of a collection
pub fn row_prefix(collection: &str) -> Vec<u8> {
    let mut key = join(&[MODEL_TAG, collection.as_bytes()]);
    key.push(SEPARATOR);
    key
}

/// `index:<collection>:<index>:<value>:<primary key>`
pub fn index_key(collection: &str, index: &str, value: &[u8], primary_key: &[u8]) -> Vec<u8> {
    join(&[
        INDEX_TAG,
        collection.as_bytes(),
        index.as_bytes(),
        value,
        primary_key,
    ])
}

/// `index:<collection>:<index>:`, the prefix shared by every entry of an index
pub fn index_prefix(collection: &str, index: &str) -> Vec<u8> {
    let mut key = join(&[INDEX_TAG, collection.as_bytes(), index.as_bytes()]);
    key.push(SEPARATOR);
    key
}

/// Entries whose value segment equals `value`
pub fn value_bounds(collection: &str, index: &str, value: &[u8]) -> KeyRange {
    let mut start = index_prefix(collection, index);
    start.extend_from_slice(value);
    start.push(SEPARATOR);
    KeyRange::prefix(start)
}

/// Scan range covering every entry whose value segment lies in `[start, end)`
///
/// Whole keys do not order like value segments: a value that is a proper
/// prefix of `end` is followed by `:` in its key, which can sort past
/// `prefix + end`. The upper bound therefore also covers
/// `prefix + v + ":"` for every proper prefix `v` of `end` with
/// `v >= start`. The range is a superset; callers filter with
/// [`entry_value`].
pub fn range_bounds(collection: &str, index: &str, start: &[u8], end: &[u8]) -> KeyRange {
    let prefix = index_prefix(collection, index);
    let mut low = prefix.clone();
    low.extend_from_slice(start);

    let mut high = prefix.clone();
    high.extend_from_slice(end);
    for cut in 0..end.len() {
        if &end[..cut] < start {
            continue;
        }
        let mut bucket = prefix.clone();
        bucket.extend_from_slice(&end[..cut]);
        bucket.push(SEPARATOR);
        if let Some(past) = prefix_successor(&bucket) {
            high = high.max(past);
        }
    }

    KeyRange {
        start: low,
        end: Some(high),
    }
}

/// Value segment of an entry key, given the primary key stored with it
///
/// Returns `None` when `entry` is not `index_prefix + value + ":" + pk`.
pub fn entry_value<'a>(
    collection: &str,
    index: &str,
    entry: &'a [u8],
    primary_key: &[u8],
) -> Option<&'a [u8]> {
    let rest = entry.strip_prefix(index_prefix(collection, index).as_slice())?;
    let rest = rest.strip_suffix(primary_key)?;
    rest.strip_suffix(&[SEPARATOR])
}

/// Entries whose value segment starts with `prefix`
///
/// An empty prefix selects the whole index.
pub fn prefix_bounds(collection: &str, index: &str, prefix: &[u8]) -> KeyRange {
    let mut start = index_prefix(collection, index);
    start.extend_from_slice(prefix);
    KeyRange::prefix(start)
}
