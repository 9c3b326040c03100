//! Secondary index descriptors
//!
//! A descriptor binds an index name to a pure extraction function over a
//! record:
//! - [`Index`]: exactly one value per record
//! - [`MultiIndex`]: zero or more values per record, duplicates collapsed
//!
//! Descriptors are created by `Collection::add_index` and
//! `Collection::add_multi_index`. Handles are cheap to clone and are only
//! accepted by the collection that created them.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use relaydb_core::key;
use relaydb_core::{Error, Record, Result};

pub(crate) type SingleExtractor<T> = Box<dyn Fn(&T) -> Vec<u8> + Send + Sync>;
pub(crate) type MultiExtractor<T> = Box<dyn Fn(&T) -> Vec<Vec<u8>> + Send + Sync>;

pub(crate) enum Extractor<T> {
    Single(SingleExtractor<T>),
    Multi(MultiExtractor<T>),
}

/// Type-erased descriptor shared by [`Index`] and [`MultiIndex`]
pub struct Descriptor<T> {
    collection: String,
    name: String,
    extractor: Extractor<T>,
}

impl<T: Record> Descriptor<T> {
    pub(crate) fn new(collection: &str, name: &str, extractor: Extractor<T>) -> Self {
        Self {
            collection: collection.to_string(),
            name: name.to_string(),
            extractor,
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a multi-valued index
    pub fn is_multi(&self) -> bool {
        matches!(self.extractor, Extractor::Multi(_))
    }

    /// Distinct values this descriptor extracts from `record`
    pub fn values(&self, record: &T) -> BTreeSet<Vec<u8>> {
        match &self.extractor {
            Extractor::Single(f) => BTreeSet::from([f(record)]),
            Extractor::Multi(f) => f(record).into_iter().collect(),
        }
    }

    /// Entry keys this descriptor produces for `record` stored under `primary_key`
    pub(crate) fn entry_keys(&self, record: &T, primary_key: &[u8], out: &mut BTreeSet<Vec<u8>>) {
        for value in self.values(record) {
            out.insert(key::index_key(
                &self.collection,
                &self.name,
                &value,
                primary_key,
            ));
        }
    }
}

impl<T> fmt::Debug for Descriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("collection", &self.collection)
            .field("name", &self.name)
            .field("multi", &matches!(self.extractor, Extractor::Multi(_)))
            .finish()
    }
}

/// Full entry set for `record` across every descriptor
pub(crate) fn entry_set<T: Record>(
    descriptors: &[Arc<Descriptor<T>>],
    record: &T,
    primary_key: &[u8],
) -> BTreeSet<Vec<u8>> {
    let mut entries = BTreeSet::new();
    for descriptor in descriptors {
        descriptor.entry_keys(record, primary_key, &mut entries);
    }
    entries
}

/// Reject empty names and names containing the key separator
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.as_bytes().contains(&key::SEPARATOR) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Anything a collection query accepts as an index
pub trait AsIndex<T> {
    /// The underlying descriptor
    fn descriptor(&self) -> &Arc<Descriptor<T>>;
}

/// Single-valued secondary index handle
pub struct Index<T> {
    descriptor: Arc<Descriptor<T>>,
}

impl<T: Record> Index<T> {
    pub(crate) fn new(descriptor: Arc<Descriptor<T>>) -> Self {
        Self { descriptor }
    }

    /// Index name
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }
}

/// Multi-valued secondary index handle
pub struct MultiIndex<T> {
    descriptor: Arc<Descriptor<T>>,
}

impl<T: Record> MultiIndex<T> {
    pub(crate) fn new(descriptor: Arc<Descriptor<T>>) -> Self {
        Self { descriptor }
    }

    /// Index name
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }
}

// Manual impls: deriving would require `T: Clone` / `T: Debug`.

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
        }
    }
}

impl<T> Clone for MultiIndex<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
        }
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Index").field(&self.descriptor).finish()
    }
}

impl<T> fmt::Debug for MultiIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MultiIndex").field(&self.descriptor).finish()
    }
}

impl<T> AsIndex<T> for Index<T> {
    fn descriptor(&self) -> &Arc<Descriptor<T>> {
        &self.descriptor
    }
}

impl<T> AsIndex<T> for MultiIndex<T> {
    fn descriptor(&self) -> &Arc<Descriptor<T>> {
        &self.descriptor
    }
}
