//! Typed collections of records with synchronized secondary indexes
//!
//! Every mutation is a single [`WriteBatch`] holding the record row and the
//! exact delta of index entries, so a reader (or a crash) never observes a
//! row without its entries or entries without their row.
//!
//! ## Mutation Sequence
//!
//! ```text
//! 1. enter database (fails once closed)
//! 2. freeze descriptors
//! 3. lock stripe for (collection, primary key)
//! 4. read current row, compute entry delta
//! 5. write one batch
//! ```
//!
//! Queries scan index entries and resolve rows inside one store snapshot.
//! Results come back in ascending primary-key order with no duplicates.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use relaydb_core::key;
use relaydb_core::{Error, KeyRange, Record, Result, StoreSnapshot, WriteBatch};

use crate::database::Shared;
use crate::index::{
    entry_set, validate_name, AsIndex, Descriptor, Extractor, Index, MultiIndex,
};
use crate::query::IndexQuery;

pub(crate) struct CollectionInner<T> {
    name: String,
    shared: Arc<Shared>,
    indexes: RwLock<Vec<Arc<Descriptor<T>>>>,
    /// Set by the first mutation; no descriptor may be added afterwards
    frozen: AtomicBool,
}

impl<T: Record> CollectionInner<T> {
    pub(crate) fn new(name: &str, shared: Arc<Shared>) -> Self {
        Self {
            name: name.to_string(),
            shared,
            indexes: RwLock::new(Vec::new()),
            frozen: AtomicBool::new(false),
        }
    }
}

/// Handle to a named collection of `T` records
///
/// Handles are cheap to clone and share descriptors and state.
pub struct Collection<T> {
    inner: Arc<CollectionInner<T>>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.inner.name)
            .field("indexes", &self.inner.indexes.read().len())
            .finish()
    }
}

impl<T: Record> Collection<T> {
    pub(crate) fn from_inner(inner: Arc<CollectionInner<T>>) -> Self {
        Self { inner }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Names of the registered indexes, in registration order
    pub fn index_names(&self) -> Vec<String> {
        self.inner
            .indexes
            .read()
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    // ========================================================================
    // Index registration
    // ========================================================================

    /// Register a single-valued index
    ///
    /// `extractor` must be pure: the same record always yields the same value.
    ///
    /// # Errors
    ///
    /// - `Error::IndexExists` if the name is taken on this collection
    /// - `Error::IndexesFrozen` once any mutation has gone through the collection
    /// - `Error::InvalidName` for an empty name or one containing `:`
    pub fn add_index<F>(&self, name: &str, extractor: F) -> Result<Index<T>>
    where
        F: Fn(&T) -> Vec<u8> + Send + Sync + 'static,
    {
        let descriptor = self.register(name, Extractor::Single(Box::new(extractor)))?;
        Ok(Index::new(descriptor))
    }

    /// Register a multi-valued index
    ///
    /// Duplicate values returned for one record collapse into one entry. An
    /// empty result leaves the record out of the index.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::add_index`].
    pub fn add_multi_index<F>(&self, name: &str, extractor: F) -> Result<MultiIndex<T>>
    where
        F: Fn(&T) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        let descriptor = self.register(name, Extractor::Multi(Box::new(extractor)))?;
        Ok(MultiIndex::new(descriptor))
    }

    fn register(&self, name: &str, extractor: Extractor<T>) -> Result<Arc<Descriptor<T>>> {
        let _open = self.inner.shared.enter()?;
        validate_name(name)?;

        let mut indexes = self.inner.indexes.write();
        if self.inner.frozen.load(Ordering::Acquire) {
            return Err(Error::IndexesFrozen {
                collection: self.inner.name.clone(),
                index: name.to_string(),
            });
        }
        if indexes.iter().any(|d| d.name() == name) {
            return Err(Error::IndexExists {
                collection: self.inner.name.clone(),
                index: name.to_string(),
            });
        }

        let descriptor = Arc::new(Descriptor::new(&self.inner.name, name, extractor));
        indexes.push(Arc::clone(&descriptor));
        debug!(
            target: "relaydb::collection",
            collection = %self.inner.name,
            index = name,
            multi = descriptor.is_multi(),
            "Registered index"
        );
        Ok(descriptor)
    }

    /// Freeze the descriptor list and return a copy of it
    ///
    /// Holding the read lock while setting the flag orders this against a
    /// concurrent `register`: either its descriptor is in the copy, or it
    /// observes the flag.
    fn freeze(&self) -> Vec<Arc<Descriptor<T>>> {
        let indexes = self.inner.indexes.read();
        self.inner.frozen.store(true, Ordering::Release);
        indexes.clone()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a new record and all of its index entries
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyExists` if a row with the same primary key
    /// exists. Nothing is written on any error.
    pub fn insert(&self, record: &T) -> Result<()> {
        let _open = self.inner.shared.enter()?;
        let indexes = self.freeze();
        let pk = record.primary_key();
        let store = &self.inner.shared.store;

        let _guard = self.inner.shared.locks.lock(&self.inner.name, &pk);
        let row_key = key::row_key(&self.inner.name, &pk);
        if store.has(&row_key)? {
            return Err(Error::already_exists(&self.inner.name, &pk));
        }

        let entries = entry_set(&indexes, record, &pk);
        let mut batch = WriteBatch::with_capacity(entries.len() + 1);
        batch.put(row_key, record.encode()?);
        for entry in entries {
            batch.put(entry, pk.clone());
        }

        let ops = batch.len();
        store.write(batch)?;
        debug!(target: "relaydb::collection", collection = %self.inner.name, ops, "Inserted record");
        Ok(())
    }

    /// Replace an existing record, moving its index entries
    ///
    /// Only entries whose key changes are touched: stale entries are deleted,
    /// new ones put, and the row overwritten, all in one batch.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no row has the record's primary key and
    /// `Error::Corrupt` if the stored row cannot be decoded.
    pub fn update(&self, record: &T) -> Result<()> {
        let _open = self.inner.shared.enter()?;
        let indexes = self.freeze();
        let pk = record.primary_key();
        let store = &self.inner.shared.store;

        let _guard = self.inner.shared.locks.lock(&self.inner.name, &pk);
        let row_key = key::row_key(&self.inner.name, &pk);
        let previous = store
            .get(&row_key)?
            .ok_or_else(|| Error::not_found(&self.inner.name, &pk))?;
        let previous = self.decode_row(&pk, &previous)?;

        let old_entries = entry_set(&indexes, &previous, &pk);
        let new_entries = entry_set(&indexes, record, &pk);

        let mut batch = WriteBatch::new();
        for stale in old_entries.difference(&new_entries) {
            batch.delete(stale.clone());
        }
        for fresh in new_entries.difference(&old_entries) {
            batch.put(fresh.clone(), pk.clone());
        }
        batch.put(row_key, record.encode()?);

        let ops = batch.len();
        store.write(batch)?;
        debug!(target: "relaydb::collection", collection = %self.inner.name, ops, "Updated record");
        Ok(())
    }

    /// Delete a record and every index entry derived from it
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no row has this primary key and
    /// `Error::Corrupt` if the stored row cannot be decoded (its entries
    /// could not be located).
    pub fn delete(&self, primary_key: &[u8]) -> Result<()> {
        let _open = self.inner.shared.enter()?;
        let indexes = self.freeze();
        let store = &self.inner.shared.store;

        let _guard = self.inner.shared.locks.lock(&self.inner.name, primary_key);
        let row_key = key::row_key(&self.inner.name, primary_key);
        let current = store
            .get(&row_key)?
            .ok_or_else(|| Error::not_found(&self.inner.name, primary_key))?;
        let current = self.decode_row(primary_key, &current)?;

        let entries = entry_set(&indexes, &current, primary_key);
        let mut batch = WriteBatch::with_capacity(entries.len() + 1);
        for entry in entries {
            batch.delete(entry);
        }
        batch.delete(row_key);

        let ops = batch.len();
        store.write(batch)?;
        debug!(target: "relaydb::collection", collection = %self.inner.name, ops, "Deleted record");
        Ok(())
    }

    // ========================================================================
    // Primary key lookups
    // ========================================================================

    /// Fetch one record by primary key
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if absent, `Error::Corrupt` if undecodable.
    pub fn find_by_id(&self, primary_key: &[u8]) -> Result<T> {
        let _open = self.inner.shared.enter()?;
        let row = self
            .inner
            .shared
            .store
            .get(&key::row_key(&self.inner.name, primary_key))?
            .ok_or_else(|| Error::not_found(&self.inner.name, primary_key))?;
        self.decode_row(primary_key, &row)
    }

    /// Whether a row exists for `primary_key`
    pub fn exists(&self, primary_key: &[u8]) -> Result<bool> {
        let _open = self.inner.shared.enter()?;
        self.inner
            .shared
            .store
            .has(&key::row_key(&self.inner.name, primary_key))
    }

    /// Every record in the collection, ascending primary key
    pub fn find_all(&self) -> Result<Vec<T>> {
        let _open = self.inner.shared.enter()?;
        let prefix = key::row_prefix(&self.inner.name);
        let snapshot = self.inner.shared.store.snapshot()?;

        snapshot
            .scan(&KeyRange::prefix(prefix.clone()))?
            .into_iter()
            .map(|(row_key, row)| self.decode_row(&row_key[prefix.len()..], &row))
            .collect()
    }

    /// Number of records in the collection
    pub fn count(&self) -> Result<usize> {
        let _open = self.inner.shared.enter()?;
        let snapshot = self.inner.shared.store.snapshot()?;
        Ok(snapshot
            .scan(&KeyRange::prefix(key::row_prefix(&self.inner.name)))?
            .len())
    }

    // ========================================================================
    // Index queries
    // ========================================================================

    /// Records whose `index` value equals `value`
    pub fn find_with_value<I: AsIndex<T>>(&self, index: &I, value: impl AsRef<[u8]>) -> Result<Vec<T>> {
        self.find(index, &IndexQuery::value(value.as_ref()))
    }

    /// Records with an `index` value in `[start, end)`
    pub fn find_with_range<I: AsIndex<T>>(
        &self,
        index: &I,
        start: impl AsRef<[u8]>,
        end: impl AsRef<[u8]>,
    ) -> Result<Vec<T>> {
        self.find(index, &IndexQuery::range(start.as_ref(), end.as_ref()))
    }

    /// Records with an `index` value starting with `prefix`
    ///
    /// An empty prefix returns every record with at least one entry in the
    /// index.
    pub fn find_with_prefix<I: AsIndex<T>>(&self, index: &I, prefix: impl AsRef<[u8]>) -> Result<Vec<T>> {
        self.find(index, &IndexQuery::prefix(prefix.as_ref()))
    }

    /// Like [`Collection::find`] but appends to `out`
    ///
    /// `out` is left untouched if the query fails. Returns the number of
    /// records appended.
    pub fn find_into<I: AsIndex<T>>(
        &self,
        index: &I,
        query: &IndexQuery,
        out: &mut Vec<T>,
    ) -> Result<usize> {
        let found = self.find(index, query)?;
        let appended = found.len();
        out.extend(found);
        Ok(appended)
    }

    /// Run `query` against `index`
    ///
    /// Entries are scanned, filtered on their value segment and resolved to
    /// rows inside one store snapshot.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownIndex` if `index` was not registered on this collection
    /// - `Error::Corrupt` if an entry points at a missing or undecodable row,
    ///   or its key does not end with the primary key it stores
    pub fn find<I: AsIndex<T>>(&self, index: &I, query: &IndexQuery) -> Result<Vec<T>> {
        let _open = self.inner.shared.enter()?;
        let descriptor = index.descriptor();
        self.check_registered(descriptor)?;

        let range = query.bounds(&self.inner.name, descriptor.name());
        let snapshot = self.inner.shared.store.snapshot()?;

        // Entry values are primary keys; the set orders and deduplicates.
        let mut primary_keys = BTreeSet::new();
        for (entry, pk) in snapshot.scan(&range)? {
            let value = key::entry_value(&self.inner.name, descriptor.name(), &entry, &pk)
                .ok_or_else(|| {
                    Error::Corrupt(format!(
                        "index {}:{} entry {} does not end with its primary key",
                        self.inner.name,
                        descriptor.name(),
                        String::from_utf8_lossy(&entry)
                    ))
                })?;
            if query.matches(value) {
                primary_keys.insert(pk);
            }
        }

        let mut records = Vec::with_capacity(primary_keys.len());
        for pk in primary_keys {
            records.push(self.resolve(&*snapshot, descriptor.name(), &pk)?);
        }
        Ok(records)
    }

    fn check_registered(&self, descriptor: &Arc<Descriptor<T>>) -> Result<()> {
        let indexes = self.inner.indexes.read();
        if indexes.iter().any(|d| Arc::ptr_eq(d, descriptor)) {
            Ok(())
        } else {
            Err(Error::UnknownIndex {
                collection: self.inner.name.clone(),
                index: descriptor.name().to_string(),
            })
        }
    }

    fn resolve(&self, snapshot: &dyn StoreSnapshot, index: &str, pk: &[u8]) -> Result<T> {
        let row = snapshot
            .get(&key::row_key(&self.inner.name, pk))?
            .ok_or_else(|| {
                Error::Corrupt(format!(
                    "index {}:{} has an entry for missing row {}",
                    self.inner.name,
                    index,
                    String::from_utf8_lossy(pk)
                ))
            })?;
        self.decode_row(pk, &row)
    }

    fn decode_row(&self, pk: &[u8], row: &[u8]) -> Result<T> {
        T::decode(row).map_err(|e| {
            Error::Corrupt(format!(
                "row {} in collection {} cannot be decoded: {}",
                String::from_utf8_lossy(pk),
                self.inner.name,
                e
            ))
        })
    }
}
