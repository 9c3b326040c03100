//! MemoryStore: ordered in-memory backend with BTreeMap and RwLock
//!
//! This module implements the OrderedStore trait using:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` for byte-ordered key storage
//! - `parking_lot::RwLock` for thread-safe access
//!
//! # Design Notes
//!
//! - **Batch atomicity**: a whole batch is applied under one write lock
//!   acquisition, so no reader sees a partial batch.
//! - **Guard-backed snapshots**: a snapshot holds the read lock. Writers wait
//!   until the snapshot is dropped; snapshots never copy the map.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::{RwLock, RwLockReadGuard};

use relaydb_core::{BatchOp, KeyRange, OrderedStore, Result, StoreSnapshot, WriteBatch};

/// Ordered byte map shared by both store implementations
pub(crate) type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// Apply every op of `batch` to `table` in order
pub(crate) fn apply_batch(table: &mut Table, batch: WriteBatch) {
    for op in batch.into_ops() {
        match op {
            BatchOp::Put { key, value } => {
                table.insert(key, value);
            }
            BatchOp::Delete { key } => {
                table.remove(&key);
            }
        }
    }
}

/// Ephemeral ordered store
///
/// All data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Table>,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store pre-populated with `table` (used by recovery)
    pub(crate) fn from_table(table: Table) -> Self {
        Self {
            data: RwLock::new(table),
        }
    }

    /// Apply a batch under the write lock
    pub(crate) fn apply(&self, batch: WriteBatch) {
        let mut data = self.data.write();
        apply_batch(&mut data, batch);
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        tracing::trace!(ops = batch.len(), "Applying batch to memory store");
        self.apply(batch);
        Ok(())
    }

    fn snapshot(&self) -> Result<Box<dyn StoreSnapshot + '_>> {
        Ok(Box::new(MemorySnapshot {
            data: self.data.read(),
        }))
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Read view holding the store's read lock
pub struct MemorySnapshot<'a> {
    data: RwLockReadGuard<'a, Table>,
}

impl StoreSnapshot for MemorySnapshot<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn scan(&self, range: &KeyRange) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let upper = match &range.end {
            Some(end) => Bound::Excluded(end.as_slice()),
            None => Bound::Unbounded,
        };
        if let Some(end) = &range.end {
            if end <= &range.start {
                return Ok(Vec::new());
            }
        }

        Ok(self
            .data
            .range::<[u8], _>((Bound::Included(range.start.as_slice()), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
