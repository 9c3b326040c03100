//! Core traits for storage and snapshot abstraction
//!
//! This module defines the OrderedStore and StoreSnapshot traits that the
//! collection layer is written against, plus the WriteBatch every mutation
//! is expressed as.

use crate::error::Result;
use crate::key::KeyRange;

/// A single mutation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Create or overwrite a key
    Put {
        /// Store key
        key: Vec<u8>,
        /// Stored bytes
        value: Vec<u8>,
    },
    /// Remove a key (no-op if absent)
    Delete {
        /// Store key
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Key touched by this op
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } => key,
            BatchOp::Delete { key } => key,
        }
    }
}

/// Ordered list of puts and deletes applied as one atomic unit
///
/// Ops are applied in insertion order, so a later op on the same key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        WriteBatch { ops: Vec::new() }
    }

    /// Create a batch with room for `capacity` ops
    pub fn with_capacity(capacity: usize) -> Self {
        WriteBatch {
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Queue a put
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    /// Queue a delete
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    /// Ops in application order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume the batch, yielding its ops
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Get number of ops
    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

impl From<Vec<BatchOp>> for WriteBatch {
    fn from(ops: Vec<BatchOp>) -> Self {
        WriteBatch { ops }
    }
}

/// Ordered, byte-keyed store with atomic batch writes
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait OrderedStore: Send + Sync {
    /// Get the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Check whether `key` is present
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply every op in `batch` atomically
    ///
    /// Either the whole batch becomes visible or none of it does. Readers
    /// never observe a partially applied batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be made durable; the store
    /// is left unchanged.
    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Consistent read view of the store
    ///
    /// No batch is applied while the returned snapshot is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn snapshot(&self) -> Result<Box<dyn StoreSnapshot + '_>>;

    /// Flush buffered writes to durable media
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn sync(&self) -> Result<()>;
}

/// Point-in-time read view returned by [`OrderedStore::snapshot`]
pub trait StoreSnapshot {
    /// Get the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries inside `range`, in ascending key order
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan(&self, range: &KeyRange) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}
