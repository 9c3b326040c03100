//! DurableStore: WAL-backed ordered store
//!
//! Every batch is appended to the WAL as one record before it is applied to
//! the in-memory table. On open, the WAL is replayed in order; a damaged tail
//! is truncated so a batch torn by a crash is dropped as a whole.
//!
//! ## Write Sequence
//!
//! ```text
//! 1. lock WAL
//! 2. append record (seq, batch)     <- durability point (per DurabilityMode)
//! 3. apply batch under table write lock
//! 4. unlock WAL
//! ```
//!
//! Holding the WAL lock across step 3 keeps apply order equal to log order.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use relaydb_core::{Error, OrderedStore, Result, StoreSnapshot, WriteBatch};

use crate::memory::{apply_batch, MemoryStore, Table};
use crate::wal::{
    decode_batch, encode_batch, DurabilityMode, WalConfig, WalReader, WalRecord, WalWriter,
};

struct WalState {
    writer: WalWriter,
    next_seq: u64,
}

/// Summary of the replay performed by [`DurableStore::open`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Batches replayed from the WAL
    pub batches_replayed: usize,
    /// Bytes cut from a damaged tail
    pub bytes_truncated: u64,
    /// Whole segments removed after a damaged tail
    pub segments_discarded: usize,
}

/// Ordered store persisted through a write-ahead log
pub struct DurableStore {
    table: MemoryStore,
    wal: Mutex<WalState>,
    wal_dir: PathBuf,
    recovery: RecoveryStats,
}

impl DurableStore {
    /// Open (or create) a store whose WAL lives in `wal_dir`
    ///
    /// In `DurabilityMode::Cache` no files are read or written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the WAL cannot be read or opened, and
    /// `Error::Corrupt` if a checksummed record holds an undecodable batch.
    pub fn open(wal_dir: &Path, durability: DurabilityMode, config: WalConfig) -> Result<Self> {
        let mut table = Table::new();
        let mut recovery = RecoveryStats::default();
        let mut next_seq = 1;

        if durability.requires_wal() {
            let result = WalReader::new().recover(wal_dir)?;

            for record in result.records {
                let batch = decode_batch(&record.batch).map_err(|e| {
                    Error::Corrupt(format!("WAL record {} holds a bad batch: {}", record.seq, e))
                })?;
                apply_batch(&mut table, batch);
                next_seq = record.seq + 1;
                recovery.batches_replayed += 1;
            }

            if let Some(tail) = &result.damaged {
                recovery.bytes_truncated = tail.dropped_bytes();
            }
            recovery.segments_discarded = result.discarded_segments.len();

            tracing::info!(
                wal_dir = %wal_dir.display(),
                batches = recovery.batches_replayed,
                keys = table.len(),
                "Recovered store from WAL"
            );
        }

        let writer = WalWriter::open(wal_dir.to_path_buf(), durability, config)?;

        Ok(Self {
            table: MemoryStore::from_table(table),
            wal: Mutex::new(WalState { writer, next_seq }),
            wal_dir: wal_dir.to_path_buf(),
            recovery,
        })
    }

    /// What the last open replayed
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery
    }

    /// Directory holding the WAL segments
    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }

    /// Durability mode of the underlying WAL writer
    pub fn durability(&self) -> DurabilityMode {
        self.wal.lock().writer.durability()
    }

    /// Sync if the Standard-mode interval has elapsed
    ///
    /// Meant to be driven by a periodic flusher. Returns `true` if a sync ran.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the sync fails.
    pub fn sync_if_overdue(&self) -> Result<bool> {
        Ok(self.wal.lock().writer.sync_if_overdue()?)
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl OrderedStore for DurableStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.table.get(key)
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        self.table.has(key)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        let record = WalRecord::new(wal.next_seq, encode_batch(&batch));
        wal.writer.append(&record)?;
        wal.next_seq += 1;

        tracing::trace!(seq = record.seq, ops = batch.len(), "Applying logged batch");
        self.table.apply(batch);
        Ok(())
    }

    fn snapshot(&self) -> Result<Box<dyn StoreSnapshot + '_>> {
        self.table.snapshot()
    }

    fn sync(&self) -> Result<()> {
        Ok(self.wal.lock().writer.flush()?)
    }
}
