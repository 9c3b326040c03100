//! Database: store ownership, configuration and the collection registry
//!
//! A `Database` owns one ordered store and hands out typed
//! [`Collection`] handles over it. It is explicitly constructed:
//! - [`Database::open`]: durable, WAL-backed, configured by `relaydb.toml`
//! - [`Database::cache`]: ephemeral, in memory, no files
//! - [`Database::with_store`]: any caller-supplied [`OrderedStore`]
//!
//! Collections are reachable only from the `Database` that registered them.
//! After [`Database::close`], every operation through a surviving handle
//! fails with `Error::DatabaseClosed`.

pub mod config;

use std::any::Any;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use relaydb_core::{Error, OrderedStore, Record, Result};
use relaydb_storage::{DurabilityMode, DurableStore, MemoryStore, RecoveryStats};

use crate::collection::{Collection, CollectionInner};
use crate::index::validate_name;
use crate::locks::KeyLocks;

pub use config::{RelayConfig, CONFIG_FILE_NAME, DEFAULT_LOCK_STRIPES};

/// Lock file name placed in the database data directory.
pub const LOCK_FILE_NAME: &str = "LOCK";

/// WAL directory name inside the data directory.
pub const WAL_DIR_NAME: &str = "wal";

/// State shared between a database and every collection handle it issued
pub(crate) struct Shared {
    pub(crate) store: Arc<dyn OrderedStore>,
    pub(crate) locks: KeyLocks,
    /// `true` while the database accepts operations. Operations hold the
    /// read side for their whole duration so `close` waits for them.
    open: RwLock<bool>,
}

impl Shared {
    fn new(store: Arc<dyn OrderedStore>, lock_stripes: usize) -> Self {
        Self {
            store,
            locks: KeyLocks::new(lock_stripes),
            open: RwLock::new(true),
        }
    }

    /// Enter an operation, failing if the database is closed
    pub(crate) fn enter(&self) -> Result<RwLockReadGuard<'_, bool>> {
        let guard = self.open.read();
        if !*guard {
            return Err(Error::DatabaseClosed);
        }
        Ok(guard)
    }
}

/// An indexed collection store over one ordered key-value store
pub struct Database {
    shared: Arc<Shared>,

    /// Registered collections, type-erased `Arc<CollectionInner<T>>`
    collections: DashMap<String, Arc<dyn Any + Send + Sync>>,

    /// Configuration this database was opened with
    config: RelayConfig,

    /// Data directory (None for cache and custom-store databases)
    data_dir: Option<PathBuf>,

    /// The WAL-backed store, when there is one
    durable: Option<Arc<DurableStore>>,

    /// Shutdown signal for the background WAL flush thread
    flush_shutdown: Arc<AtomicBool>,

    /// Periodic `sync_if_overdue` driver (Standard durability only)
    flush_handle: Mutex<Option<JoinHandle<()>>>,

    /// Exclusive lock on the data directory, released on close
    lock_file: Option<File>,
}

impl Database {
    /// Open a durable database at `path`
    ///
    /// # Flow
    ///
    /// 1. Create the data directory if needed
    /// 2. Read or create `relaydb.toml`
    /// 3. Lock the directory, open the WAL and replay it
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid config file, `Error::Storage`
    /// if another process holds the directory, and `Error::Io` or
    /// `Error::Corrupt` if the WAL cannot be opened or replayed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use relaydb_engine::Database;
    ///
    /// let db = Database::open("/tmp/relay-data")?;
    /// db.close()?;
    /// # Ok::<(), relaydb_core::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        RelayConfig::write_default_if_missing(&config_path)?;
        let config = RelayConfig::from_file(&config_path)?;

        Self::open_at(data_dir, config)
    }

    /// Open a durable database at `path` with an explicit configuration
    ///
    /// The config is written to `relaydb.toml` so a later [`Database::open`]
    /// picks up the same settings.
    ///
    /// # Errors
    ///
    /// Same as [`Database::open`].
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        config.write_to_file(&data_dir.join(CONFIG_FILE_NAME))?;

        Self::open_at(data_dir, config)
    }

    fn open_at(data_dir: PathBuf, config: RelayConfig) -> Result<Self> {
        let durability = config.durability_mode()?;

        let lock_path = data_dir.join(LOCK_FILE_NAME);
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::Storage(format!("failed to open lock file: {}", e)))?;
        fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
            Error::Storage(format!(
                "database at '{}' is already in use by another process",
                data_dir.display()
            ))
        })?;

        let wal_dir = data_dir.join(WAL_DIR_NAME);
        let durable = Arc::new(DurableStore::open(
            &wal_dir,
            durability,
            config.wal_config(),
        )?);

        let flush_shutdown = Arc::new(AtomicBool::new(false));
        let flush_handle = match durability {
            DurabilityMode::Standard { interval_ms, .. } => Some(spawn_flusher(
                Arc::clone(&durable),
                Arc::clone(&flush_shutdown),
                Duration::from_millis(interval_ms),
            )?),
            _ => None,
        };

        let stats = durable.recovery_stats();
        info!(
            target: "relaydb::db",
            path = %data_dir.display(),
            durability = durability.as_str(),
            batches_replayed = stats.batches_replayed,
            bytes_truncated = stats.bytes_truncated,
            "Opened database"
        );

        let store: Arc<dyn OrderedStore> = Arc::clone(&durable) as Arc<dyn OrderedStore>;
        Ok(Self {
            shared: Arc::new(Shared::new(store, config.lock_stripes)),
            collections: DashMap::new(),
            config,
            data_dir: Some(data_dir),
            durable: Some(durable),
            flush_shutdown,
            flush_handle: Mutex::new(flush_handle),
            lock_file: Some(lock_file),
        })
    }

    /// Create an ephemeral database with no disk I/O
    ///
    /// All data is lost when the database is dropped.
    pub fn cache() -> Self {
        let config = RelayConfig {
            durability: "cache".to_string(),
            ..RelayConfig::default()
        };
        Self::from_store(Arc::new(MemoryStore::new()), config)
    }

    /// Create a database over a caller-supplied store
    ///
    /// Only `lock_stripes` is read from `config`; durability belongs to the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` is invalid.
    pub fn with_store(store: Arc<dyn OrderedStore>, config: RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_store(store, config))
    }

    fn from_store(store: Arc<dyn OrderedStore>, config: RelayConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(store, config.lock_stripes)),
            collections: DashMap::new(),
            config,
            data_dir: None,
            durable: None,
            flush_shutdown: Arc::new(AtomicBool::new(false)),
            flush_handle: Mutex::new(None),
            lock_file: None,
        }
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Register a new collection of `T` records under `name`
    ///
    /// Rows written by an earlier session under the same name are visible
    /// through the new handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::CollectionExists` if `name` is already registered on
    /// this database, and `Error::InvalidName` if `name` is empty or
    /// contains `:`.
    pub fn new_collection<T: Record>(&self, name: &str) -> Result<Collection<T>> {
        let _open = self.shared.enter()?;
        validate_name(name)?;

        match self.collections.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::CollectionExists(name.to_string())),
            Entry::Vacant(slot) => {
                let inner = Arc::new(CollectionInner::<T>::new(name, Arc::clone(&self.shared)));
                slot.insert(Arc::clone(&inner) as Arc<dyn Any + Send + Sync>);
                debug!(target: "relaydb::db", collection = name, "Registered collection");
                Ok(Collection::from_inner(inner))
            }
        }
    }

    /// Handle to a collection registered earlier on this database
    ///
    /// # Errors
    ///
    /// Returns `Error::CollectionNotFound` if no collection has this name and
    /// `Error::CollectionTypeMismatch` if it was registered for another type.
    pub fn collection<T: Record>(&self, name: &str) -> Result<Collection<T>> {
        let _open = self.shared.enter()?;
        let erased = self
            .collections
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;

        let inner = erased
            .downcast::<CollectionInner<T>>()
            .map_err(|_| Error::CollectionTypeMismatch {
                name: name.to_string(),
            })?;
        Ok(Collection::from_inner(inner))
    }

    /// Names of all registered collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Configuration this database was opened with
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Data directory, for databases opened from a path
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// What WAL replay recovered on open, for durable databases
    pub fn recovery_stats(&self) -> Option<RecoveryStats> {
        self.durable.as_ref().map(|d| d.recovery_stats().clone())
    }

    /// Whether the database still accepts operations
    pub fn is_open(&self) -> bool {
        *self.shared.open.read()
    }

    /// Flush the store to durable media
    ///
    /// # Errors
    ///
    /// Returns `Error::DatabaseClosed` after close, or the store's error.
    pub fn sync(&self) -> Result<()> {
        let _open = self.shared.enter()?;
        self.shared.store.sync()
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Close the database
    ///
    /// Waits for in-flight operations, stops accepting new ones, syncs the
    /// store and releases the directory lock.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the final sync fails. The database is
    /// closed either way.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        {
            let mut open = self.shared.open.write();
            if !*open {
                return Ok(());
            }
            *open = false;
        }

        self.flush_shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.flush_handle.lock().take() {
            let _ = handle.join();
        }

        let result = self.shared.store.sync();
        self.lock_file = None;

        info!(
            target: "relaydb::db",
            collections = self.collections.len(),
            "Closed database"
        );
        result
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(target: "relaydb::db", error = %e, "Final sync failed while dropping database");
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("data_dir", &self.data_dir)
            .field("durability", &self.config.durability)
            .field("lock_stripes", &self.shared.locks.len())
            .field("collections", &self.collection_names())
            .finish()
    }
}

fn spawn_flusher(
    store: Arc<DurableStore>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("relaydb-wal-flush".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = store.sync_if_overdue() {
                    warn!(target: "relaydb::db", error = %e, "Background WAL sync failed");
                }
            }
        })
        .map_err(|e| Error::Storage(format!("failed to spawn WAL flush thread: {}", e)))
}
