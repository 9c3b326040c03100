//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

pub use relaydb::{
    Collection, Database, Error, Index, IndexQuery, MultiIndex, Record, RelayConfig,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route library logs to the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        if std::env::var_os("RUST_LOG").is_some() {
            let _ = tracing_subscriber::fmt()
                .with_test_writer()
                .try_init();
        }
    });
}

// ============================================================================
// Records
// ============================================================================

/// Test record keyed by name, with a single-valued and a multi-valued field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub age: u32,
    pub nicknames: Vec<String>,
}

impl Record for Person {
    fn primary_key(&self) -> Vec<u8> {
        self.name.as_bytes().to_vec()
    }
}

pub fn person(name: &str, age: u32) -> Person {
    Person {
        name: name.to_string(),
        age,
        nicknames: Vec::new(),
    }
}

pub fn person_with_nicknames(name: &str, age: u32, nicknames: &[&str]) -> Person {
    Person {
        name: name.to_string(),
        age,
        nicknames: nicknames.iter().map(|n| n.to_string()).collect(),
    }
}

/// Decimal rendering of the age, as the "age" index stores it.
pub fn age_value(p: &Person) -> Vec<u8> {
    p.age.to_string().into_bytes()
}

pub fn nickname_values(p: &Person) -> Vec<Vec<u8>> {
    p.nicknames.iter().map(|n| n.as_bytes().to_vec()).collect()
}

/// Register "people" with an "age" index.
pub fn people_with_age(db: &Database) -> (Collection<Person>, Index<Person>) {
    let people = db.new_collection::<Person>("people").unwrap();
    let age = people.add_index("age", age_value).unwrap();
    (people, age)
}

/// Register "people" with a "nicknames" multi-index.
pub fn people_with_nicknames(db: &Database) -> (Collection<Person>, MultiIndex<Person>) {
    let people = db.new_collection::<Person>("people").unwrap();
    let nicknames = people
        .add_multi_index("nicknames", nickname_values)
        .unwrap();
    (people, nicknames)
}

// ============================================================================
// TestDb - durable database in a temp directory
// ============================================================================

/// Create a RelayConfig with always durability mode.
pub fn always_config() -> RelayConfig {
    RelayConfig {
        durability: "always".to_string(),
        ..RelayConfig::default()
    }
}

/// Durable test database that can be closed and reopened in place.
pub struct TestDb {
    pub db: Option<Database>,
    pub dir: TempDir,
}

impl TestDb {
    /// Open with `always` durability so every batch is on disk.
    pub fn new_strict() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open_with_config(dir.path(), always_config())
            .expect("Failed to create test database");
        TestDb { db: Some(db), dir }
    }

    /// Open with the default (standard) durability.
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open(dir.path()).expect("Failed to create test database");
        TestDb { db: Some(db), dir }
    }

    pub fn db(&self) -> &Database {
        self.db.as_ref().expect("database is closed")
    }

    /// Close the database, leaving files in place.
    pub fn close(&mut self) {
        if let Some(db) = self.db.take() {
            db.close().expect("close failed");
        }
    }

    /// Close and reopen from disk.
    pub fn reopen(&mut self) {
        self.close();
        self.db = Some(Database::open(self.dir.path()).expect("Failed to reopen database"));
    }

    /// Reopen, returning the error instead of panicking.
    pub fn try_reopen(&mut self) -> relaydb::Result<()> {
        self.close();
        self.db = Some(Database::open(self.dir.path())?);
        Ok(())
    }

    pub fn wal_dir(&self) -> PathBuf {
        self.dir.path().join("wal")
    }

    /// Path of the first WAL segment.
    pub fn wal_path(&self) -> PathBuf {
        self.wal_dir().join("wal-000001.seg")
    }
}

// ============================================================================
// File manipulation
// ============================================================================

pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn truncate_file(path: &Path, len: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}

pub fn append_bytes(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

pub fn corrupt_file_at_offset(path: &Path, offset: u64, bytes: &[u8]) {
    let mut data = fs::read(path).unwrap();
    for (i, b) in bytes.iter().enumerate() {
        let at = offset as usize + i;
        if at < data.len() {
            data[at] = *b;
        }
    }
    fs::write(path, data).unwrap();
}

// ============================================================================
// Assertions
// ============================================================================

/// Names of the given records, in order.
pub fn names(records: &[Person]) -> Vec<String> {
    records.iter().map(|p| p.name.clone()).collect()
}
