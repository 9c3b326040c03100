//! Storage layer for relaydb
//!
//! This crate implements the ordered key-value backends:
//! - MemoryStore: BTreeMap-based storage with RwLock, no persistence
//! - DurableStore: MemoryStore plus a write-ahead log with crash recovery
//! - WAL: segment files, CRC-framed records, batch codec, durability modes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durable;
pub mod memory;
pub mod wal;

pub use durable::{DurableStore, RecoveryStats};
pub use memory::{MemorySnapshot, MemoryStore};
pub use wal::{DurabilityMode, WalConfig};
