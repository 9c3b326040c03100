//! relaydb - Indexed collection store
//!
//! relaydb keeps typed records in named collections over an ordered
//! key-value store, with single- and multi-valued secondary indexes that
//! stay exactly in sync with the records across insert, update and delete.
//!
//! # Quick Start
//!
//! ```
//! use relaydb::{Database, Record};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Order {
//!     hash: String,
//!     maker: String,
//!     tags: Vec<String>,
//! }
//!
//! impl Record for Order {
//!     fn primary_key(&self) -> Vec<u8> {
//!         self.hash.as_bytes().to_vec()
//!     }
//! }
//!
//! let db = Database::cache();
//! let orders = db.new_collection::<Order>("orders")?;
//! let maker = orders.add_index("maker", |o: &Order| o.maker.as_bytes().to_vec())?;
//! let tags = orders.add_multi_index("tags", |o: &Order| {
//!     o.tags.iter().map(|t| t.as_bytes().to_vec()).collect()
//! })?;
//!
//! orders.insert(&Order {
//!     hash: "0x01".into(),
//!     maker: "0xabc".into(),
//!     tags: vec!["erc20".into(), "weth".into()],
//! })?;
//!
//! assert_eq!(orders.find_with_value(&maker, "0xabc")?.len(), 1);
//! assert_eq!(orders.find_with_prefix(&tags, "w")?.len(), 1);
//! # Ok::<(), relaydb::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `relaydb-core`: errors, the `Record` trait, key codec, store traits
//! - `relaydb-storage`: in-memory and WAL-backed ordered stores
//! - `relaydb-engine`: `Database`, `Collection`, indexes and queries

pub use relaydb_core::{BatchOp, Error, KeyRange, OrderedStore, Record, Result, StoreSnapshot, WriteBatch};
pub use relaydb_engine::{
    AsIndex, Collection, Database, Descriptor, Index, IndexQuery, MultiIndex, RelayConfig,
};
pub use relaydb_storage::{DurabilityMode, DurableStore, MemoryStore, RecoveryStats, WalConfig};

/// Key layout of record rows and index entries
pub mod key {
    pub use relaydb_core::key::*;
}
