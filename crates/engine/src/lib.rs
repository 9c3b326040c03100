//! Indexed collection engine for relaydb
//!
//! This crate layers typed collections and secondary indexes over an
//! ordered key-value store:
//! - Database: store ownership, `relaydb.toml`, lock file, collection registry
//! - Collection: insert/update/delete kept in sync with index entries
//! - Index / MultiIndex: single- and multi-valued descriptors
//! - IndexQuery: exact, range and prefix queries over index values
//!
//! # Example
//!
//! ```
//! use relaydb_core::Record;
//! use relaydb_engine::Database;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Record for Person {
//!     fn primary_key(&self) -> Vec<u8> {
//!         self.name.as_bytes().to_vec()
//!     }
//! }
//!
//! let db = Database::cache();
//! let people = db.new_collection::<Person>("people")?;
//! let age = people.add_index("age", |p: &Person| p.age.to_string().into_bytes())?;
//!
//! people.insert(&Person { name: "foo".into(), age: 42 })?;
//! assert_eq!(people.find_with_value(&age, "42")?.len(), 1);
//! # Ok::<(), relaydb_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod database;
pub mod index;
mod locks;
pub mod query;

pub use collection::Collection;
pub use database::{Database, RelayConfig};
pub use index::{AsIndex, Descriptor, Index, MultiIndex};
pub use query::IndexQuery;
