//! Core types and traits for relaydb
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: Error type hierarchy
//! - Record: Capability trait implemented by stored types
//! - Key codec: Order-preserving layout of row and index entry keys
//! - Traits: OrderedStore, StoreSnapshot and the WriteBatch they accept

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;
pub mod record;
pub mod traits;

pub use error::{Error, Result};
pub use key::KeyRange;
pub use record::Record;
pub use traits::{BatchOp, OrderedStore, StoreSnapshot, WriteBatch};
