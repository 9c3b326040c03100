//! The single error type shared by every relaydb crate
//!
//! Storage, WAL and codec failures are all folded into [`Error`] so callers
//! match on one enum.

use std::io;
use thiserror::Error;

/// Result type alias for relaydb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for relaydb
#[derive(Debug, Error)]
pub enum Error {
    /// A collection with this name is already registered on the database
    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    /// No collection with this name is registered on the database
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The collection exists but was registered with a different record type
    #[error("Collection {name} was registered with a different record type")]
    CollectionTypeMismatch {
        /// Collection name
        name: String,
    },

    /// An index with this name is already registered on the collection
    #[error("Index {index} already exists on collection {collection}")]
    IndexExists {
        /// Collection name
        collection: String,
        /// Index name
        index: String,
    },

    /// Indexes cannot be added once the collection has been written to
    #[error("Cannot add index {index} to collection {collection} after the first write")]
    IndexesFrozen {
        /// Collection name
        collection: String,
        /// Index name
        index: String,
    },

    /// The index handle was not registered on the collection it was used with
    #[error("Index {index} is not registered on collection {collection}")]
    UnknownIndex {
        /// Collection name
        collection: String,
        /// Index name
        index: String,
    },

    /// Collection and index names must be non-empty and free of `:`
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Insert of a primary key that already has a row
    #[error("Record already exists in {collection}: {key}")]
    AlreadyExists {
        /// Collection name
        collection: String,
        /// Primary key (lossy UTF-8)
        key: String,
    },

    /// Update, delete or lookup of a primary key with no row
    #[error("Record not found in {collection}: {key}")]
    NotFound {
        /// Collection name
        collection: String,
        /// Primary key (lossy UTF-8)
        key: String,
    },

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corrupt(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The owning database has been closed
    #[error("Database is closed")]
    DatabaseClosed,
}

impl Error {
    /// Build an `AlreadyExists` error from a raw primary key
    pub fn already_exists(collection: &str, key: &[u8]) -> Self {
        Error::AlreadyExists {
            collection: collection.to_string(),
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    /// Build a `NotFound` error from a raw primary key
    pub fn not_found(collection: &str, key: &[u8]) -> Self {
        Error::NotFound {
            collection: collection.to_string(),
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    /// True for failures of the underlying store (`Storage` or `Io`)
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
