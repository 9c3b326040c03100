//! Write-Ahead Log (WAL) module.
//!
//! - **Segment-based storage**: WAL is split into segments (`wal-NNNNNN.seg`)
//! - **Self-delimiting records**: each record has a length prefix and CRC32 checksum
//! - **One batch per record**: a record is the unit of atomicity on recovery
//! - **Durability modes**: Cache, Standard, Always
//!
//! ```text
//! wal/
//! ├── wal-000001.seg   (closed, immutable)
//! └── wal-000002.seg   (active, writable)
//! ```

pub mod batch;
pub mod format;
mod mode;
pub mod reader;
pub mod writer;

pub use batch::{decode_batch, encode_batch};
pub use format::{WalRecord, WalRecordError, WalSegment};
pub use mode::DurabilityMode;
pub use reader::{DamagedTail, StopReason, WalReadResult, WalReader};
pub use writer::{WalConfig, WalWriter};
