//! Integration tests for collections and their secondary indexes.
//!
//! Unit tests in the crates cover the key codec, WAL encoding and the
//! store implementations in isolation. These suites exercise the public
//! API end to end: mutations keeping entries in sync, the three query
//! shapes, concurrent writers, and recovery after reopen or a torn WAL.

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod errors;
mod recovery;
