//! Striped per-key mutation locks
//!
//! Mutations of the same (collection, primary key) must not interleave
//! their read-check-write sequences. Rather than one mutex per key, a fixed
//! array of mutexes is indexed by an `xxh3` hash of the pair. Two distinct
//! keys may share a stripe and serialize needlessly, but never deadlock: a
//! mutation holds at most one stripe at a time.

use parking_lot::{Mutex, MutexGuard};
use xxhash_rust::xxh3::Xxh3;

/// Fixed set of mutexes keyed by hash of (collection, primary key)
pub(crate) struct KeyLocks {
    stripes: Box<[Mutex<()>]>,
}

impl KeyLocks {
    /// Create `count` stripes (at least one)
    pub(crate) fn new(count: usize) -> Self {
        let stripes = (0..count.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    /// Block until the stripe owning the key is free
    pub(crate) fn lock(&self, collection: &str, primary_key: &[u8]) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe(collection, primary_key)].lock()
    }

    fn stripe(&self, collection: &str, primary_key: &[u8]) -> usize {
        let mut hasher = Xxh3::new();
        hasher.update(collection.as_bytes());
        // Length-delimit so ("ab", "c") and ("a", "bc") hash apart
        hasher.update(&(collection.len() as u64).to_le_bytes());
        hasher.update(primary_key);
        (hasher.digest() % self.stripes.len() as u64) as usize
    }

    pub(crate) fn len(&self) -> usize {
        self.stripes.len()
    }
}
