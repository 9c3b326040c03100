//! How eagerly committed batches reach disk

/// Sync policy of a store
///
/// `Cache` keeps nothing on disk and loses everything when the process
/// exits. `Always` fsyncs each batch before the write returns. `Standard`
/// groups fsyncs, so a crash can lose up to `interval_ms` or `batch_size`
/// batches, whichever bound is reached first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// No log at all
    Cache,
    /// fsync per batch
    Always,
    /// Grouped fsync
    Standard {
        /// Longest gap between fsyncs
        interval_ms: u64,
        /// Most batches written between fsyncs
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Whether batches are logged at all
    pub fn requires_wal(&self) -> bool {
        *self != DurabilityMode::Cache
    }

    /// Name used for this mode in `relaydb.toml`
    pub fn as_str(&self) -> &'static str {
        match self {
            DurabilityMode::Cache => "cache",
            DurabilityMode::Always => "always",
            DurabilityMode::Standard { .. } => "standard",
        }
    }

    /// Grouped fsync every 100ms or 1000 batches
    pub fn standard_default() -> Self {
        DurabilityMode::Standard {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::standard_default()
    }
}
