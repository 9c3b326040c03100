//! Appends framed records to the active segment and applies the sync policy

use super::format::{WalRecord, WalSegment, SEGMENT_HEADER_SIZE};
use super::reader::list_segments;
use super::DurabilityMode;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

/// Segment sizing for [`WalWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalConfig {
    /// Roll to a new segment before an append would grow the active one
    /// past this many bytes. A segment always takes at least one record.
    pub segment_size: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            segment_size: 64 * 1024 * 1024,
        }
    }
}

impl WalConfig {
    /// Override the roll threshold
    pub fn with_segment_size(self, segment_size: u64) -> Self {
        WalConfig { segment_size }
    }
}

/// Records written since the last fsync
#[derive(Debug)]
struct SyncState {
    pending: usize,
    since: Instant,
}

impl SyncState {
    fn clean() -> Self {
        SyncState {
            pending: 0,
            since: Instant::now(),
        }
    }

    fn is_dirty(&self) -> bool {
        self.pending > 0
    }
}

/// Single appender over the segment files of one directory
///
/// `Cache` never opens a segment and drops every append. `Always` fsyncs
/// each record before returning. `Standard` fsyncs after `batch_size`
/// records, or when [`WalWriter::sync_if_overdue`] finds `interval_ms`
/// has passed.
pub struct WalWriter {
    dir: PathBuf,
    mode: DurabilityMode,
    config: WalConfig,
    active: Option<WalSegment>,
    sync: SyncState,
}

impl WalWriter {
    /// Resume the newest segment in `wal_dir`, or start segment 1
    ///
    /// Any torn tail must already have been cut by recovery.
    pub fn open(wal_dir: PathBuf, durability: DurabilityMode, config: WalConfig) -> io::Result<Self> {
        let active = if durability.requires_wal() {
            std::fs::create_dir_all(&wal_dir)?;
            Some(match list_segments(&wal_dir)?.last() {
                Some(&newest) => WalSegment::open_append(&wal_dir, newest)?,
                None => WalSegment::create(&wal_dir, 1)?,
            })
        } else {
            None
        };

        Ok(WalWriter {
            dir: wal_dir,
            mode: durability,
            config,
            active,
            sync: SyncState::clean(),
        })
    }

    /// Log one record according to the durability mode
    ///
    /// On error no part of the record is left in the segment.
    pub fn append(&mut self, record: &WalRecord) -> io::Result<()> {
        if !self.mode.requires_wal() {
            return Ok(());
        }

        let frame = record.to_bytes();
        if self.should_roll(frame.len() as u64) {
            self.roll()?;
        }

        let segment = self.segment_mut()?;
        let start = segment.size();
        if let Err(e) = segment.write(&frame) {
            let _ = segment.truncate(start);
            return Err(e);
        }
        self.sync.pending += 1;

        match self.mode {
            DurabilityMode::Always => {
                if let Err(e) = self.flush() {
                    // A write reported as failed must not come back on replay
                    let _ = self.segment_mut()?.truncate(start);
                    return Err(e);
                }
            }
            DurabilityMode::Standard { batch_size, .. } if self.sync.pending >= batch_size => {
                self.flush()?;
            }
            _ => {}
        }
        Ok(())
    }

    fn should_roll(&self, incoming: u64) -> bool {
        match &self.active {
            None => true,
            Some(segment) => {
                let used = segment.size();
                used > SEGMENT_HEADER_SIZE as u64 && used + incoming > self.config.segment_size
            }
        }
    }

    fn segment_mut(&mut self) -> io::Result<&mut WalSegment> {
        self.active
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no active WAL segment"))
    }

    fn roll(&mut self) -> io::Result<()> {
        let next = match self.active.as_mut() {
            None => 1,
            Some(segment) => {
                segment.close()?;
                segment.segment_number() + 1
            }
        };
        self.active = Some(WalSegment::create(&self.dir, next)?);
        self.sync = SyncState::clean();
        tracing::debug!(segment = next, "Rolled to new WAL segment");
        Ok(())
    }

    /// fsync now, whatever the mode
    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(segment) = self.active.as_mut() {
            segment.sync()?;
        }
        self.sync = SyncState::clean();
        Ok(())
    }

    /// In `Standard` mode, fsync when records are pending and the interval
    /// has run out. Reports whether it synced.
    pub fn sync_if_overdue(&mut self) -> io::Result<bool> {
        let DurabilityMode::Standard { interval_ms, .. } = self.mode else {
            return Ok(false);
        };
        if !self.sync.is_dirty() || self.sync.since.elapsed().as_millis() < u128::from(interval_ms) {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Active segment number, 0 when nothing is logged
    pub fn current_segment(&self) -> u64 {
        self.active.as_ref().map_or(0, WalSegment::segment_number)
    }

    /// Mode given to [`WalWriter::open`]
    pub fn durability(&self) -> DurabilityMode {
        self.mode
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.sync.is_dirty() {
            let _ = self.flush();
        }
    }
}
