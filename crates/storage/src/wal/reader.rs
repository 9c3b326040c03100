//! Replays segments in order and repairs a damaged tail
//!
//! Replay halts at the first record that is cut short or fails its CRC.
//! Everything after that point, later segments included, is dropped: later
//! batches were built on state containing the lost one.

use super::format::{WalRecord, WalRecordError, WalSegment};
use std::io;
use std::path::Path;

/// Segment numbers present in `wal_dir`, smallest first
///
/// A missing directory has no segments. Files not named `wal-NNNNNN.seg`
/// are ignored.
pub fn list_segments(wal_dir: &Path) -> io::Result<Vec<u64>> {
    if !wal_dir.exists() {
        return Ok(Vec::new());
    }

    let mut numbers = std::fs::read_dir(wal_dir)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<io::Result<Vec<_>>>()?
        .into_iter()
        .filter_map(|name| {
            name.to_str()?
                .strip_prefix("wal-")?
                .strip_suffix(".seg")?
                .parse::<u64>()
                .ok()
        })
        .collect::<Vec<_>>();
    numbers.sort_unstable();
    Ok(numbers)
}

/// Where and why replay halted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every byte parsed
    Clean,
    /// The last record is cut short, the usual result of a crash mid-append
    TornRecord,
    /// A complete record failed validation
    BadRecord {
        /// Offset of the record from the end of the header
        offset: usize,
        /// Parser message
        detail: String,
    },
}

/// The segment holding the first damaged byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamagedTail {
    /// Segment number
    pub segment: u64,
    /// File length once the damage is cut away
    pub valid_len: u64,
    /// File length as found
    pub file_len: u64,
}

impl DamagedTail {
    /// Bytes removed by the repair
    pub fn dropped_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}

/// Outcome of a replay
#[derive(Debug)]
pub struct WalReadResult {
    /// Intact records in log order
    pub records: Vec<WalRecord>,
    /// Set when replay halted before the end of the log
    pub damaged: Option<DamagedTail>,
    /// Segments after the damaged one
    pub discarded_segments: Vec<u64>,
    /// Why replay halted
    pub stop: StopReason,
}

/// Stateless segment replayer
#[derive(Debug, Default, Clone, Copy)]
pub struct WalReader;

impl WalReader {
    /// New reader
    pub fn new() -> Self {
        WalReader
    }

    /// Parse one segment up to its first damaged record
    ///
    /// Also returns the file length covering only intact records.
    pub fn read_segment(&self, segment: &mut WalSegment) -> io::Result<(Vec<WalRecord>, u64, StopReason)> {
        let body = segment.read_body()?;
        let body_start = segment.size() - body.len() as u64;

        let mut parsed = Vec::new();
        let mut rest: &[u8] = &body;
        let stop = loop {
            if rest.is_empty() {
                break StopReason::Clean;
            }
            match WalRecord::from_bytes(rest) {
                Ok((record, used)) => {
                    parsed.push(record);
                    rest = &rest[used..];
                }
                Err(WalRecordError::InsufficientData) => break StopReason::TornRecord,
                Err(e) => {
                    break StopReason::BadRecord {
                        offset: body.len() - rest.len(),
                        detail: e.to_string(),
                    }
                }
            }
        };

        let intact = (body.len() - rest.len()) as u64;
        Ok((parsed, body_start + intact, stop))
    }

    /// Replay `wal_dir` without modifying it
    pub fn read_all(&self, wal_dir: &Path) -> io::Result<WalReadResult> {
        let numbers = list_segments(wal_dir)?;
        let mut result = WalReadResult {
            records: Vec::new(),
            damaged: None,
            discarded_segments: Vec::new(),
            stop: StopReason::Clean,
        };

        for (position, &number) in numbers.iter().enumerate() {
            let mut segment = WalSegment::open_read(wal_dir, number)?;
            let (records, valid_len, stop) = self.read_segment(&mut segment)?;
            result.records.extend(records);

            if stop != StopReason::Clean {
                result.damaged = Some(DamagedTail {
                    segment: number,
                    valid_len,
                    file_len: segment.size(),
                });
                result.discarded_segments = numbers[position + 1..].to_vec();
                result.stop = stop;
                break;
            }
        }
        Ok(result)
    }

    /// Replay `wal_dir`, then cut the damaged segment back to its last
    /// intact record and delete the segments after it
    pub fn recover(&self, wal_dir: &Path) -> io::Result<WalReadResult> {
        let result = self.read_all(wal_dir)?;

        if let Some(tail) = &result.damaged {
            tracing::warn!(
                segment = tail.segment,
                valid_len = tail.valid_len,
                dropped_bytes = tail.dropped_bytes(),
                stop = ?result.stop,
                "Cutting damaged WAL tail"
            );
            WalSegment::open_append(wal_dir, tail.segment)?.truncate(tail.valid_len)?;
        }
        for &number in &result.discarded_segments {
            tracing::warn!(segment = number, "Deleting WAL segment past damaged tail");
            std::fs::remove_file(WalSegment::segment_path(wal_dir, number))?;
        }

        Ok(result)
    }
}
