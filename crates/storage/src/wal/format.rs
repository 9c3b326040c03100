//! On-disk layout of WAL segments and the records inside them
//!
//! Segment files are called `wal-NNNNNN.seg`, numbered from 1 with six
//! digits of zero padding. Each starts with a fixed header followed by a
//! run of self-delimiting records:
//!
//! ```text
//! header (32 bytes)
//!   magic "RLDB" | version u32 | segment number u64 | 16 reserved zero bytes
//!
//! record
//!   len u32 | version u8 | seq u64 | batch bytes ... | crc32 u32
//! ```
//!
//! All integers are little endian. `len` counts every byte after itself, and
//! the CRC covers version, seq and batch. A record carries exactly one write
//! batch, so a torn record loses the whole batch and nothing else.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

/// Leading bytes of every segment file
pub const SEGMENT_MAGIC: [u8; 4] = *b"RLDB";

/// Segment header version written by this build
pub const SEGMENT_FORMAT_VERSION: u32 = 1;

/// Bytes occupied by the segment header
pub const SEGMENT_HEADER_SIZE: usize = 32;

/// Record version written by this build
pub const WAL_RECORD_FORMAT_VERSION: u8 = 1;

const LEN_FIELD: usize = 4;
const CRC_FIELD: usize = 4;

// version + seq + crc; the batch may be empty
const MIN_RECORD_LEN: usize = 1 + 8 + CRC_FIELD;

/// Decoded segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Should equal [`SEGMENT_MAGIC`]
    pub magic: [u8; 4],
    /// Should equal [`SEGMENT_FORMAT_VERSION`]
    pub format_version: u32,
    /// Must match the number in the file name
    pub segment_number: u64,
}

impl SegmentHeader {
    /// Header for a fresh segment
    pub fn new(segment_number: u64) -> Self {
        SegmentHeader {
            magic: SEGMENT_MAGIC,
            format_version: SEGMENT_FORMAT_VERSION,
            segment_number,
        }
    }

    /// Encode into the fixed header block
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut block = [0u8; SEGMENT_HEADER_SIZE];
        block[..4].copy_from_slice(&self.magic);
        LittleEndian::write_u32(&mut block[4..8], self.format_version);
        LittleEndian::write_u64(&mut block[8..16], self.segment_number);
        block
    }

    /// Decode a header block without validating it
    pub fn from_bytes(block: &[u8; SEGMENT_HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&block[..4]);
        SegmentHeader {
            magic,
            format_version: LittleEndian::read_u32(&block[4..8]),
            segment_number: LittleEndian::read_u64(&block[8..16]),
        }
    }

    /// Magic and version are both recognised
    pub fn is_valid(&self) -> bool {
        self.magic == SEGMENT_MAGIC && self.format_version == SEGMENT_FORMAT_VERSION
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Handle on one segment file
///
/// A segment opened with [`WalSegment::open_read`] or closed through
/// [`WalSegment::close`] refuses further writes and truncation.
pub struct WalSegment {
    file: File,
    number: u64,
    len: u64,
    sealed: bool,
}

impl WalSegment {
    /// Location of segment `number` inside `dir`
    pub fn segment_path(dir: &Path, number: u64) -> PathBuf {
        dir.join(format!("wal-{number:06}.seg"))
    }

    /// Create segment `number` and write its header; fails if it exists
    pub fn create(dir: &Path, number: u64) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(Self::segment_path(dir, number))?;
        file.write_all(&SegmentHeader::new(number).to_bytes())?;

        Ok(WalSegment {
            file,
            number,
            len: SEGMENT_HEADER_SIZE as u64,
            sealed: false,
        })
    }

    /// Open an existing segment read-only
    pub fn open_read(dir: &Path, number: u64) -> io::Result<Self> {
        let file = File::open(Self::segment_path(dir, number))?;
        Self::attach(file, number, true)
    }

    /// Open an existing segment positioned at its end for appending
    pub fn open_append(dir: &Path, number: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(Self::segment_path(dir, number))?;
        Self::attach(file, number, false)
    }

    fn attach(mut file: File, number: u64, sealed: bool) -> io::Result<Self> {
        let mut block = [0u8; SEGMENT_HEADER_SIZE];
        file.read_exact(&mut block)?;

        let header = SegmentHeader::from_bytes(&block);
        if !header.is_valid() {
            return Err(invalid_data(format!(
                "segment {number} has an unrecognised header"
            )));
        }
        if header.segment_number != number {
            return Err(invalid_data(format!(
                "segment file {number} claims to be segment {}",
                header.segment_number
            )));
        }

        let len = file.seek(SeekFrom::End(0))?;
        Ok(WalSegment {
            file,
            number,
            len,
            sealed,
        })
    }

    /// Number from the file name
    pub fn segment_number(&self) -> u64 {
        self.number
    }

    /// Bytes in the file, header included
    pub fn size(&self) -> u64 {
        self.len
    }

    /// Whether writes are refused
    pub fn is_closed(&self) -> bool {
        self.sealed
    }

    fn ensure_writable(&self, action: &str) -> io::Result<()> {
        if self.sealed {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot {action} sealed segment {}", self.number),
            ));
        }
        Ok(())
    }

    /// Append raw bytes at the end of the segment
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.ensure_writable("write to")?;
        self.file.write_all(data)?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// fdatasync the segment
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// Flush everything to disk and refuse further writes
    pub fn close(&mut self) -> io::Result<()> {
        if self.sealed {
            return Ok(());
        }
        self.file.sync_all()?;
        self.sealed = true;
        Ok(())
    }

    /// Every byte after the header
    pub fn read_body(&mut self) -> io::Result<Vec<u8>> {
        let body_len = self.len.saturating_sub(SEGMENT_HEADER_SIZE as u64);
        let mut body = Vec::with_capacity(body_len as usize);
        self.file.seek(SeekFrom::Start(SEGMENT_HEADER_SIZE as u64))?;
        self.file.read_to_end(&mut body)?;
        self.file.seek(SeekFrom::Start(self.len))?;
        Ok(body)
    }

    /// Cut the file back to `position` bytes, dropping a damaged tail
    pub fn truncate(&mut self, position: u64) -> io::Result<()> {
        self.ensure_writable("truncate")?;
        self.file.set_len(position)?;
        self.file.sync_all()?;
        self.file.seek(SeekFrom::Start(position))?;
        self.len = position;
        Ok(())
    }
}

/// One committed write batch as logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Position of the batch in commit order
    pub seq: u64,
    /// Batch encoded by [`super::batch::encode_batch`]
    pub batch: Vec<u8>,
}

impl WalRecord {
    /// Wrap an encoded batch
    pub fn new(seq: u64, batch: Vec<u8>) -> Self {
        WalRecord { seq, batch }
    }

    /// Frame the record with its length prefix and checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len = 1 + 8 + self.batch.len();
        let mut out = Vec::with_capacity(LEN_FIELD + body_len + CRC_FIELD);

        out.extend_from_slice(&((body_len + CRC_FIELD) as u32).to_le_bytes());
        out.push(WAL_RECORD_FORMAT_VERSION);
        out.extend_from_slice(&self.seq.to_le_bytes());
        out.extend_from_slice(&self.batch);

        let crc = crc32fast::hash(&out[LEN_FIELD..]);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parse the record at the start of `bytes`
    ///
    /// On success also returns how many bytes the record spans, so callers
    /// can step to the next one. A truncated frame reports
    /// [`WalRecordError::InsufficientData`].
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), WalRecordError> {
        let mut cursor = Cursor::new(bytes);
        let len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| WalRecordError::InsufficientData)? as usize;
        if len < MIN_RECORD_LEN {
            return Err(WalRecordError::InvalidFormat);
        }

        let frame_len = LEN_FIELD + len;
        let frame = bytes
            .get(..frame_len)
            .ok_or(WalRecordError::InsufficientData)?;
        let (body, crc_bytes) = frame[LEN_FIELD..].split_at(len - CRC_FIELD);

        let mut crc_reader = crc_bytes;
        let stored = crc_reader
            .read_u32::<LittleEndian>()
            .map_err(|_| WalRecordError::InsufficientData)?;
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(WalRecordError::ChecksumMismatch {
                expected: stored,
                computed,
            });
        }

        let mut body_reader = body;
        let version = body_reader
            .read_u8()
            .map_err(|_| WalRecordError::InvalidFormat)?;
        if version != WAL_RECORD_FORMAT_VERSION {
            return Err(WalRecordError::UnsupportedVersion(version));
        }
        let seq = body_reader
            .read_u64::<LittleEndian>()
            .map_err(|_| WalRecordError::InvalidFormat)?;

        Ok((
            WalRecord {
                seq,
                batch: body_reader.to_vec(),
            },
            frame_len,
        ))
    }
}

/// Why bytes could not be parsed as a record or batch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalRecordError {
    /// The input ends before the frame does
    #[error("record truncated")]
    InsufficientData,

    /// The frame is structurally impossible
    #[error("malformed record")]
    InvalidFormat,

    /// Stored and recomputed CRC differ
    #[error("record crc {expected:08x} does not match contents ({computed:08x})")]
    ChecksumMismatch {
        /// CRC found in the record
        expected: u32,
        /// CRC of the bytes actually read
        computed: u32,
    },

    /// Written by a newer format
    #[error("record version {0} is not supported")]
    UnsupportedVersion(u8),
}
