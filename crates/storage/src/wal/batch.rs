//! Write batch serialization format.
//!
//! ```text
//! Batch Layout:
//! ┌──────────────────┬──────────────────────────────────────────────┐
//! │ Count (4 bytes)  │ Ops (variable)                               │
//! └──────────────────┴──────────────────────────────────────────────┘
//!
//! Op Layout:
//! ┌────────────┬────────────────┬───────┬──────────────────┬─────────┐
//! │ Tag (1)    │ Key len (4)    │ Key   │ Value len (4)    │ Value   │
//! └────────────┴────────────────┴───────┴──────────────────┴─────────┘
//! ```
//!
//! Value fields are present only for puts. All integers are little endian.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use relaydb_core::{BatchOp, WriteBatch};

use super::format::WalRecordError;

const OP_PUT: u8 = 0x01;
const OP_DELETE: u8 = 0x02;

/// Serialize a batch to bytes.
pub fn encode_batch(batch: &WriteBatch) -> Vec<u8> {
    let mut bytes = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_batch(&mut bytes, batch);
    bytes
}

fn write_batch(bytes: &mut Vec<u8>, batch: &WriteBatch) -> std::io::Result<()> {
    bytes.write_u32::<LittleEndian>(batch.len() as u32)?;
    for op in batch.ops() {
        match op {
            BatchOp::Put { key, value } => {
                bytes.write_u8(OP_PUT)?;
                write_bytes(bytes, key)?;
                write_bytes(bytes, value)?;
            }
            BatchOp::Delete { key } => {
                bytes.write_u8(OP_DELETE)?;
                write_bytes(bytes, key)?;
            }
        }
    }
    Ok(())
}

fn write_bytes(bytes: &mut Vec<u8>, data: &[u8]) -> std::io::Result<()> {
    bytes.write_u32::<LittleEndian>(data.len() as u32)?;
    bytes.extend_from_slice(data);
    Ok(())
}

/// Deserialize a batch from bytes.
///
/// Trailing bytes after the last op are rejected.
pub fn decode_batch(bytes: &[u8]) -> Result<WriteBatch, WalRecordError> {
    let mut cursor = Cursor::new(bytes);
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| WalRecordError::InsufficientData)? as usize;

    // Every op takes at least 5 bytes; bound the allocation by the input.
    let mut batch = WriteBatch::with_capacity(count.min(bytes.len() / 5));
    for _ in 0..count {
        let tag = cursor
            .read_u8()
            .map_err(|_| WalRecordError::InsufficientData)?;
        match tag {
            OP_PUT => {
                let key = read_bytes(&mut cursor)?;
                let value = read_bytes(&mut cursor)?;
                batch.put(key, value);
            }
            OP_DELETE => {
                let key = read_bytes(&mut cursor)?;
                batch.delete(key);
            }
            _ => return Err(WalRecordError::InvalidFormat),
        }
    }

    if cursor.position() as usize != bytes.len() {
        return Err(WalRecordError::InvalidFormat);
    }
    Ok(batch)
}

fn read_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, WalRecordError> {
    let len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| WalRecordError::InsufficientData)? as usize;
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if len > remaining {
        return Err(WalRecordError::InsufficientData);
    }
    let mut data = vec![0u8; len];
    cursor
        .read_exact(&mut data)
        .map_err(|_| WalRecordError::InsufficientData)?;
    Ok(data)
}
