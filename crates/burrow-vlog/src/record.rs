// Value-log record format and encoding/decoding
//
// Record format (binary):
// [length: u32 LE] [type: u8] [payload bytes] [crc32: u32 LE]
//
// Types:
// - PUT (1): versioned key-value write
// - DELETE (2): versioned tombstone
// - BEGIN_TX (3): transaction start marker
// - COMMIT_TX (4): transaction commit marker

use burrow_core::{Error, Result};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

/// Framing overhead: length prefix + type byte + crc suffix
pub const FRAME_OVERHEAD: usize = 4 + 1 + 4;

/// Upper bound on a single record's content (type byte and payload).
///
/// Enforced by [`VlogRecord::encode`]; readers treat a longer frame as a
/// torn tail.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Value-log record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordType {
    Put = 1,
    Delete = 2,
    BeginTx = 3,
    CommitTx = 4,
}

impl TryFrom<u8> for RecordType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordType::Put),
            2 => Ok(RecordType::Delete),
            3 => Ok(RecordType::BeginTx),
            4 => Ok(RecordType::CommitTx),
            _ => Err(Error::Corrupted(format!(
                "unknown value log record type: {}",
                value
            ))),
        }
    }
}

/// Value-log record payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordPayload {
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        version: u64,
    },
    Delete {
        key: Vec<u8>,
        version: u64,
    },
    BeginTx {
        tx_id: u64,
    },
    CommitTx {
        tx_id: u64,
    },
}

/// A value-log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlogRecord {
    pub record_type: RecordType,
    pub payload: RecordPayload,
}

impl VlogRecord {
    /// Create a PUT record
    pub fn put(key: Vec<u8>, value: Vec<u8>, version: u64) -> Self {
        Self {
            record_type: RecordType::Put,
            payload: RecordPayload::Put {
                key,
                value,
                version,
            },
        }
    }

    /// Create a DELETE record
    pub fn delete(key: Vec<u8>, version: u64) -> Self {
        Self {
            record_type: RecordType::Delete,
            payload: RecordPayload::Delete { key, version },
        }
    }

    /// Create a BEGIN_TX record
    pub fn begin_tx(tx_id: u64) -> Self {
        Self {
            record_type: RecordType::BeginTx,
            payload: RecordPayload::BeginTx { tx_id },
        }
    }

    /// Create a COMMIT_TX record
    pub fn commit_tx(tx_id: u64) -> Self {
        Self {
            record_type: RecordType::CommitTx,
            payload: RecordPayload::CommitTx { tx_id },
        }
    }

    /// Key of a data record, `None` for transaction markers.
    pub fn key(&self) -> Option<&[u8]> {
        match &self.payload {
            RecordPayload::Put { key, .. } | RecordPayload::Delete { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Version of a data record, `None` for transaction markers.
    pub fn version(&self) -> Option<u64> {
        match &self.payload {
            RecordPayload::Put { version, .. } | RecordPayload::Delete { version, .. } => {
                Some(*version)
            }
            _ => None,
        }
    }

    /// True for PUT and DELETE records.
    pub fn is_data(&self) -> bool {
        matches!(self.record_type, RecordType::Put | RecordType::Delete)
    }

    /// Frames the record: length prefix, type byte, bincode payload, CRC32.
    ///
    /// Fails with [`Error::RecordTooLarge`] when the content would exceed
    /// [`MAX_RECORD_SIZE`]; nothing is produced in that case.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&self.payload)
            .map_err(|e| Error::Serialization(format!("failed to serialize payload: {e}")))?;
        let type_byte = self.record_type as u8;
        let content_size = 1 + payload.len();
        if content_size > MAX_RECORD_SIZE {
            return Err(Error::RecordTooLarge {
                size: content_size,
                max: MAX_RECORD_SIZE,
            });
        }
        let content_len = content_size as u32;

        let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
        frame.extend_from_slice(&content_len.to_le_bytes());
        frame.push(type_byte);
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&content_crc(type_byte, &payload).to_le_bytes());
        Ok(frame)
    }

    /// Decodes the frame at the start of `data`.
    ///
    /// Returns the record and the frame length. A frame cut short yields
    /// [`Error::Serialization`]; a checksum or type mismatch yields
    /// [`Error::Corrupted`].
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
            return Err(Error::Serialization("incomplete record frame".to_string()));
        };
        let content_len = u32::from_le_bytes(*len_bytes) as usize;
        if content_len == 0 {
            return Err(Error::Corrupted("zero-length record".to_string()));
        }

        let frame_len = content_len + FRAME_OVERHEAD - 1;
        if data.len() < frame_len {
            return Err(Error::Serialization(format!(
                "incomplete record: expected {frame_len} bytes, got {}",
                data.len()
            )));
        }

        let (content, crc_bytes) = rest[..content_len + 4].split_at(content_len);
        let (type_byte, payload) = (content[0], &content[1..]);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed_crc = content_crc(type_byte, payload);
        if stored_crc != computed_crc {
            return Err(Error::Corrupted(format!(
                "CRC mismatch: stored {stored_crc:#010x}, computed {computed_crc:#010x}"
            )));
        }

        let record_type = RecordType::try_from(type_byte)?;
        let payload: RecordPayload = bincode::deserialize(payload)
            .map_err(|e| Error::Serialization(format!("failed to deserialize payload: {e}")))?;

        Ok((
            VlogRecord {
                record_type,
                payload,
            },
            frame_len,
        ))
    }
}

fn content_crc(type_byte: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[type_byte]);
    hasher.update(payload);
    hasher.finalize()
}
