//! Region record framing
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record including this field)
//! +------------------+
//! | Fingerprint      | (u64 LE)
//! +------------------+
//! | Flags            | (u8: 0 = live, 1 = tombstone)
//! +------------------+
//! | Body             | (record length - 17 bytes)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! The CRC-32 checksum covers every byte before it. Bodies are opaque here.

use crate::error::{CacheError, Result};
use crate::fingerprint::Fingerprint;
use crc32fast::Hasher;
use std::io;

const HEADER_LEN: usize = 4 + 8 + 1;
const CHECKSUM_LEN: usize = 4;

/// Framing bytes added to every body
pub const RECORD_OVERHEAD: u64 = (HEADER_LEN + CHECKSUM_LEN) as u64;

const FLAG_LIVE: u8 = 0;
const FLAG_TOMBSTONE: u8 = 1;

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Framed size of a record holding `body_len` bytes
pub fn framed_len(body_len: usize) -> u64 {
    body_len as u64 + RECORD_OVERHEAD
}

/// Serialize a record. Fails only when the framed size overflows the length field.
pub fn encode(fingerprint: Fingerprint, tombstone: bool, body: &[u8]) -> Result<Vec<u8>> {
    let total = framed_len(body.len());
    let record_length = u32::try_from(total).map_err(|_| CacheError::RecordTooLarge {
        size: total,
        limit: u32::MAX as u64,
    })?;

    let mut buf = Vec::with_capacity(total as usize);
    buf.extend_from_slice(&record_length.to_le_bytes());
    buf.extend_from_slice(&fingerprint.as_u64().to_le_bytes());
    buf.push(if tombstone { FLAG_TOMBSTONE } else { FLAG_LIVE });
    buf.extend_from_slice(body);
    let crc = checksum(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    Ok(buf)
}

/// A decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub fingerprint: Fingerprint,
    pub tombstone: bool,
    pub body: Vec<u8>,
}

impl Record {
    /// Read the length prefix of a framed record
    pub fn peek_length(prefix: [u8; 4]) -> u32 {
        u32::from_le_bytes(prefix)
    }

    /// Decode one complete framed record, verifying its checksum.
    pub fn decode(data: &[u8]) -> io::Result<Self> {
        if (data.len() as u64) < RECORD_OVERHEAD {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Record too short",
            ));
        }

        let record_length = Self::peek_length([data[0], data[1], data[2], data[3]]) as usize;
        if record_length != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Record length mismatch: header says {}, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - CHECKSUM_LEN;
        let mut stored = [0u8; 4];
        stored.copy_from_slice(&data[checksum_offset..]);
        let stored_checksum = u32::from_le_bytes(stored);
        let computed_checksum = checksum(&data[..checksum_offset]);

        if computed_checksum != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    computed_checksum, stored_checksum
                ),
            ));
        }

        let mut fp = [0u8; 8];
        fp.copy_from_slice(&data[4..12]);
        let tombstone = match data[12] {
            FLAG_LIVE => false,
            FLAG_TOMBSTONE => true,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Unknown record flags: {:#04x}", other),
                ))
            }
        };

        Ok(Self {
            fingerprint: Fingerprint::from_raw(u64::from_le_bytes(fp)),
            tombstone,
            body: data[HEADER_LEN..checksum_offset].to_vec(),
        })
    }
}
