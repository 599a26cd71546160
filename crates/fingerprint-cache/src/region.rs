//! Append-only region files
//!
//! A region starts with an 8-byte header (`FPC1` magic, u32 LE version)
//! followed by framed records. Records are only appended; a region is
//! emptied as a whole when the store flips onto it.

use crate::error::{CacheError, Result};
use crate::fingerprint::Fingerprint;
use crate::record::{Record, RECORD_OVERHEAD};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const REGION_MAGIC: [u8; 4] = *b"FPC1";
pub const REGION_HEADER_LEN: u64 = 8;

/// Location of a record found while scanning a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedRecord {
    pub fingerprint: Fingerprint,
    pub tombstone: bool,
    pub offset: u64,
    pub len: u32,
}

pub struct Region {
    id: u8,
    path: PathBuf,
    file: File,
    /// End of the last complete record; the next append lands here
    len: u64,
}

impl Region {
    /// Create a region file, truncating any previous contents
    pub fn create(path: &Path, id: u8, version: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut region = Self {
            id,
            path: path.to_path_buf(),
            file,
            len: 0,
        };
        region.write_header(version)?;
        Ok(region)
    }

    /// Open an existing region file, checking its header against `version`
    pub fn open(path: &Path, id: u8, version: u32) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        if len < REGION_HEADER_LEN {
            return Err(CacheError::corrupt(id, 0, "region header truncated"));
        }

        let mut header = [0u8; REGION_HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if header[..4] != REGION_MAGIC {
            return Err(CacheError::corrupt(id, 0, "bad region magic"));
        }
        let found = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if found != version {
            return Err(CacheError::corrupt(
                id,
                4,
                format!("region version {} does not match {}", found, version),
            ));
        }

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    fn write_header(&mut self, version: u32) -> Result<()> {
        let mut header = [0u8; REGION_HEADER_LEN as usize];
        header[..4].copy_from_slice(&REGION_MAGIC);
        header[4..].copy_from_slice(&version.to_le_bytes());

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.len = REGION_HEADER_LEN;
        Ok(())
    }

    /// Drop every record, keeping the header
    pub fn reset(&mut self, version: u32) -> Result<()> {
        self.file.set_len(0)?;
        self.write_header(version)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of framed records, excluding the header
    pub fn data_len(&self) -> u64 {
        self.len - REGION_HEADER_LEN
    }

    /// Scan every record from the start of the region.
    ///
    /// A torn or corrupt tail is truncated so later appends continue from the
    /// last good record.
    pub fn scan(&mut self) -> Result<Vec<ScannedRecord>> {
        let file_len = self.file.metadata()?.len();
        self.file.seek(SeekFrom::Start(REGION_HEADER_LEN))?;

        let mut reader = BufReader::new(&mut self.file);
        let mut records = Vec::new();
        let mut offset = REGION_HEADER_LEN;
        let mut damage = None;

        while offset < file_len {
            let remaining = file_len - offset;
            if remaining < RECORD_OVERHEAD {
                damage = Some(format!("{} trailing bytes", remaining));
                break;
            }

            let mut prefix = [0u8; 4];
            reader.read_exact(&mut prefix)?;
            let len = Record::peek_length(prefix);
            if (len as u64) < RECORD_OVERHEAD || len as u64 > remaining {
                damage = Some(format!("record length {} out of range", len));
                break;
            }

            let mut buf = vec![0u8; len as usize];
            buf[..4].copy_from_slice(&prefix);
            reader.read_exact(&mut buf[4..])?;

            match Record::decode(&buf) {
                Ok(record) => records.push(ScannedRecord {
                    fingerprint: record.fingerprint,
                    tombstone: record.tombstone,
                    offset,
                    len,
                }),
                Err(e) => {
                    damage = Some(e.to_string());
                    break;
                }
            }
            offset += len as u64;
        }
        drop(reader);

        if let Some(reason) = damage {
            warn!(
                region = self.id,
                offset,
                file_len,
                reason = %reason,
                "Truncating damaged region tail"
            );
            self.file.set_len(offset)?;
        }
        self.len = offset;

        Ok(records)
    }

    /// Append a framed record, returning its offset
    pub fn append(&mut self, framed: &[u8]) -> Result<u64> {
        let offset = self.len;
        self.file.seek(SeekFrom::Start(offset))?;

        if let Err(e) = self.file.write_all(framed) {
            // Discard a partial write so the region still ends on a record boundary
            if let Err(truncate) = self.file.set_len(offset) {
                warn!(
                    region = self.id,
                    offset,
                    error = %truncate,
                    "Failed to roll back partial append"
                );
            }
            return Err(e.into());
        }

        self.len += framed.len() as u64;
        Ok(offset)
    }

    /// Read and verify the record at `offset`
    pub fn read_at(&mut self, offset: u64, len: u32) -> Result<Record> {
        if offset < REGION_HEADER_LEN || offset + len as u64 > self.len {
            return Err(CacheError::corrupt(
                self.id,
                offset,
                format!("slot of {} bytes lies outside region", len),
            ));
        }

        let mut buf = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;

        Record::decode(&buf).map_err(|e| CacheError::corrupt(self.id, offset, e.to_string()))
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{encode, framed_len};
    use std::fs;
    use tempfile::tempdir;

    fn live(fp: u64, body: &[u8]) -> Vec<u8> {
        encode(Fingerprint::from_raw(fp), false, body).unwrap()
    }

    #[test]
    fn test_create_writes_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.0");
        let region = Region::create(&path, 0, 3).unwrap();

        assert_eq!(region.data_len(), 0);
        assert_eq!(fs::metadata(&path).unwrap().len(), REGION_HEADER_LEN);
    }

    #[test]
    fn test_append_and_read_at() {
        let dir = tempdir().unwrap();
        let mut region = Region::create(&dir.path().join("cache.0"), 0, 1).unwrap();

        let first = region.append(&live(1, b"alpha")).unwrap();
        let second = region.append(&live(2, b"beta")).unwrap();
        assert_eq!(first, REGION_HEADER_LEN);
        assert_eq!(second, REGION_HEADER_LEN + framed_len(5));

        let record = region.read_at(second, framed_len(4) as u32).unwrap();
        assert_eq!(record.fingerprint, Fingerprint::from_raw(2));
        assert_eq!(record.body, b"beta");
        assert_eq!(region.data_len(), framed_len(5) + framed_len(4));
    }

    #[test]
    fn test_reopen_and_scan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.1");
        {
            let mut region = Region::create(&path, 1, 5).unwrap();
            region.append(&live(10, b"one")).unwrap();
            region
                .append(&encode(Fingerprint::from_raw(10), true, &[]).unwrap())
                .unwrap();
        }

        let mut region = Region::open(&path, 1, 5).unwrap();
        let records = region.scan().unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].tombstone);
        assert!(records[1].tombstone);
        assert_eq!(records[1].offset, REGION_HEADER_LEN + framed_len(3));
    }

    #[test]
    fn test_open_rejects_other_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.0");
        Region::create(&path, 0, 1).unwrap();

        let err = Region::open(&path, 0, 2).err().unwrap();
        assert!(err.to_string().contains("region version 1 does not match 2"));
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.0");
        fs::write(&path, b"NOPE\x01\x00\x00\x00").unwrap();

        assert!(Region::open(&path, 0, 1).is_err());
    }

    #[test]
    fn test_scan_truncates_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.0");
        let good_end;
        {
            let mut region = Region::create(&path, 0, 1).unwrap();
            region.append(&live(1, b"intact")).unwrap();
            good_end = REGION_HEADER_LEN + region.data_len();
        }

        // Simulate a crash halfway through the second append
        let torn = live(2, b"never finished");
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&torn[..torn.len() / 2]);
        fs::write(&path, &bytes).unwrap();

        let mut region = Region::open(&path, 0, 1).unwrap();
        let records = region.scan().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_end);

        // Appends resume at the repaired boundary
        let offset = region.append(&live(3, b"after repair")).unwrap();
        assert_eq!(offset, good_end);
        assert_eq!(region.scan().unwrap().len(), 2);
    }

    #[test]
    fn test_scan_stops_at_checksum_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.0");
        {
            let mut region = Region::create(&path, 0, 1).unwrap();
            region.append(&live(1, b"first")).unwrap();
            region.append(&live(2, b"second")).unwrap();
        }

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 6;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let mut region = Region::open(&path, 0, 1).unwrap();
        let records = region.scan().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fingerprint, Fingerprint::from_raw(1));
        assert_eq!(region.data_len(), framed_len(5));
    }

    #[test]
    fn test_read_at_rejects_out_of_range_slot() {
        let dir = tempdir().unwrap();
        let mut region = Region::create(&dir.path().join("cache.0"), 0, 1).unwrap();
        region.append(&live(1, b"x")).unwrap();

        assert!(region.read_at(REGION_HEADER_LEN, 4096).is_err());
        assert!(region.read_at(0, 8).is_err());
    }

    #[test]
    fn test_reset_empties_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.0");
        let mut region = Region::create(&path, 0, 4).unwrap();
        region.append(&live(1, b"evicted")).unwrap();

        region.reset(4).unwrap();
        assert_eq!(region.data_len(), 0);
        assert!(region.scan().unwrap().is_empty());
        assert!(Region::open(&path, 0, 4).is_ok());
    }
}
