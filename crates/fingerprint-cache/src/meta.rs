//! Store metadata persisted as `<name>.meta`

use crate::error::Result;
use crate::types::CacheConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// On-disk layout revision. Bumped when the region or record format changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub format: u32,
    pub version: u32,
    pub max_entries: usize,
    pub max_bytes: u64,
    /// Region receiving new records (0 or 1)
    pub active_region: u8,
    pub created_at: DateTime<Utc>,
}

impl StoreMeta {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            format: FORMAT_VERSION,
            version: config.version,
            max_entries: config.max_entries,
            max_bytes: config.max_bytes,
            active_region: 0,
            created_at: Utc::now(),
        }
    }

    /// Load metadata; `Ok(None)` when no store exists yet
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Replace the metadata file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec(self)?;
        let tmp = path.with_extension("meta.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Whether a store written with this metadata can serve `config`
    pub fn is_compatible(&self, config: &CacheConfig) -> bool {
        self.format == FORMAT_VERSION
            && self.version == config.version
            && self.max_entries == config.max_entries
            && self.max_bytes == config.max_bytes
            && self.active_region <= 1
    }
}
