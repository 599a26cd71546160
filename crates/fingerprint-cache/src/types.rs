//! Cache types

use crate::error::{CacheError, Result};
use crate::record::RECORD_OVERHEAD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location, capacity bounds and schema version of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the store files
    pub dir: PathBuf,
    /// Base file name; the store uses `<name>.meta`, `<name>.0` and `<name>.1`
    pub name: String,
    /// Maximum number of live entries
    pub max_entries: usize,
    /// Maximum bytes of framed records across both regions
    pub max_bytes: u64,
    /// Schema version; a mismatch on disk discards the old store
    pub version: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./cache/images"),
            name: "imgcache".to_string(),
            max_entries: 5000,
            max_bytes: 200 * 1024 * 1024, // 200MB
            version: 7,
        }
    }
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Reject bounds and names that can never produce a working store
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::Config(
                "max_entries must be positive".to_string(),
            ));
        }
        if self.max_bytes < 2 * RECORD_OVERHEAD {
            return Err(CacheError::Config(format!(
                "max_bytes must be at least {} (one empty record per region), got {}",
                2 * RECORD_OVERHEAD,
                self.max_bytes
            )));
        }
        if self.name.is_empty() {
            return Err(CacheError::Config("name must not be empty".to_string()));
        }
        if self.name.contains(|c| c == '/' || c == '\\') || self.name == "." || self.name == ".." {
            return Err(CacheError::Config(format!(
                "name must be a plain file name, got {:?}",
                self.name
            )));
        }
        Ok(())
    }

    /// Live entries one region may hold
    pub fn region_entries(&self) -> usize {
        self.max_entries.div_ceil(2)
    }

    /// Framed record bytes one region may hold; also the largest record
    pub fn region_bytes(&self) -> u64 {
        self.max_bytes.div_ceil(2)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(format!("{}.meta", self.name))
    }

    pub fn region_path(&self, region: u8) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, region))
    }

    pub(crate) fn store_identity(&self, canonical_dir: &Path) -> PathBuf {
        canonical_dir.join(&self.name)
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub open: bool,
    pub entries: usize,
    /// Bytes of framed records on disk, live or dead
    pub total_size: u64,
    pub active_region: Option<u8>,
    pub hits: u64,
    pub misses: u64,
    pub collisions: u64,
}
