//! Soft-failing cache facade over an optional store handle
//!
//! `FingerprintCache` owns at most one open store handle. Every data
//! operation on a closed cache, and every I/O or corruption error from an
//! open one, degrades to a miss or a dropped write after being logged. Only
//! configuration errors reach the caller.

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::store::BlobStore;
use crate::types::{CacheConfig, CacheStats};
use tracing::{debug, info, warn};

pub struct FingerprintCache {
    store: Option<BlobStore>,
    config: CacheConfig,
}

impl FingerprintCache {
    /// Validate `config` and try to open the store.
    ///
    /// If the store cannot be opened the cache starts closed and behaves as
    /// an empty cache until a later [`reopen`](Self::reopen) succeeds.
    pub fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let mut cache = Self {
            store: None,
            config,
        };
        cache.attach();
        Ok(cache)
    }

    fn attach(&mut self) {
        match BlobStore::open(self.config.clone()) {
            Ok(store) => {
                debug!(name = %self.config.name, entries = store.len(), "Cache opened");
                self.store = Some(store);
            }
            Err(e) => {
                warn!(
                    name = %self.config.name,
                    dir = ?self.config.dir,
                    error = %e,
                    "Failed to open cache, continuing without it"
                );
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Close any open handle and open the store described by `config`
    pub fn reopen(&mut self, config: CacheConfig) -> Result<()> {
        config.validate()?;
        self.close();
        self.config = config;
        self.attach();
        Ok(())
    }

    /// Flush and release the handle. Later operations are no-ops until reopened.
    pub fn close(&mut self) {
        if let Some(mut store) = self.store.take() {
            if let Err(e) = store.flush() {
                warn!(name = %self.config.name, error = %e, "Failed to flush cache on close");
            }
            info!(name = %self.config.name, "Cache closed");
        }
    }

    /// Raw record bytes stored under `fingerprint`
    pub fn lookup(&mut self, fingerprint: Fingerprint) -> Option<Vec<u8>> {
        let store = self.store.as_mut()?;
        match store.lookup(fingerprint) {
            Ok(found) => found,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    pub fn insert(&mut self, fingerprint: Fingerprint, record: &[u8]) {
        let Some(store) = self.store.as_mut() else {
            debug!(fingerprint = %fingerprint, "Cache closed, dropping insert");
            return;
        };
        if let Err(e) = store.insert(fingerprint, record) {
            warn!(
                fingerprint = %fingerprint,
                size = record.len(),
                error = %e,
                "Cache write failed, dropping entry"
            );
        }
    }

    pub fn remove(&mut self, fingerprint: Fingerprint) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.remove(fingerprint) {
            Ok(true) => debug!(fingerprint = %fingerprint, "Removed cache entry"),
            Ok(false) => {}
            Err(e) => warn!(fingerprint = %fingerprint, error = %e, "Cache remove failed"),
        }
    }

    pub fn flush(&mut self) {
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.flush() {
                warn!(name = %self.config.name, error = %e, "Cache flush failed");
            }
        }
    }

    /// Store-level statistics; hit and miss counters are left at zero
    pub fn stats(&self) -> CacheStats {
        match &self.store {
            Some(store) => CacheStats {
                open: true,
                entries: store.len(),
                total_size: store.stored_bytes(),
                active_region: Some(store.active_region()),
                ..CacheStats::default()
            },
            None => CacheStats::default(),
        }
    }
}

impl Drop for FingerprintCache {
    fn drop(&mut self) {
        self.close();
    }
}
