//! Collision-checked, thread-safe session over a fingerprint cache
//!
//! Records are stored as `canonical key bytes ‖ payload` under the key's
//! fingerprint. A lookup only returns a payload when the stored key bytes
//! match the queried key exactly, so two keys sharing a fingerprint can
//! never see each other's data.

use crate::key::{has_key_prefix, LogicalKey};
use fingerprint_cache::{CacheConfig, CacheStats, Crc64, FingerprintCache, Fingerprinter, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub struct CacheSession<H = Crc64> {
    cache: Mutex<FingerprintCache>,
    hasher: H,
    hits: AtomicU64,
    misses: AtomicU64,
    collisions: AtomicU64,
}

impl CacheSession<Crc64> {
    /// Open a session fingerprinting keys with CRC-64.
    ///
    /// Only configuration errors are returned; an unopenable store leaves
    /// the session closed and every `get` a miss.
    pub fn open(config: CacheConfig) -> Result<Self> {
        Self::with_fingerprinter(config, Crc64)
    }
}

impl<H: Fingerprinter> CacheSession<H> {
    pub fn with_fingerprinter(config: CacheConfig, hasher: H) -> Result<Self> {
        let cache = FingerprintCache::open(config)?;
        Ok(Self {
            cache: Mutex::new(cache),
            hasher,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
        })
    }

    /// Payload stored for `key`, or `None` on miss, collision, closed store
    /// or read failure
    pub fn get(&self, key: &LogicalKey) -> Option<Vec<u8>> {
        let canonical = key.canonical_bytes();
        let fingerprint = self.hasher.fingerprint(&canonical);

        let record = self.cache.lock().lookup(fingerprint);

        let Some(mut record) = record else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = %fingerprint, "Cache miss");
            return None;
        };

        if !has_key_prefix(&canonical, &record) {
            self.collisions.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(
                fingerprint = %fingerprint,
                identity = %key.identity,
                "Fingerprint collision, treating as miss"
            );
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(fingerprint = %fingerprint, "Cache hit");
        record.drain(..canonical.len());
        Some(record)
    }

    /// Like [`get`](Self::get), but misses without touching the store when
    /// `is_obsolete` holds for `key`
    pub fn get_unless<F>(&self, key: &LogicalKey, is_obsolete: F) -> Option<Vec<u8>>
    where
        F: FnOnce(&LogicalKey) -> bool,
    {
        if is_obsolete(key) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(identity = %key.identity, "Entry marked obsolete, treating as miss");
            return None;
        }
        self.get(key)
    }

    /// Store `payload` for `key`. Failures are logged by the cache and dropped.
    pub fn put(&self, key: &LogicalKey, payload: &[u8]) {
        let mut record = key.canonical_bytes();
        let fingerprint = self.hasher.fingerprint(&record);
        record.extend_from_slice(payload);

        self.cache.lock().insert(fingerprint, &record);
    }

    pub fn invalidate(&self, key: &LogicalKey) {
        let fingerprint = self.hasher.fingerprint(&key.canonical_bytes());
        self.cache.lock().remove(fingerprint);
    }

    pub fn is_open(&self) -> bool {
        self.cache.lock().is_open()
    }

    pub fn close(&self) {
        self.cache.lock().close();
    }

    /// Reattach the configured store. A no-op when the session is open.
    pub fn reopen(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        if cache.is_open() {
            return Ok(());
        }
        let config = cache.config().clone();
        cache.reopen(config)
    }

    /// Close the current store and open the one described by `config`
    pub fn reopen_with(&self, config: CacheConfig) -> Result<()> {
        let mut cache = self.cache.lock();
        info!(name = %config.name, version = config.version, "Reopening cache session");
        cache.reopen(config)
    }

    pub fn flush(&self) {
        self.cache.lock().flush();
    }

    pub fn config(&self) -> CacheConfig {
        self.cache.lock().config().clone()
    }

    /// Store statistics plus this session's hit, miss and collision counters
    pub fn stats(&self) -> CacheStats {
        let store = self.cache.lock().stats();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            ..store
        }
    }
}
