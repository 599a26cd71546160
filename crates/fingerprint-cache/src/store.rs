//! Two-region blob store with an in-memory fingerprint index
//!
//! New records are appended to the active region. Each region may hold half
//! of the configured bounds (rounded up) and the pair never holds more than
//! `max_entries` live entries or `max_bytes` of framed records. When an
//! insert would break either limit the store flips: the inactive region is
//! emptied and becomes the active one. Every record in the active region is
//! newer than every record in the inactive region, so replaying inactive then
//! active rebuilds the index with last-write-wins semantics.

use crate::error::{CacheError, Result};
use crate::fingerprint::Fingerprint;
use crate::meta::StoreMeta;
use crate::record::{self, RECORD_OVERHEAD};
use crate::region::Region;
use crate::types::CacheConfig;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Stores with a live handle in this process
static OPEN_STORES: LazyLock<Mutex<HashSet<PathBuf>>> = LazyLock::new(Default::default);

/// Exclusive claim on a store identity, released on drop
#[derive(Debug)]
struct StoreClaim {
    identity: PathBuf,
}

impl StoreClaim {
    fn acquire(identity: PathBuf) -> Result<Self> {
        let mut open = OPEN_STORES.lock();
        if !open.insert(identity.clone()) {
            return Err(CacheError::StoreInUse(identity));
        }
        Ok(Self { identity })
    }
}

impl Drop for StoreClaim {
    fn drop(&mut self) {
        OPEN_STORES.lock().remove(&self.identity);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    region: u8,
    offset: u64,
    len: u32,
}

/// An open store handle
pub(crate) struct BlobStore {
    config: CacheConfig,
    meta: StoreMeta,
    regions: [Region; 2],
    index: HashMap<Fingerprint, Slot>,
    /// Live entries per region
    live: [usize; 2],
    _claim: StoreClaim,
}

impl BlobStore {
    /// Open the store described by `config`, creating it or wiping an
    /// incompatible one as needed.
    pub fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.dir)?;
        let canonical_dir = fs::canonicalize(&config.dir)?;
        let claim = StoreClaim::acquire(config.store_identity(&canonical_dir))?;

        let existing = match StoreMeta::load(&config.meta_path()) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(name = %config.name, error = %e, "Unreadable store metadata, recreating");
                None
            }
        };

        if let Some(meta) = existing {
            if meta.is_compatible(&config) {
                match Self::attach(&config, &meta) {
                    Ok((regions, index)) => {
                        debug!(name = %config.name, entries = index.len(), "Attached existing store");
                        let mut live = [0usize; 2];
                        for slot in index.values() {
                            live[slot.region as usize] += 1;
                        }
                        return Ok(Self {
                            config,
                            meta,
                            regions,
                            index,
                            live,
                            _claim: claim,
                        });
                    }
                    Err(e) => {
                        warn!(name = %config.name, error = %e, "Damaged store, recreating");
                    }
                }
            } else {
                info!(
                    name = %config.name,
                    old_version = meta.version,
                    new_version = config.version,
                    "Store configuration changed, discarding old data"
                );
            }
        }

        let (meta, regions) = Self::create_fresh(&config)?;
        info!(name = %config.name, dir = ?config.dir, version = config.version, "Created store");

        Ok(Self {
            config,
            meta,
            regions,
            index: HashMap::new(),
            live: [0, 0],
            _claim: claim,
        })
    }

    fn attach(
        config: &CacheConfig,
        meta: &StoreMeta,
    ) -> Result<([Region; 2], HashMap<Fingerprint, Slot>)> {
        let mut regions = [
            Region::open(&config.region_path(0), 0, config.version)?,
            Region::open(&config.region_path(1), 1, config.version)?,
        ];

        let active = meta.active_region;
        let mut index = HashMap::new();
        for id in [1 - active, active] {
            for scanned in regions[id as usize].scan()? {
                if scanned.tombstone {
                    index.remove(&scanned.fingerprint);
                } else {
                    index.insert(
                        scanned.fingerprint,
                        Slot {
                            region: id,
                            offset: scanned.offset,
                            len: scanned.len,
                        },
                    );
                }
            }
        }

        Ok((regions, index))
    }

    fn create_fresh(config: &CacheConfig) -> Result<(StoreMeta, [Region; 2])> {
        let regions = [
            Region::create(&config.region_path(0), 0, config.version)?,
            Region::create(&config.region_path(1), 1, config.version)?,
        ];
        let meta = StoreMeta::new(config);
        meta.save(&config.meta_path())?;
        Ok((meta, regions))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn active_region(&self) -> u8 {
        self.meta.active_region
    }

    /// Bytes of framed records in both regions, including dead records
    pub fn stored_bytes(&self) -> u64 {
        self.regions[0].data_len() + self.regions[1].data_len()
    }

    #[cfg(test)]
    fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.index.contains_key(&fingerprint)
    }

    /// Read the body stored under `fingerprint`.
    ///
    /// Unreadable records are dropped from the index and reported as errors.
    /// A hit in the inactive region is copied forward into the active one
    /// when it fits there without a flip; a read never evicts.
    pub fn lookup(&mut self, fingerprint: Fingerprint) -> Result<Option<Vec<u8>>> {
        let Some(slot) = self.index.get(&fingerprint).copied() else {
            return Ok(None);
        };

        let record = match self.regions[slot.region as usize].read_at(slot.offset, slot.len) {
            Ok(record) => record,
            Err(e) => {
                self.untrack(fingerprint);
                return Err(e);
            }
        };

        if record.fingerprint != fingerprint || record.tombstone {
            self.untrack(fingerprint);
            return Err(CacheError::corrupt(
                slot.region,
                slot.offset,
                format!("index points at record for {}", record.fingerprint),
            ));
        }

        if slot.region != self.meta.active_region {
            self.promote(fingerprint, &record.body);
        }

        Ok(Some(record.body))
    }

    fn promote(&mut self, fingerprint: Fingerprint, body: &[u8]) {
        let size = record::framed_len(body.len());
        if !self.fits(fingerprint, size, true) {
            debug!(fingerprint = %fingerprint, "Active region full, skipping promotion");
            return;
        }

        match self.append_live(fingerprint, body) {
            Ok(()) => debug!(fingerprint = %fingerprint, "Promoted entry to active region"),
            Err(e) => warn!(fingerprint = %fingerprint, error = %e, "Failed to promote entry"),
        }
    }

    /// Store `body` under `fingerprint`, replacing any previous record.
    ///
    /// Records larger than one region's byte budget are rejected.
    pub fn insert(&mut self, fingerprint: Fingerprint, body: &[u8]) -> Result<()> {
        let size = record::framed_len(body.len());
        let limit = self.config.region_bytes();
        if size > limit {
            return Err(CacheError::RecordTooLarge { size, limit });
        }

        self.make_room(fingerprint, size, true)?;
        self.append_live(fingerprint, body)
    }

    fn append_live(&mut self, fingerprint: Fingerprint, body: &[u8]) -> Result<()> {
        let framed = record::encode(fingerprint, false, body)?;
        let region = self.meta.active_region;
        let offset = self.regions[region as usize].append(&framed)?;
        self.track(
            fingerprint,
            Slot {
                region,
                offset,
                len: framed.len() as u32,
            },
        );

        Ok(())
    }

    /// Remove the entry for `fingerprint`. Returns whether one existed.
    ///
    /// The index only forgets the entry once its tombstone is on disk.
    pub fn remove(&mut self, fingerprint: Fingerprint) -> Result<bool> {
        if !self.index.contains_key(&fingerprint) {
            return Ok(false);
        }

        // The old record stays on disk until its region is emptied, so a
        // tombstone is needed for the removal to survive a reopen.
        self.make_room(fingerprint, RECORD_OVERHEAD, false)?;
        let framed = record::encode(fingerprint, true, &[])?;
        self.regions[self.meta.active_region as usize].append(&framed)?;

        // A flip in make_room may already have evicted it
        self.untrack(fingerprint);
        Ok(true)
    }

    fn track(&mut self, fingerprint: Fingerprint, slot: Slot) {
        if let Some(old) = self.index.insert(fingerprint, slot) {
            self.live[old.region as usize] -= 1;
        }
        self.live[slot.region as usize] += 1;
    }

    fn untrack(&mut self, fingerprint: Fingerprint) -> Option<Slot> {
        let old = self.index.remove(&fingerprint)?;
        self.live[old.region as usize] -= 1;
        Some(old)
    }

    /// Whether appending a record of `size` bytes to the active region keeps
    /// both the region and store bounds
    fn fits(&self, fingerprint: Fingerprint, size: u64, adds_entry: bool) -> bool {
        let active = self.meta.active_region;
        let current = self.index.get(&fingerprint).map(|slot| slot.region);

        let entries = self.index.len() + usize::from(adds_entry && current.is_none());
        let bytes = self.stored_bytes() + size;
        let active_entries =
            self.live[active as usize] + usize::from(adds_entry && current != Some(active));
        let active_bytes = self.regions[active as usize].data_len() + size;

        entries <= self.config.max_entries
            && bytes <= self.config.max_bytes
            && active_entries <= self.config.region_entries()
            && active_bytes <= self.config.region_bytes()
    }

    /// Flip until a record of `size` bytes fits. Callers guarantee `size` is
    /// within one region's byte budget, so at most two flips are needed.
    fn make_room(&mut self, fingerprint: Fingerprint, size: u64, adds_entry: bool) -> Result<()> {
        for _ in 0..2 {
            if self.fits(fingerprint, size, adds_entry) {
                return Ok(());
            }
            self.flip()?;
        }
        Ok(())
    }

    /// Empty the inactive region and make it active
    fn flip(&mut self) -> Result<()> {
        let next = 1 - self.meta.active_region;
        self.regions[next as usize].reset(self.config.version)?;

        // The region is empty on disk from here on
        let before = self.index.len();
        self.index.retain(|_, slot| slot.region != next);
        self.live[next as usize] = 0;
        let evicted = before - self.index.len();

        let previous = self.meta.active_region;
        self.meta.active_region = next;
        if let Err(e) = self.meta.save(&self.config.meta_path()) {
            // Disk still names the old region as active
            self.meta.active_region = previous;
            return Err(e);
        }

        info!(
            name = %self.config.name,
            region = next,
            path = ?self.regions[next as usize].path(),
            evicted,
            "Flipped active region"
        );
        Ok(())
    }

    /// Push written records to disk
    pub fn flush(&mut self) -> Result<()> {
        for region in &mut self.regions {
            region.sync()?;
        }
        Ok(())
    }
}
