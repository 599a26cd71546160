//! Disk-backed blob cache indexed by 64-bit key fingerprints
//!
//! Records live in two append-only region files with an in-memory index
//! rebuilt on open. Capacity is bounded by entry count and byte budget;
//! overflow empties the older region. Read failures degrade to misses and
//! write failures are logged and dropped, so a broken cache behaves like an
//! empty one.

mod cache;
mod error;
mod fingerprint;
mod meta;
mod record;
mod region;
mod store;
mod types;

pub use cache::FingerprintCache;
pub use error::{CacheError, Result};
pub use fingerprint::{crc64, Crc64, Fingerprint, Fingerprinter};
pub use record::RECORD_OVERHEAD;
pub use types::{CacheConfig, CacheStats};
