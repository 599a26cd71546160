//! Image cache session
//!
//! Memoizes derived image bytes (thumbnails, decoded renders) on disk, keyed
//! by source identity, modification time and variant. Built on
//! [`fingerprint_cache`], adding full-key collision checks and a lock that
//! lets the store be closed and reopened while other threads use it.

mod config;
mod error;
mod key;
mod session;

pub use config::load_config;
pub use error::{ImageCacheError, Result};
pub use fingerprint_cache::{CacheConfig, CacheStats, Crc64, Fingerprint, Fingerprinter};
pub use key::{has_key_prefix, LogicalKey, ObsoletePrefix};
pub use session::CacheSession;
