//! 64-bit key fingerprints
//!
//! Keys are indexed by a table-driven CRC-64 (reflected polynomial
//! `0x95AC9329AC4BC9B5`, all-ones initial value, no final xor). The hash is
//! an index only: callers must store and re-check the full key.

use serde::{Deserialize, Serialize};
use std::fmt;

const POLY64_REV: u64 = 0x95AC_9329_AC4B_C9B5;
const INITIAL_CRC: u64 = 0xFFFF_FFFF_FFFF_FFFF;

static CRC_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = i as u64;
        let mut bit = 0;
        while bit < 8 {
            r = if r & 1 != 0 { (r >> 1) ^ POLY64_REV } else { r >> 1 };
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Compute the CRC-64 of `data`
pub fn crc64(data: &[u8]) -> u64 {
    data.iter().fold(INITIAL_CRC, |crc, &byte| {
        CRC_TABLE[((crc ^ byte as u64) & 0xff) as usize] ^ (crc >> 8)
    })
}

/// Storage index for a cached record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Fingerprint canonical key bytes with CRC-64
    pub fn of(key: &[u8]) -> Self {
        Self(crc64(key))
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Maps canonical key bytes to a fingerprint
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, key: &[u8]) -> Fingerprint;
}

/// The default CRC-64 fingerprinter
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc64;

impl Fingerprinter for Crc64 {
    fn fingerprint(&self, key: &[u8]) -> Fingerprint {
        Fingerprint::of(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc64_empty_is_initial_value() {
        assert_eq!(crc64(b""), u64::MAX);
    }

    #[test]
    fn test_crc64_known_values() {
        assert_eq!(crc64(b"a"), 0x76fb_7bba_4b34_03c3);
        assert_eq!(crc64(b"123456789"), 0xcaa7_1716_8609_f281);
        assert_eq!(
            crc64(b"/local/image/item/42+1700000000+2"),
            0x30c9_5d5b_b6ee_db54
        );
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(CRC_TABLE[0], 0);
        assert_eq!(CRC_TABLE[1], 0x7ad8_70c8_3035_8979);
        assert_eq!(CRC_TABLE[255], 0x29b7_d047_efec_8728);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = Fingerprint::of(b"/local/image/item/7");
        let b = Fingerprint::of(b"/local/image/item/7");
        let c = Fingerprint::of(b"/local/image/item/8");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Crc64.fingerprint(b"/local/image/item/7"), a);
    }

    #[test]
    fn test_fingerprint_display_is_padded_hex() {
        let fp = Fingerprint::from_raw(0xabc);
        assert_eq!(fp.to_string(), "0000000000000abc");
        assert_eq!(fp.as_u64(), 0xabc);
    }
}
