//! Logical cache keys and their canonical byte form

use serde::{Deserialize, Serialize};

/// Semantic identity of a cached artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalKey {
    /// Source identity, e.g. a media path
    pub identity: String,
    /// Source modification time; a new value yields a new key
    pub modified_at: i64,
    /// Artifact variant, e.g. thumbnail vs. micro-thumbnail
    pub kind: i32,
}

impl LogicalKey {
    pub fn new(identity: impl Into<String>, modified_at: i64, kind: i32) -> Self {
        Self {
            identity: identity.into(),
            modified_at,
            kind,
        }
    }

    /// Deterministic encoding used for fingerprinting and collision checks.
    ///
    /// Layout: `u64 LE identity length | identity | i64 LE modified_at | i32 LE kind`.
    /// The length prefix makes the encoding prefix-free.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let identity = self.identity.as_bytes();
        let mut buf = Vec::with_capacity(8 + identity.len() + 8 + 4);
        buf.extend_from_slice(&(identity.len() as u64).to_le_bytes());
        buf.extend_from_slice(identity);
        buf.extend_from_slice(&self.modified_at.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf
    }
}

/// Whether `record` begins with exactly `key`
pub fn has_key_prefix(key: &[u8], record: &[u8]) -> bool {
    record.len() >= key.len() && record[..key.len()] == *key
}

/// Caller-owned marker forcing entries under an identity prefix to read as stale
#[derive(Debug, Clone, Default)]
pub struct ObsoletePrefix {
    prefix: Option<String>,
}

impl ObsoletePrefix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, prefix: impl Into<String>) {
        self.prefix = Some(prefix.into());
    }

    pub fn clear(&mut self) {
        self.prefix = None;
    }

    pub fn is_marked(&self) -> bool {
        self.prefix.is_some()
    }

    pub fn matches(&self, key: &LogicalKey) -> bool {
        self.prefix
            .as_deref()
            .is_some_and(|prefix| key.identity.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_layout() {
        let key = LogicalKey::new("ab", 1, -1);
        assert_eq!(
            key.canonical_bytes(),
            vec![
                2, 0, 0, 0, 0, 0, 0, 0, // identity length
                b'a', b'b', // identity
                1, 0, 0, 0, 0, 0, 0, 0, // modified_at
                0xff, 0xff, 0xff, 0xff, // kind
            ]
        );
    }

    #[test]
    fn test_equal_keys_share_bytes() {
        let a = LogicalKey::new("/local/image/item/42", 1_700_000_000, 2);
        let b = LogicalKey::new("/local/image/item/42", 1_700_000_000, 2);
        assert_eq!(a, b);
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn test_each_component_changes_bytes() {
        let base = LogicalKey::new("/local/image/item/42", 1_700_000_000, 2);
        let others = [
            LogicalKey::new("/local/image/item/43", 1_700_000_000, 2),
            LogicalKey::new("/local/image/item/42", 1_700_000_001, 2),
            LogicalKey::new("/local/image/item/42", 1_700_000_000, 1),
        ];
        for other in &others {
            assert_ne!(base.canonical_bytes(), other.canonical_bytes());
        }
    }

    #[test]
    fn test_encoding_is_prefix_free() {
        // A textual "path+time+kind" join would make the first a prefix of the second
        let short = LogicalKey::new("x", 1, 2).canonical_bytes();
        let long = LogicalKey::new("x", 1, 23).canonical_bytes();
        assert!(!has_key_prefix(&short, &long));

        let plus = LogicalKey::new("x+1", 2, 3).canonical_bytes();
        let split = LogicalKey::new("x", 1, 2).canonical_bytes();
        assert_ne!(plus, split);
    }

    #[test]
    fn test_has_key_prefix() {
        assert!(has_key_prefix(b"key", b"keypayload"));
        assert!(has_key_prefix(b"key", b"key"));
        assert!(!has_key_prefix(b"key", b"ke"));
        assert!(!has_key_prefix(b"key", b"kez-payload"));
        assert!(has_key_prefix(b"", b"anything"));
    }

    #[test]
    fn test_obsolete_prefix() {
        let key = LogicalKey::new("/local/image/item/42", 5, 1);
        let mut marker = ObsoletePrefix::new();
        assert!(!marker.is_marked());
        assert!(!marker.matches(&key));

        marker.mark("/local/image/item/4");
        assert!(marker.matches(&key));
        assert!(!marker.matches(&LogicalKey::new("/local/video/item/42", 5, 1)));

        marker.clear();
        assert!(!marker.matches(&key));
    }

    #[test]
    fn test_key_serialization() {
        let key = LogicalKey::new("/local/image/item/42", 1_700_000_000, 2);
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains("1700000000"));

        let deserialized: LogicalKey = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, key);
    }
}
