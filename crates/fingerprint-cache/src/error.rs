//! Error types for the fingerprint cache

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum CacheError {
    /// Invalid capacity bounds or store name
    Config(String),
    Io(Box<std::io::Error>),
    /// A record or region header failed validation
    Corrupt {
        region: u8,
        offset: u64,
        reason: String,
    },
    RecordTooLarge {
        size: u64,
        limit: u64,
    },
    Meta(serde_json::Error),
    /// Another live handle in this process already owns the store
    StoreInUse(PathBuf),
}

impl CacheError {
    pub(crate) fn corrupt(region: u8, offset: u64, reason: impl Into<String>) -> Self {
        CacheError::Corrupt {
            region,
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error indicates a caller mistake rather than an environment failure
    pub fn is_config(&self) -> bool {
        matches!(self, CacheError::Config(_))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Corrupt {
                region,
                offset,
                reason,
            } => write!(
                f,
                "Corrupt record in region {} at byte {}: {}",
                region, offset, reason
            ),
            CacheError::RecordTooLarge { size, limit } => {
                write!(f, "Record of {} bytes exceeds store limit of {}", size, limit)
            }
            CacheError::Meta(err) => write!(f, "Metadata error: {}", err),
            CacheError::StoreInUse(path) => {
                write!(f, "Store already open in this process: {}", path.display())
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Meta(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Meta(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CacheError::Config("max_entries must be positive".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: max_entries must be positive"
        );
        assert!(err.is_config());
    }

    #[test]
    fn test_corrupt_error_display() {
        let err = CacheError::corrupt(1, 4096, "checksum mismatch");
        let display = format!("{}", err);
        assert!(display.contains("region 1"));
        assert!(display.contains("4096"));
        assert!(display.contains("checksum mismatch"));
        assert!(!err.is_config());
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;

        let err = CacheError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only filesystem",
        ));
        assert!(err.source().is_some());
        assert!(format!("{}", err).contains("read-only filesystem"));
    }

    #[test]
    fn test_record_too_large_display() {
        let err = CacheError::RecordTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            format!("{}", err),
            "Record of 2048 bytes exceeds store limit of 1024"
        );
    }
}
