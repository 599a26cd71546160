//! Error types for the image cache tool

use std::fmt;

#[derive(Debug)]
pub enum ImageCacheError {
    Cache(fingerprint_cache::CacheError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ImageCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageCacheError::Cache(err) => write!(f, "Cache error: {}", err),
            ImageCacheError::Io(err) => write!(f, "IO error: {}", err),
            ImageCacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ImageCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageCacheError::Cache(err) => Some(err),
            ImageCacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<fingerprint_cache::CacheError> for ImageCacheError {
    fn from(err: fingerprint_cache::CacheError) -> Self {
        ImageCacheError::Cache(err)
    }
}

impl From<std::io::Error> for ImageCacheError {
    fn from(err: std::io::Error) -> Self {
        ImageCacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for ImageCacheError {
    fn from(err: serde_json::Error) -> Self {
        ImageCacheError::Config(err.to_string())
    }
}

impl From<tracing_subscriber::filter::ParseError> for ImageCacheError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ImageCacheError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImageCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = ImageCacheError::from(fingerprint_cache::CacheError::Config(
            "max_entries must be positive".to_string(),
        ));
        assert_eq!(
            format!("{}", err),
            "Cache error: Configuration error: max_entries must be positive"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ImageCacheError::Config("IMAGE_CACHE_DIR is empty".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: IMAGE_CACHE_DIR is empty"
        );
    }

    #[test]
    fn test_error_is_debug() {
        let err = ImageCacheError::Config("test".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Config"));
    }
}
