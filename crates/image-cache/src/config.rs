//! Environment-driven configuration

use fingerprint_cache::CacheConfig;
use std::path::PathBuf;

/// Build a [`CacheConfig`] from `IMAGE_CACHE_*` environment variables.
///
/// Missing or unparsable values fall back to the defaults.
pub fn load_config() -> CacheConfig {
    config_from(|name| std::env::var(name).ok())
}

fn config_from(var: impl Fn(&str) -> Option<String>) -> CacheConfig {
    let defaults = CacheConfig::default();

    let dir = var("IMAGE_CACHE_DIR")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or(defaults.dir);

    let name = var("IMAGE_CACHE_NAME")
        .filter(|s| !s.is_empty())
        .unwrap_or(defaults.name);

    let max_entries = var("IMAGE_CACHE_MAX_ENTRIES")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(defaults.max_entries);

    let max_bytes = var("IMAGE_CACHE_MAX_BYTES")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.max_bytes);

    let version = var("IMAGE_CACHE_VERSION")
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(defaults.version);

    CacheConfig {
        dir,
        name,
        max_entries,
        max_bytes,
        version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> CacheConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config_from(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(from_map(&[]), CacheConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("IMAGE_CACHE_DIR", "/var/cache/thumbs"),
            ("IMAGE_CACHE_NAME", "thumbs"),
            ("IMAGE_CACHE_MAX_ENTRIES", "100"),
            ("IMAGE_CACHE_MAX_BYTES", "1048576"),
            ("IMAGE_CACHE_VERSION", "9"),
        ]);
        assert_eq!(config.dir, PathBuf::from("/var/cache/thumbs"));
        assert_eq!(config.name, "thumbs");
        assert_eq!(config.max_entries, 100);
        assert_eq!(config.max_bytes, 1_048_576);
        assert_eq!(config.version, 9);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = from_map(&[
            ("IMAGE_CACHE_MAX_ENTRIES", "lots"),
            ("IMAGE_CACHE_MAX_BYTES", "-1"),
            ("IMAGE_CACHE_VERSION", ""),
            ("IMAGE_CACHE_DIR", ""),
        ]);
        let defaults = CacheConfig::default();
        assert_eq!(config.max_entries, defaults.max_entries);
        assert_eq!(config.max_bytes, defaults.max_bytes);
        assert_eq!(config.version, defaults.version);
        assert_eq!(config.dir, defaults.dir);
    }
}
