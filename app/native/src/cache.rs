//! Cache and application-support directory utilities.
//!
//! Uses `~/Library/Caches/{APP_BUNDLE_ID}/` on macOS for the socket and update
//! downloads, with a fallback to `/tmp/{APP_BUNDLE_ID}/` if the cache directory
//! is unavailable. Persisted state (preferences, version marker) lives under
//! the platform config directory instead, see [`get_support_dir`].

use std::path::PathBuf;

use crate::constants::{APP_BUNDLE_ID, APP_NAME};

/// Returns the root cache directory for the application.
#[must_use]
pub fn get_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(
        || PathBuf::from(format!("/tmp/{APP_BUNDLE_ID}")),
        |cache| cache.join(APP_BUNDLE_ID),
    )
}

/// Returns a cache subdirectory for the given component (e.g. `updates`).
#[must_use]
pub fn get_cache_subdir(subdir: &str) -> PathBuf { get_cache_dir().join(subdir) }

/// Returns the directory for small persisted files.
///
/// `~/Library/Application Support/barik` on macOS, `~/.config/barik` elsewhere.
#[must_use]
pub fn get_support_dir() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from(format!("/tmp/{APP_BUNDLE_ID}/support")),
        |config| config.join(APP_NAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cache_dir_contains_bundle_id() {
        let path = get_cache_dir();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains(APP_BUNDLE_ID), "Path should contain bundle ID: {path_str}");
    }

    #[test]
    fn test_get_cache_subdir_contains_component() {
        let path = get_cache_subdir("updates");
        assert!(path.ends_with("updates"));
        assert!(path.starts_with(get_cache_dir()));
    }

    #[test]
    fn test_support_dir_ends_with_app_name() {
        assert!(get_support_dir().ends_with(APP_NAME));
    }
}
