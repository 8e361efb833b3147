use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::get_support_dir;
use crate::error::Result;

const MARKER_FILENAME: &str = "current_barik_version";

/// Compares dotted versions numerically, ignoring a `v` prefix.
///
/// Missing components count as `0` and non-numeric components are skipped,
/// so `v1.2` equals `1.2.0`.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = components(a);
    let right = components(b);
    let len = left.len().max(right.len());

    (0..len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            l.cmp(&r)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn components(version: &str) -> Vec<u64> {
    version.trim().trim_start_matches('v').split('.').filter_map(|part| part.parse().ok()).collect()
}

/// File remembering the last version whose "what's new" banner was dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    path: PathBuf,
}

impl Default for VersionMarker {
    fn default() -> Self { Self::at(get_support_dir().join(MARKER_FILENAME)) }
}

impl VersionMarker {
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// `true` only when the marker holds exactly `current`.
    #[must_use]
    pub fn is_latest(&self, current: &str) -> bool {
        fs::read_to_string(&self.path).is_ok_and(|saved| saved == current)
    }

    /// Records `current` as seen.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory or file cannot be written.
    pub fn mark_current(&self, current: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, current)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_numerically() {
        assert_eq!(compare_versions("v0.10.0", "0.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("0.4.1", "v0.4.2"), Ordering::Less);
        assert_eq!(compare_versions("v1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2.0.1", "1.2"), Ordering::Greater);
    }

    #[test]
    fn non_numeric_parts_are_skipped() {
        assert_eq!(compare_versions("1.x.3", "1.3"), Ordering::Equal);
        assert_eq!(compare_versions("", "0.0.0"), Ordering::Equal);
    }

    #[test]
    fn marker_tracks_the_current_version() {
        let dir = tempfile::tempdir().unwrap();
        let marker = VersionMarker::at(dir.path().join("nested").join(MARKER_FILENAME));

        assert!(!marker.is_latest("0.5.0"));
        marker.mark_current("0.5.0").unwrap();
        assert!(marker.is_latest("0.5.0"));
        assert!(!marker.is_latest("0.5.1"));
    }

    #[test]
    fn marker_content_must_match_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let marker = VersionMarker::at(dir.path().join(MARKER_FILENAME));
        fs::write(marker.path(), "0.5.0\n").unwrap();
        assert!(!marker.is_latest("0.5.0"));
    }
}
