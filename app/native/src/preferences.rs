//! User defaults outside the config file.
//!
//! A small JSON object persisted at `<support dir>/preferences.json`. It holds
//! values the app changes on its own (currently the performance mode) so the
//! hand-edited TOML file is never rewritten for them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::cache::get_support_dir;
use crate::error::{BarikError, Result};

/// Preferences file name inside the support directory.
const PREFERENCES_FILENAME: &str = "preferences.json";

/// Key of the persisted performance mode.
pub const PERFORMANCE_MODE_KEY: &str = "performance_mode";

/// Key/value store backed by a JSON file, or by memory only.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: Option<PathBuf>,
    values: Arc<Mutex<Map<String, Value>>>,
}

impl Preferences {
    /// Opens the default preferences file.
    #[must_use]
    pub fn open_default() -> Self { Self::open(get_support_dir().join(PREFERENCES_FILENAME)) }

    /// Opens preferences stored at `path`.
    ///
    /// A missing or unreadable file yields empty preferences; the file is
    /// created on the first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_values(&path) {
            Ok(values) => values,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "starting with empty preferences");
                Map::new()
            }
        };

        Self {
            path: Some(path),
            values: Arc::new(Mutex::new(values)),
        }
    }

    /// Preferences that are never persisted.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Arc::new(Mutex::new(Map::new())),
        }
    }

    /// Returns the backing file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    /// Returns a string value.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Stores a string value and persists the whole file.
    ///
    /// The in-memory value is updated even when persisting fails.
    ///
    /// # Errors
    ///
    /// Returns [`BarikError::Preferences`] if the file cannot be written.
    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = {
            let mut values = self.values.lock();
            values.insert(key.to_string(), Value::String(value.to_string()));
            values.clone()
        };

        let Some(path) = &self.path else {
            return Ok(());
        };

        write_values(path, &snapshot)
            .map_err(|err| BarikError::Preferences(format!("{}: {err}", path.display())))
    }
}

fn read_values(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) => Ok(map),
        _ => Err(BarikError::Preferences("expected a JSON object".to_string())),
    }
}

fn write_values(path: &Path, values: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(values)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::open(dir.path().join("preferences.json"));
        assert_eq!(prefs.get_string(PERFORMANCE_MODE_KEY), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let prefs = Preferences::open(&path);
        prefs.set_string(PERFORMANCE_MODE_KEY, "balanced").unwrap();

        let reopened = Preferences::open(&path);
        assert_eq!(reopened.get_string(PERFORMANCE_MODE_KEY).as_deref(), Some("balanced"));
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let prefs = Preferences::open(&path);
        assert_eq!(prefs.get_string(PERFORMANCE_MODE_KEY), None);
    }

    #[test]
    fn in_memory_never_touches_disk() {
        let prefs = Preferences::in_memory();
        prefs.set_string("k", "v").unwrap();
        assert_eq!(prefs.get_string("k").as_deref(), Some("v"));
        assert!(prefs.path().is_none());
    }
}
