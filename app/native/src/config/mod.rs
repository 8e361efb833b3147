//! Configuration module for Barik.
//!
//! This module provides the configuration types, the [`ConfigStore`] that owns
//! the parsed tree, and file watching for hot-reloading.
//!
//! The configuration file is TOML, searched at `~/.barik-config.toml` and then
//! `~/.config/barik/config.toml`. Programmatic edits go through
//! [`ConfigStore::update_value`], which patches a single line of the file so
//! the user's comments and layout survive.

pub mod patch;
pub mod template;
pub mod types;
mod watcher;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyeball::{SharedObservable, Subscriber};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;

pub use types::{
    BackgroundConfig, BarHeight, Config, ConfigData, PopupVariant, RootToml, Theme, ToolConfig,
    WidgetItem, WidgetParams, WidgetsSection,
};
pub use watcher::ConfigWatcher;

use crate::error::BarikError;
use crate::events::EventBus;

/// Errors that can occur when loading or updating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file is associated with the store.
    #[error("no configuration file is loaded")]
    NoFile,
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    /// The file is not a valid configuration.
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
    /// The patched file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    /// A programmatic update would have produced an invalid file.
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// A patched document failed validation; the file was left untouched.
#[derive(Debug, Error)]
#[error("setting `{key}` would produce an invalid configuration: {source}")]
pub struct PatchError {
    pub key: String,
    #[source]
    pub source: toml::de::Error,
}

impl From<ConfigError> for BarikError {
    fn from(err: ConfigError) -> Self { Self::Config(err.to_string()) }
}

/// Returns the configuration search paths in priority order.
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };

    vec![home.join(".barik-config.toml"), home.join(".config").join("barik").join("config.toml")]
}

/// Reads and parses one configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Config::parse(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn default_config() -> Config { Config::parse(template::DEFAULT_CONFIG).unwrap_or_default() }

// ============================================================================
// Store
// ============================================================================

/// Owner of the authoritative configuration tree.
///
/// Cloning is cheap; every clone shares the same tree and file.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: Option<PathBuf>,
    current: SharedObservable<Arc<Config>>,
    bus: EventBus,
    /// Serializes read-patch-write cycles.
    write_lock: Mutex<()>,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore").field("path", &self.inner.path).finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Loads the configuration from the default search paths.
    ///
    /// When no file exists, the default template is written to the first
    /// search path. If that fails too, the store runs on the in-memory default
    /// without a file.
    #[must_use]
    pub fn load(bus: EventBus) -> Self { Self::with_search_paths(&config_paths(), bus) }

    /// Like [`ConfigStore::load`] with explicit search paths.
    #[must_use]
    pub fn with_search_paths(paths: &[PathBuf], bus: EventBus) -> Self {
        if let Some(existing) = paths.iter().find(|path| path.is_file()) {
            return Self::open(existing.clone(), bus);
        }

        let Some(preferred) = paths.first() else {
            tracing::debug!("no config path available for creating template");
            return Self::detached(default_config(), bus);
        };

        match template::create_config_file(preferred) {
            Ok(()) => {
                tracing::info!(path = %preferred.display(), "created default configuration file");
                Self::open(preferred.clone(), bus)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %preferred.display(),
                    "failed to create default configuration file, using defaults"
                );
                Self::detached(default_config(), bus)
            }
        }
    }

    /// Loads an explicit configuration file (`--config`), creating it from
    /// the template when it does not exist.
    #[must_use]
    pub fn load_from(path: impl Into<PathBuf>, bus: EventBus) -> Self {
        let path = path.into();

        if !path.exists() {
            match template::create_config_file(&path) {
                Ok(()) => tracing::info!(path = %path.display(), "created configuration file"),
                Err(err) => tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "failed to create configuration file"
                ),
            }
        }

        Self::open(path, bus)
    }

    /// A store without a backing file.
    #[must_use]
    pub fn detached(config: Config, bus: EventBus) -> Self { Self::with_state(None, config, bus) }

    fn open(path: PathBuf, bus: EventBus) -> Self {
        let config = match read_config(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                config
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load configuration, using defaults");
                Config::default()
            }
        };

        Self::with_state(Some(path), config, bus)
    }

    fn with_state(path: Option<PathBuf>, config: Config, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path,
                current: SharedObservable::new(Arc::new(config)),
                bus,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Path of the loaded file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> { self.inner.path.as_deref() }

    /// The event bus this store publishes on.
    #[must_use]
    pub fn bus(&self) -> &EventBus { &self.inner.bus }

    /// The current configuration tree.
    #[must_use]
    pub fn current(&self) -> Arc<Config> { self.inner.current.get() }

    /// Subscribes to configuration replacements.
    #[must_use]
    pub fn subscribe(&self) -> Subscriber<Arc<Config>> { self.inner.current.subscribe() }

    /// Reparses the file and publishes the new tree.
    ///
    /// On failure the previous tree stays in place.
    ///
    /// # Errors
    ///
    /// Returns the read or parse error, which is also logged.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let path = self.path().ok_or(ConfigError::NoFile)?;

        let config = match read_config(path) {
            Ok(config) => Arc::new(config),
            Err(err) => {
                tracing::warn!(error = %err, "config reload failed, keeping previous configuration");
                return Err(err);
            }
        };

        self.inner.current.set(Arc::clone(&config));
        tracing::info!(path = %path.display(), "configuration reloaded");
        self.inner.bus.config_changed.publish(config);
        Ok(())
    }

    /// Starts watching the loaded file; changes call [`ConfigStore::reload`]
    /// on `runtime`.
    ///
    /// Returns `None` when there is no file or the watcher cannot be set up.
    #[must_use]
    pub fn watch(&self, runtime: &Handle) -> Option<ConfigWatcher> {
        let Some(path) = self.path() else {
            tracing::debug!("no configuration file to watch");
            return None;
        };

        let store = self.clone();
        let watcher = watcher::watch(path, runtime, move || {
            // Failures are logged by reload.
            let _ = store.reload();
        })?;

        tracing::debug!(path = %watcher.path().display(), "watching configuration file");
        Some(watcher)
    }

    /// Global parameters of a widget id.
    #[must_use]
    pub fn global_widget_config(&self, widget_id: &str) -> ConfigData {
        self.current().global_widget_config(widget_id)
    }

    /// Global parameters of one displayed item overlaid by its inline ones.
    #[must_use]
    pub fn resolved_config(&self, item: &WidgetItem) -> ConfigData {
        self.current().resolved_item_config(item)
    }

    /// Global parameters of `widget_id` overlaid by `inline`.
    #[must_use]
    pub fn resolved_config_for(&self, widget_id: &str, inline: &ConfigData) -> ConfigData {
        self.current().resolved_config(widget_id, inline)
    }

    /// Sets `dotted_key` to the string `value` in the file and reloads.
    ///
    /// Only the affected line changes. A missing file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Patch`] without touching the file when the
    /// result would not parse, or the read/write/reload error.
    pub fn update_value(&self, dotted_key: &str, value: &str) -> Result<(), ConfigError> {
        let path = self.path().ok_or(ConfigError::NoFile)?;

        {
            let _guard = self.inner.write_lock.lock();

            let original = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
                Err(source) => {
                    return Err(ConfigError::Read { path: path.to_path_buf(), source });
                }
            };

            let patched = patch::patch_value(&original, dotted_key, value);
            Config::parse(&patched).map_err(|source| PatchError {
                key: dotted_key.to_string(),
                source,
            })?;

            std::fs::write(path, patched).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }

        tracing::debug!(key = dotted_key, value, "configuration value updated");
        self.reload()
    }

    /// Popup layout variant of a widget.
    #[must_use]
    pub fn popup_variant(&self, widget_id: &str) -> PopupVariant {
        self.current().popup_variant(widget_id)
    }

    /// Persists the popup layout variant of a widget.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::update_value`].
    pub fn set_popup_variant(&self, widget_id: &str, variant: PopupVariant) -> Result<(), ConfigError> {
        self.update_value(&format!("popup.{widget_id}.view-variant"), variant.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn search_prefers_first_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join(".barik-config.toml");
        let second = dir.path().join(".config/barik/config.toml");
        write(&second, "theme = \"dark\"");

        let store = ConfigStore::with_search_paths(&[first.clone(), second.clone()], EventBus::new());
        assert_eq!(store.path(), Some(second.as_path()));
        assert_eq!(store.current().theme(), Theme::Dark);

        write(&first, "theme = \"light\"");
        let store = ConfigStore::with_search_paths(&[first.clone(), second], EventBus::new());
        assert_eq!(store.path(), Some(first.as_path()));
    }

    #[test]
    fn missing_file_creates_default_at_first_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join(".barik-config.toml");

        let store = ConfigStore::with_search_paths(std::slice::from_ref(&first), EventBus::new());
        assert_eq!(std::fs::read_to_string(&first).unwrap(), template::DEFAULT_CONFIG);
        assert_eq!(store.current().theme(), Theme::System);
    }

    #[test]
    fn unwritable_location_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let store =
            ConfigStore::with_search_paths(&[blocker.join("config.toml")], EventBus::new());
        assert!(store.path().is_none());
        assert_eq!(store.current().displayed().len(), 6);
        assert!(matches!(store.reload(), Err(ConfigError::NoFile)));
    }

    #[test]
    fn reload_keeps_previous_tree_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write(&path, "theme = \"dark\"");

        let bus = EventBus::new();
        let mut rx = bus.config_changed.subscribe();
        let store = ConfigStore::load_from(&path, bus);

        write(&path, "theme = [");
        assert!(matches!(store.reload(), Err(ConfigError::Parse { .. })));
        assert_eq!(store.current().theme(), Theme::Dark);
        assert!(rx.try_recv().is_err());

        write(&path, "theme = \"light\"");
        store.reload().unwrap();
        assert_eq!(store.current().theme(), Theme::Light);
        assert_eq!(rx.try_recv().unwrap().theme(), Theme::Light);
    }

    #[test]
    fn load_from_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom").join("barik.toml");

        let store = ConfigStore::load_from(&path, EventBus::new());
        assert!(path.is_file());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn invalid_file_loads_defaults_but_keeps_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write(&path, "[widgets]\ndisplayed = 3");

        let store = ConfigStore::load_from(&path, EventBus::new());
        assert_eq!(*store.current(), Config::default());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn update_value_patches_file_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write(&path, "# my bar\ntheme = \"dark\"\n\n[widgets]\ndisplayed = [\"default.time\"]\n");

        let bus = EventBus::new();
        let mut rx = bus.config_changed.subscribe();
        let store = ConfigStore::load_from(&path, bus);

        store.update_value("widgets.default.time.format", "HH:mm").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# my bar\n"));
        let time = store.global_widget_config("default.time");
        assert_eq!(WidgetParams(&time).str("format"), Some("HH:mm"));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn update_value_rejects_invalid_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write(&path, "theme = \"dark\"\n");

        let store = ConfigStore::load_from(&path, EventBus::new());
        let err = store.update_value("theme", "neon").unwrap_err();

        assert!(matches!(err, ConfigError::Patch(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "theme = \"dark\"\n");
        assert_eq!(store.current().theme(), Theme::Dark);
    }

    #[test]
    fn popup_variant_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = ConfigStore::load_from(&path, EventBus::new());

        assert_eq!(store.popup_variant("default.time"), PopupVariant::Box);
        store.set_popup_variant("default.time", PopupVariant::Vertical).unwrap();
        assert_eq!(store.popup_variant("default.time"), PopupVariant::Vertical);
        store.set_popup_variant("default.battery", PopupVariant::Settings).unwrap();
        assert_eq!(store.popup_variant("default.battery"), PopupVariant::Settings);
        assert_eq!(store.popup_variant("default.time"), PopupVariant::Vertical);
    }

    #[test]
    fn subscribers_see_reloaded_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        write(&path, "theme = \"dark\"");

        let store = ConfigStore::load_from(&path, EventBus::new());
        let subscriber = store.subscribe();

        write(&path, "theme = \"light\"");
        store.reload().unwrap();
        assert_eq!(subscriber.get().theme(), Theme::Light);
    }

    #[test]
    fn config_error_converts_to_barik_error() {
        let err: BarikError = ConfigError::NoFile.into();
        assert!(matches!(err, BarikError::Config(_)));
    }
}
