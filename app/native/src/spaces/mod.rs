//! Spaces and windows reported by an external window manager.
//!
//! Two providers exist, [`yabai::YabaiProvider`] and
//! [`aerospace::AerospaceProvider`]. They keep their own fetch sequences but
//! produce the same [`Space`] tree. The running one is picked from the process
//! list.

pub mod aerospace;
pub mod icon_cache;
pub mod yabai;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

pub use self::aerospace::AerospaceProvider;
pub use self::icon_cache::IconCache;
pub use self::yabai::YabaiProvider;
use crate::config::{Config, ConfigStore};
use crate::error::Result;
use crate::performance::Metric;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub id: i64,
    pub title: String,
    pub app_name: Option<String>,
    pub is_focused: bool,
    /// Bundle of the owning app, used by the shell to draw its icon.
    pub app_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: String,
    pub is_focused: bool,
    pub windows: Vec<Window>,
}

/// Source of the space tree.
pub trait SpacesProvider: Send + Sync {
    /// Spaces that hold at least one window, with their windows in display order.
    ///
    /// # Errors
    ///
    /// Fails when the tool cannot run or its output cannot be decoded.
    fn fetch(&self) -> Result<Vec<Space>>;

    /// Switches to a space, focusing its first window when `need_window_focus` is set.
    ///
    /// # Errors
    ///
    /// Fails when the provider cannot switch spaces or the command fails.
    fn focus_space(&self, space_id: &str, need_window_focus: bool) -> Result<()>;

    /// Focuses a window by id.
    ///
    /// # Errors
    ///
    /// Fails when the provider cannot focus windows or the command fails.
    fn focus_window(&self, window_id: i64) -> Result<()>;

    fn supports_focus(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Yabai,
    Aerospace,
}

impl ProviderKind {
    /// Looks for a running window manager, preferring yabai.
    #[must_use]
    pub fn detect() -> Option<Self> {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
        Self::from_process_names(
            system.processes().values().map(|process| process.name().to_string_lossy().into_owned()),
        )
    }

    /// Picks a provider from process names, case-insensitively.
    #[must_use]
    pub fn from_process_names<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut aerospace = false;
        for name in names {
            match name.as_ref().to_lowercase().as_str() {
                "yabai" => return Some(Self::Yabai),
                "aerospace" => aerospace = true,
                _ => {}
            }
        }
        aerospace.then_some(Self::Aerospace)
    }

    /// Provider using the tool path from `config`.
    #[must_use]
    pub fn provider(self, config: &Config) -> Box<dyn SpacesProvider> {
        match self {
            Self::Yabai => Box::new(YabaiProvider::new(config.yabai_path())),
            Self::Aerospace => Box::new(AerospaceProvider::new(config.aerospace_path())),
        }
    }
}

/// Provider of the running window manager, if any.
#[must_use]
pub fn active_provider(config: &Config) -> Option<Box<dyn SpacesProvider>> {
    ProviderKind::detect().map(|kind| kind.provider(config))
}

/// Orders spaces by id the way a person would: `2` before `10`.
pub fn sort_spaces(spaces: &mut [Space]) { spaces.sort_by(|a, b| natord::compare(&a.id, &b.id)); }

/// Published spaces state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacesState {
    pub provider: Option<ProviderKind>,
    pub spaces: Vec<Space>,
}

impl SpacesState {
    #[must_use]
    pub fn supports_focus(&self) -> bool { self.provider == Some(ProviderKind::Aerospace) }
}

/// Failed fetches in a row after which the window manager is detected again.
const REDETECT_AFTER_FAILURES: u32 = 3;

/// The detected window manager, dropped after repeated fetch failures so a
/// switch from one manager to the other is picked up.
#[derive(Debug, Default)]
struct DetectedProvider {
    kind: Option<ProviderKind>,
    failures: u32,
}

impl DetectedProvider {
    /// The cached provider, detecting one with `detect` when there is none.
    fn get(&mut self, detect: impl FnOnce() -> Option<ProviderKind>) -> Option<ProviderKind> {
        if self.kind.is_none() {
            self.kind = detect();
            if let Some(kind) = self.kind {
                tracing::info!(provider = ?kind, "window manager detected");
            }
        }
        self.kind
    }

    fn record_success(&mut self) { self.failures = 0; }

    fn record_failure(&mut self) {
        self.failures += 1;
        if self.failures >= REDETECT_AFTER_FAILURES {
            tracing::info!(
                provider = ?self.kind,
                failures = self.failures,
                "window manager unresponsive, detecting again"
            );
            self.kind = None;
            self.failures = 0;
        }
    }
}

/// Polls the detected window manager.
#[derive(Debug)]
pub struct SpacesSource {
    config: ConfigStore,
    provider: DetectedProvider,
    icons: IconCache,
}

impl SpacesSource {
    #[must_use]
    pub fn new(config: ConfigStore) -> Self {
        Self {
            config,
            provider: DetectedProvider::default(),
            icons: IconCache::new(),
        }
    }
}

impl MetricSource for SpacesSource {
    type State = SpacesState;

    const METRIC: Metric = Metric::Spaces;
    const WIDGET_IDS: &'static [&'static str] = &[ids::SPACES];

    fn poll(&mut self) -> Result<SpacesState> {
        let Some(kind) = self.provider.get(ProviderKind::detect) else {
            return Ok(SpacesState::default());
        };

        let mut spaces = match kind.provider(&self.config.current()).fetch() {
            Ok(spaces) => {
                self.provider.record_success();
                spaces
            }
            Err(err) => {
                self.provider.record_failure();
                return Err(err);
            }
        };
        sort_spaces(&mut spaces);
        self.icons.fill(&mut spaces);

        Ok(SpacesState {
            provider: Some(kind),
            spaces,
        })
    }
}
