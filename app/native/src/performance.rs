//! Performance mode controller.
//!
//! The performance mode is a user-selected preset that fixes the polling
//! cadence of every metric manager. Selecting a mode persists it to the
//! preferences file and broadcasts the complete interval table on the
//! `performance_mode_changed` topic. There are no automatic transitions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::constants::timing::FALLBACK_INTERVAL_MS;
use crate::error::BarikError;
use crate::events::EventBus;
use crate::preferences::{PERFORMANCE_MODE_KEY, Preferences};

// ============================================================================
// Modes and metrics
// ============================================================================

/// Polling presets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceMode {
    /// Slowest cadence, the startup default.
    #[default]
    BatterySaver,
    Balanced,
    /// Near real-time updates.
    MaxPerformance,
}

impl PerformanceMode {
    /// All modes in menu order.
    pub const ALL: [Self; 3] = [Self::BatterySaver, Self::Balanced, Self::MaxPerformance];

    /// Identifier used in preferences and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BatterySaver => "battery-saver",
            Self::Balanced => "balanced",
            Self::MaxPerformance => "max-performance",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::BatterySaver => "Battery Saver",
            Self::Balanced => "Balanced",
            Self::MaxPerformance => "Max Performance",
        }
    }

    /// Returns the polling interval table of this mode.
    #[must_use]
    pub fn intervals(self) -> IntervalTable {
        let millis: [(Metric, u64); 10] = match self {
            Self::BatterySaver => [
                (Metric::Spaces, 5000),
                (Metric::NowPlaying, 5000),
                (Metric::Audio, 10000),
                (Metric::System, 10000),
                (Metric::Battery, 30000),
                (Metric::Keyboard, 10000),
                (Metric::Time, 5000),
                (Metric::SystemPopup, 3000),
                (Metric::Calendar, 5000),
                (Metric::Network, 5000),
            ],
            Self::Balanced => [
                (Metric::Spaces, 2000),
                (Metric::NowPlaying, 3000),
                (Metric::Audio, 5000),
                (Metric::System, 5000),
                (Metric::Battery, 10000),
                (Metric::Keyboard, 5000),
                (Metric::Time, 2000),
                (Metric::SystemPopup, 2000),
                (Metric::Calendar, 5000),
                (Metric::Network, 5000),
            ],
            Self::MaxPerformance => [
                (Metric::Spaces, 100),
                (Metric::NowPlaying, 300),
                (Metric::Audio, 500),
                (Metric::System, 1000),
                (Metric::Battery, 1000),
                (Metric::Keyboard, 2000),
                (Metric::Time, 1000),
                (Metric::SystemPopup, 1000),
                (Metric::Calendar, 5000),
                (Metric::Network, 5000),
            ],
        };

        IntervalTable(
            millis.into_iter().map(|(metric, ms)| (metric, Duration::from_millis(ms))).collect(),
        )
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PerformanceMode {
    type Err = BarikError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == s).ok_or_else(|| {
            BarikError::InvalidArguments(format!(
                "Unknown performance mode '{s}' (expected battery-saver, balanced or max-performance)"
            ))
        })
    }
}

/// Metric keys of the interval table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "spaces")]
    Spaces,
    #[serde(rename = "nowplaying")]
    NowPlaying,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "system")]
    System,
    #[serde(rename = "battery")]
    Battery,
    #[serde(rename = "keyboard")]
    Keyboard,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "systemPopup")]
    SystemPopup,
    #[serde(rename = "calendar")]
    Calendar,
    #[serde(rename = "network")]
    Network,
}

impl Metric {
    /// Key used in logs and serialized tables.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Spaces => "spaces",
            Self::NowPlaying => "nowplaying",
            Self::Audio => "audio",
            Self::System => "system",
            Self::Battery => "battery",
            Self::Keyboard => "keyboard",
            Self::Time => "time",
            Self::SystemPopup => "systemPopup",
            Self::Calendar => "calendar",
            Self::Network => "network",
        }
    }
}

/// Per-metric polling intervals of one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable(BTreeMap<Metric, Duration>);

impl IntervalTable {
    /// Interval of `metric`, or the 5 second fallback when it is missing.
    #[must_use]
    pub fn get(&self, metric: Metric) -> Duration {
        self.0.get(&metric).copied().unwrap_or(Duration::from_millis(FALLBACK_INTERVAL_MS))
    }

    /// Iterates metrics in key order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Duration)> + '_ {
        self.0.iter().map(|(metric, interval)| (*metric, *interval))
    }
}

impl Serialize for IntervalTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (metric, interval) in &self.0 {
            map.serialize_entry(metric.key(), &interval.as_secs_f64())?;
        }
        map.end()
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Holds the current mode and broadcasts interval changes.
#[derive(Debug, Clone)]
pub struct PerformanceController {
    inner: Arc<ControllerInner>,
}

#[derive(Debug)]
struct ControllerInner {
    mode: RwLock<PerformanceMode>,
    preferences: Preferences,
    bus: EventBus,
}

impl PerformanceController {
    /// Creates the controller with the persisted mode (battery-saver if none).
    #[must_use]
    pub fn new(preferences: Preferences, bus: EventBus) -> Self {
        let mode = preferences
            .get_string(PERFORMANCE_MODE_KEY)
            .and_then(|value| match value.parse::<PerformanceMode>() {
                Ok(mode) => Some(mode),
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring persisted performance mode");
                    None
                }
            })
            .unwrap_or_default();

        tracing::debug!(mode = %mode, "performance mode loaded");

        Self {
            inner: Arc::new(ControllerInner {
                mode: RwLock::new(mode),
                preferences,
                bus,
            }),
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> PerformanceMode { *self.inner.mode.read() }

    /// Interval table of the current mode.
    #[must_use]
    pub fn intervals(&self) -> IntervalTable { self.mode().intervals() }

    /// Current interval of one metric.
    #[must_use]
    pub fn interval(&self, metric: Metric) -> Duration { self.intervals().get(metric) }

    /// Switches mode, persists it and broadcasts the new table.
    ///
    /// A persistence failure is logged; the switch still takes effect for
    /// this session. Selecting the current mode broadcasts again.
    pub fn set_mode(&self, mode: PerformanceMode) {
        *self.inner.mode.write() = mode;

        if let Err(err) = self.inner.preferences.set_string(PERFORMANCE_MODE_KEY, mode.as_str()) {
            tracing::warn!(error = %err, "failed to persist performance mode");
        }

        tracing::info!(mode = %mode, "performance mode changed");
        self.inner.bus.performance_mode_changed.publish(mode.intervals());
    }
}
