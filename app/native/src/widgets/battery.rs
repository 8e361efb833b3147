//! Battery charge from `starship-battery`, plus the power source from
//! `pmset -g batt`: a battery held at its charge limit reports neither
//! charging nor full while the Mac runs from AC.

use serde::Serialize;
use starship_battery::units::power::watt;
use starship_battery::units::ratio::percent;
use starship_battery::units::time::second;
use starship_battery::{Battery, Manager, State};

use crate::error::{BarikError, Result};
use crate::performance::Metric;
use crate::utils::command::run_binary;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BatteryState {
    #[default]
    Unknown,
    Charging,
    Discharging,
    Empty,
    Full,
}

impl From<State> for BatteryState {
    fn from(state: State) -> Self {
        match state {
            State::Charging => Self::Charging,
            State::Discharging => Self::Discharging,
            State::Empty => Self::Empty,
            State::Full => Self::Full,
            State::Unknown => Self::Unknown,
        }
    }
}

/// Published battery state. Machines without a battery keep the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    /// Charge percentage (0-100)
    pub level: u8,
    pub is_charging: bool,
    pub is_plugged_in: bool,
    pub state: BatteryState,
    /// Charge/discharge rate in watts
    pub energy_rate: f32,
    /// Time until fully charged in seconds (if charging)
    pub time_to_full: Option<u64>,
    /// Time until empty in seconds (if discharging)
    pub time_to_empty: Option<u64>,
}

impl From<&Battery> for BatteryStatus {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(battery: &Battery) -> Self {
        let state = BatteryState::from(battery.state());
        Self {
            level: percentage_from_ratio(battery.state_of_charge().get::<percent>()),
            is_charging: state == BatteryState::Charging,
            is_plugged_in: plugged_in(state, None),
            state,
            energy_rate: battery.energy_rate().get::<watt>(),
            time_to_full: battery.time_to_full().map(|t| t.get::<second>() as u64),
            time_to_empty: battery.time_to_empty().map(|t| t.get::<second>() as u64),
        }
    }
}

/// Reads the first battery reported by the OS.
#[derive(Debug, Default)]
pub struct BatterySource;

impl MetricSource for BatterySource {
    type State = BatteryStatus;

    const METRIC: Metric = Metric::Battery;
    const WIDGET_IDS: &'static [&'static str] = &[ids::BATTERY];

    fn poll(&mut self) -> Result<BatteryStatus> {
        let manager = Manager::new()
            .map_err(|e| BarikError::Battery(format!("Manager init failed: {e}")))?;
        let mut batteries = manager
            .batteries()
            .map_err(|e| BarikError::Battery(format!("Failed to list batteries: {e}")))?;

        match batteries.next() {
            Some(battery) => {
                let battery =
                    battery.map_err(|e| BarikError::Battery(format!("Failed to read battery: {e}")))?;
                let mut status = BatteryStatus::from(&battery);
                status.is_plugged_in = plugged_in(status.state, external_power());
                Ok(status)
            }
            None => Ok(BatteryStatus::default()),
        }
    }
}

/// Power source named on the first line of `pmset -g batt`, e.g.
/// `Now drawing from 'AC Power'`. `Some(true)` means external power.
#[must_use]
pub fn parse_power_source(pmset: &str) -> Option<bool> {
    let source = pmset.lines().next()?.split('\'').nth(1)?;
    match source {
        "AC Power" | "UPS Power" => Some(true),
        "Battery Power" => Some(false),
        _ => None,
    }
}

/// Whether the machine runs on external power. Without a power source
/// reading, only charging or full count.
#[must_use]
pub fn plugged_in(state: BatteryState, on_external_power: Option<bool>) -> bool {
    on_external_power.unwrap_or(matches!(state, BatteryState::Charging | BatteryState::Full))
}

fn external_power() -> Option<bool> {
    match run_binary("pmset", &["-g", "batt"]) {
        Ok(output) => parse_power_source(&output),
        Err(err) => {
            tracing::debug!(error = %err, "power source unavailable");
            None
        }
    }
}

// Value is clamped to 0..=100, so casting is safe for pedantic clippy settings.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentage_from_ratio(value: f32) -> u8 { value.round().clamp(0.0, 100.0) as u8 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_from_ratio_clamps_and_rounds() {
        assert_eq!(percentage_from_ratio(-10.0), 0);
        assert_eq!(percentage_from_ratio(49.4), 49);
        assert_eq!(percentage_from_ratio(49.5), 50);
        assert_eq!(percentage_from_ratio(150.0), 100);
    }

    #[test]
    fn battery_state_maps_every_variant() {
        assert_eq!(BatteryState::from(State::Charging), BatteryState::Charging);
        assert_eq!(BatteryState::from(State::Discharging), BatteryState::Discharging);
        assert_eq!(BatteryState::from(State::Empty), BatteryState::Empty);
        assert_eq!(BatteryState::from(State::Full), BatteryState::Full);
        assert_eq!(BatteryState::from(State::Unknown), BatteryState::Unknown);
    }

    #[test]
    fn default_status_is_empty_and_unplugged() {
        let status = BatteryStatus::default();
        assert_eq!(status.level, 0);
        assert!(!status.is_plugged_in);
        assert_eq!(status.state, BatteryState::Unknown);
    }

    #[test]
    fn status_serializes_camel_case() {
        let json = serde_json::to_value(BatteryStatus {
            level: 80,
            is_charging: true,
            is_plugged_in: true,
            state: BatteryState::Charging,
            ..BatteryStatus::default()
        })
        .unwrap();
        assert_eq!(json["isPluggedIn"], true);
        assert_eq!(json["state"], "charging");
        assert!(json["timeToEmpty"].is_null());
    }

    #[test]
    fn power_source_reads_the_first_line() {
        let ac = "Now drawing from 'AC Power'\n -InternalBattery-0 (id=4653155)\t80%; charged; 0:00 remaining present: true\n";
        let battery = "Now drawing from 'Battery Power'\n -InternalBattery-0 (id=4653155)\t64%; discharging; 4:12 remaining\n";
        assert_eq!(parse_power_source(ac), Some(true));
        assert_eq!(parse_power_source(battery), Some(false));
        assert_eq!(parse_power_source(""), None);
        assert_eq!(parse_power_source("No batteries available"), None);
    }

    #[test]
    fn external_power_counts_when_not_charging() {
        assert!(plugged_in(BatteryState::Unknown, Some(true)));
        assert!(plugged_in(BatteryState::Discharging, Some(true)));
        assert!(!plugged_in(BatteryState::Full, Some(false)));

        assert!(plugged_in(BatteryState::Charging, None));
        assert!(plugged_in(BatteryState::Full, None));
        assert!(!plugged_in(BatteryState::Unknown, None));
    }
}
