//! Output volume and mute state.
//!
//! Volume and mute are read and written through the Standard Additions volume
//! commands; the default output device name comes from `CoreAudio`.

use serde::Serialize;

use crate::error::{BarikError, Result};
use crate::performance::Metric;
use crate::utils::command::run_osascript;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

/// Published volume state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStatus {
    /// Output volume in `0.0..=1.0`.
    pub level: f32,
    pub is_muted: bool,
    pub device_name: Option<String>,
}

/// Parses `get volume settings`, e.g.
/// `output volume:44, input volume:50, alert volume:100, output muted:false`.
///
/// Returns `(level, muted)`. Devices without a volume control report
/// `missing value` and parse as full volume.
///
/// # Errors
///
/// Returns [`BarikError::Decode`] when the output has no output fields.
pub fn parse_volume_settings(output: &str) -> Result<(f32, bool)> {
    let mut level = None;
    let mut muted = None;

    for field in output.split(',') {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        match key.trim() {
            "output volume" => {
                level = Some(value.trim().parse::<f32>().map_or(1.0, |v| (v / 100.0).clamp(0.0, 1.0)));
            }
            "output muted" => muted = Some(value.trim() == "true"),
            _ => {}
        }
    }

    match (level, muted) {
        (Some(level), muted) => Ok((level, muted.unwrap_or(false))),
        _ => Err(BarikError::Decode(format!("unexpected volume settings '{}'", output.trim()))),
    }
}

/// Name of the default output device.
#[cfg(target_os = "macos")]
#[must_use]
pub fn default_output_device_name() -> Option<String> {
    use coreaudio::audio_unit::macos_helpers::{get_default_device_id, get_device_name};

    get_default_device_id(false).and_then(|id| get_device_name(id).ok())
}

#[cfg(not(target_os = "macos"))]
#[must_use]
pub const fn default_output_device_name() -> Option<String> { None }

/// Polls the system volume.
#[derive(Debug, Default)]
pub struct AudioSource;

impl MetricSource for AudioSource {
    type State = VolumeStatus;

    const METRIC: Metric = Metric::Audio;
    const WIDGET_IDS: &'static [&'static str] = &[ids::VOLUME];

    fn poll(&mut self) -> Result<VolumeStatus> {
        let output = run_osascript("get volume settings")
            .map_err(|err| BarikError::Audio(err.to_string()))?;
        let (level, is_muted) = parse_volume_settings(&output)?;

        Ok(VolumeStatus {
            level,
            is_muted,
            device_name: default_output_device_name(),
        })
    }
}

/// Sets the output volume; `level` is clamped to `0.0..=1.0`.
///
/// # Errors
///
/// Returns [`BarikError::Audio`] when the script fails.
pub fn set_volume(level: f32) -> Result<()> {
    let percent = volume_percent(level);
    run_osascript(&format!("set volume output volume {percent}"))
        .map_err(|err| BarikError::Audio(err.to_string()))?;
    tracing::debug!(percent, "output volume set");
    Ok(())
}

/// Mutes or unmutes the output.
///
/// # Errors
///
/// Returns [`BarikError::Audio`] when the script fails.
pub fn set_muted(muted: bool) -> Result<()> {
    run_osascript(&format!("set volume output muted {muted}"))
        .map_err(|err| BarikError::Audio(err.to_string()))?;
    tracing::debug!(muted, "output mute set");
    Ok(())
}

// Clamped to 0..=100 before the cast.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn volume_percent(level: f32) -> u8 {
    let level = if level.is_nan() { 0.0 } else { level };
    (level.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_volume_settings() {
        let (level, muted) =
            parse_volume_settings("output volume:44, input volume:50, alert volume:100, output muted:false")
                .unwrap();
        assert!((level - 0.44).abs() < 1e-6);
        assert!(!muted);
    }

    #[test]
    fn parses_muted_output() {
        let (_, muted) =
            parse_volume_settings("output volume:0, input volume:50, alert volume:100, output muted:true")
                .unwrap();
        assert!(muted);
    }

    #[test]
    fn missing_value_means_full_volume() {
        let (level, muted) = parse_volume_settings(
            "output volume:missing value, input volume:missing value, alert volume:100, output muted:missing value",
        )
        .unwrap();
        assert!((level - 1.0).abs() < f32::EPSILON);
        assert!(!muted);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(parse_volume_settings("execution error"), Err(BarikError::Decode(_))));
    }

    #[test]
    fn volume_percent_is_clamped() {
        assert_eq!(volume_percent(0.5), 50);
        assert_eq!(volume_percent(1.7), 100);
        assert_eq!(volume_percent(-0.2), 0);
        assert_eq!(volume_percent(f32::NAN), 0);
    }
}
