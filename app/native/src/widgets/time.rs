//! Clock widget.
//!
//! The source only publishes the current instant; each displayed `default.time`
//! item formats it with its own resolved `format` and `time-zone` keys.
//! Formats use the `DateFormatter` pattern syntax (`E d, J:mm`), which is
//! translated to chrono's strftime items.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::{ConfigData, WidgetParams};
use crate::error::Result;
use crate::performance::Metric;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

/// Format used when a time widget has none configured.
pub const DEFAULT_TIME_FORMAT: &str = "E d, J:mm";

/// Translates a `DateFormatter` pattern into a strftime string.
///
/// Quoted text (`'at'`) is literal and `''` is a single quote. Letters without
/// a strftime equivalent are kept as literal text.
#[must_use]
pub fn convert_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];

        if ch == '\'' {
            if chars.get(index + 1) == Some(&'\'') {
                out.push('\'');
                index += 2;
                continue;
            }
            index += 1;
            while index < chars.len() {
                match chars[index] {
                    '\'' if chars.get(index + 1) == Some(&'\'') => {
                        out.push('\'');
                        index += 2;
                    }
                    '\'' => {
                        index += 1;
                        break;
                    }
                    literal => {
                        push_literal(&mut out, literal);
                        index += 1;
                    }
                }
            }
            continue;
        }

        if !ch.is_ascii_alphabetic() {
            push_literal(&mut out, ch);
            index += 1;
            continue;
        }

        let run = chars[index..].iter().take_while(|c| **c == ch).count();
        match field(ch, run) {
            Some(item) => out.push_str(item),
            None => (0..run).for_each(|_| out.push(ch)),
        }
        index += run;
    }

    out
}

fn push_literal(out: &mut String, ch: char) {
    if ch == '%' {
        out.push_str("%%");
    } else {
        out.push(ch);
    }
}

/// strftime item of one pattern field.
const fn field(letter: char, width: usize) -> Option<&'static str> {
    let item = match (letter, width) {
        ('E', 1..=3) | ('E', 5..) => "%a",
        ('E', 4) => "%A",
        ('d', 1) => "%-d",
        ('d', _) => "%d",
        ('M', 1) => "%-m",
        ('M', 2) => "%m",
        ('M', 3) => "%b",
        ('M', _) => "%B",
        ('y', 2) => "%y",
        ('y', _) => "%Y",
        // `J` and `j` are the locale hour cycle; 24 hours without a day period.
        ('H' | 'J' | 'j', 1) => "%-H",
        ('H' | 'J' | 'j', _) => "%H",
        ('h', 1) => "%-I",
        ('h', _) => "%I",
        ('m', 1) => "%-M",
        ('m', _) => "%M",
        ('s', 1) => "%-S",
        ('s', _) => "%S",
        ('a', _) => "%p",
        ('z', _) => "%Z",
        ('Z', _) => "%z",
        _ => return None,
    };
    Some(item)
}

/// Settings of one time widget occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSettings {
    pub format: String,
    /// `None` uses the system time zone.
    pub time_zone: Option<Tz>,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            format: DEFAULT_TIME_FORMAT.to_string(),
            time_zone: None,
        }
    }
}

impl TimeSettings {
    /// Reads `format` and `time-zone`. An unknown zone falls back to local time.
    #[must_use]
    pub fn from_params(params: &ConfigData) -> Self {
        let params = WidgetParams(params);
        let time_zone = params.str("time-zone").and_then(|name| match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(err) => {
                tracing::warn!(time_zone = name, error = %err, "unknown time zone, using local time");
                None
            }
        });

        Self {
            format: params.str("format").unwrap_or(DEFAULT_TIME_FORMAT).to_string(),
            time_zone,
        }
    }

    /// Formats `now` with these settings.
    #[must_use]
    pub fn format(&self, now: DateTime<Utc>) -> String { format_time(now, &self.format, self.time_zone) }
}

/// Formats `now` with a `DateFormatter` pattern in `time_zone` (or local time).
#[must_use]
pub fn format_time(now: DateTime<Utc>, pattern: &str, time_zone: Option<Tz>) -> String {
    let strftime = convert_pattern(pattern);
    let mut out = String::new();

    let written = match time_zone {
        Some(tz) => write!(out, "{}", now.with_timezone(&tz).format(&strftime)),
        None => write!(out, "{}", now.with_timezone(&Local).format(&strftime)),
    };

    if written.is_err() {
        tracing::debug!(pattern, "unsupported time format");
        return pattern.to_string();
    }
    out
}

/// Published clock state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeState {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl TimeState {
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> { DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default() }
}

/// Samples the wall clock.
#[derive(Debug, Default)]
pub struct TimeSource;

impl MetricSource for TimeSource {
    type State = TimeState;

    const METRIC: Metric = Metric::Time;
    const WIDGET_IDS: &'static [&'static str] = &[ids::TIME];

    fn poll(&mut self) -> Result<TimeState> {
        Ok(TimeState {
            timestamp: Utc::now().timestamp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn instant() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap() }

    #[test]
    fn converts_default_pattern() {
        assert_eq!(convert_pattern("E d, J:mm"), "%a %-d, %-H:%M");
        assert_eq!(convert_pattern("hh:mm a"), "%I:%M %p");
        assert_eq!(convert_pattern("EEEE, MMMM d yyyy"), "%A, %B %-d %Y");
    }

    #[test]
    fn quoted_text_is_literal() {
        assert_eq!(convert_pattern("'at' HH:mm"), "at %H:%M");
        assert_eq!(convert_pattern("h 'o''clock'"), "%-I o'clock");
        assert_eq!(convert_pattern("HH'h'mm 100%"), "%Hh%M 100%%");
    }

    #[test]
    fn formats_in_requested_zone() {
        let paris: Tz = "Europe/Paris".parse().unwrap();
        assert_eq!(format_time(instant(), "E d, J:mm", Some(paris)), "Fri 7, 15:05");
        assert_eq!(format_time(instant(), "hh:mm:ss a", Some(Tz::UTC)), "02:05:09 PM");
    }

    #[test]
    fn settings_read_format_and_zone() {
        let params: ConfigData =
            toml::from_str("format = \"HH:mm\"\ntime-zone = \"America/Los_Angeles\"").unwrap();
        let settings = TimeSettings::from_params(&params);
        assert_eq!(settings.format, "HH:mm");
        assert_eq!(settings.time_zone, Some(chrono_tz::America::Los_Angeles));
        assert_eq!(settings.format(instant()), "06:05");
    }

    #[test]
    fn unknown_zone_falls_back_to_local() {
        let params: ConfigData = toml::from_str("time-zone = \"Mars/Olympus\"").unwrap();
        let settings = TimeSettings::from_params(&params);
        assert_eq!(settings.time_zone, None);
        assert_eq!(settings.format, DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn state_round_trips_timestamp() {
        let state = TimeState {
            timestamp: instant().timestamp(),
        };
        assert_eq!(state.now(), instant());
    }
}
