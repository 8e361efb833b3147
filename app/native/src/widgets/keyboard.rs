//! Keyboard input source.
//!
//! Reads the HIToolbox defaults domain, which lists the selected and enabled
//! input sources as an old-style property list.

use serde::Serialize;

use crate::error::{BarikError, Result};
use crate::performance::Metric;
use crate::utils::command::run_binary;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

const HITOOLBOX_DOMAIN: &str = "com.apple.HIToolbox";

/// One entry of an input source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    pub kind: String,
    /// Layout name (`U.S.`) or input mode id.
    pub name: String,
}

/// Published keyboard state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardLayout {
    /// Short label shown in the bar.
    pub current: String,
    pub current_name: String,
    pub available: Vec<String>,
}

/// Parses `defaults read com.apple.HIToolbox <key>` output.
///
/// Only keyboard layouts and input modes are returned; palettes and press-and-hold
/// entries are skipped.
#[must_use]
pub fn parse_input_sources(output: &str) -> Vec<InputSource> {
    let mut sources = Vec::new();
    let mut kind: Option<String> = None;
    let mut layout: Option<String> = None;
    let mut mode: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if line.starts_with('}') {
            let name = layout.take().or_else(|| mode.take());
            mode = None;
            if let (Some(kind), Some(name)) = (kind.take(), name)
                && (kind == "Keyboard Layout" || kind == "Input Mode")
            {
                sources.push(InputSource { kind, name });
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = unquote(key.trim());
        let value = unquote(value.trim().trim_end_matches(';').trim());

        match key {
            "InputSourceKind" => kind = Some(value.to_string()),
            "KeyboardLayout Name" => layout = Some(value.to_string()),
            "Input Mode" => mode = Some(value.to_string()),
            _ => {}
        }
    }

    sources
}

fn unquote(value: &str) -> &str { value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value) }

/// Compact label of an input source name.
#[must_use]
pub fn abbreviate(name: &str) -> String {
    const LABELS: [(&str, &str); 13] = [
        ("english", "EN"),
        ("spanish", "ES"),
        ("french", "FR"),
        ("german", "DE"),
        ("italian", "IT"),
        ("portuguese", "PT"),
        ("russian", "RU"),
        ("chinese", "中文"),
        ("japanese", "日本語"),
        ("korean", "한국어"),
        ("arabic", "العربية"),
        ("emoji", "😀"),
        ("symbol", "⌘"),
    ];

    let lower = name.to_lowercase();
    LABELS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or_else(|| name.chars().take(3).collect::<String>().to_uppercase(), |(_, label)| (*label).to_string())
}

/// Polls the HIToolbox defaults.
#[derive(Debug, Default)]
pub struct KeyboardSource;

impl MetricSource for KeyboardSource {
    type State = KeyboardLayout;

    const METRIC: Metric = Metric::Keyboard;
    const WIDGET_IDS: &'static [&'static str] = &[ids::KEYBOARD];

    fn poll(&mut self) -> Result<KeyboardLayout> {
        let selected = run_binary("defaults", &["read", HITOOLBOX_DOMAIN, "AppleSelectedInputSources"])?;
        let current = parse_input_sources(&selected)
            .into_iter()
            .next()
            .ok_or_else(|| BarikError::Decode("no selected keyboard input source".to_string()))?;

        let available = match run_binary("defaults", &["read", HITOOLBOX_DOMAIN, "AppleEnabledInputSources"]) {
            Ok(output) => parse_input_sources(&output).into_iter().map(|source| source.name).collect(),
            Err(err) => {
                tracing::debug!(error = %err, "failed to read enabled input sources");
                Vec::new()
            }
        };

        Ok(KeyboardLayout {
            current: abbreviate(&current.name),
            current_name: current.name,
            available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTED: &str = r#"(
        {
        InputSourceKind = "Keyboard Layout";
        "KeyboardLayout ID" = 19458;
        "KeyboardLayout Name" = "Russian - PC";
    },
        {
        "Bundle ID" = "com.apple.PressAndHold";
        InputSourceKind = "Non Keyboard Input Method";
    }
)"#;

    const ENABLED: &str = r#"(
        {
        InputSourceKind = "Keyboard Layout";
        "KeyboardLayout ID" = 0;
        "KeyboardLayout Name" = "U.S.";
    },
        {
        "Bundle ID" = "com.apple.inputmethod.Kotoeri.RomajiTyping";
        "Input Mode" = "com.apple.inputmethod.Japanese";
        InputSourceKind = "Input Mode";
    },
        {
        "Bundle ID" = "com.apple.CharacterPaletteIM";
        InputSourceKind = "Non Keyboard Input Method";
    }
)"#;

    #[test]
    fn parses_selected_layout() {
        let sources = parse_input_sources(SELECTED);
        assert_eq!(sources, vec![InputSource {
            kind: "Keyboard Layout".into(),
            name: "Russian - PC".into()
        }]);
    }

    #[test]
    fn parses_layouts_and_input_modes() {
        let names: Vec<String> =
            parse_input_sources(ENABLED).into_iter().map(|source| source.name).collect();
        assert_eq!(names, ["U.S.", "com.apple.inputmethod.Japanese"]);
    }

    #[test]
    fn abbreviates_known_languages() {
        assert_eq!(abbreviate("Russian - PC"), "RU");
        assert_eq!(abbreviate("British English"), "EN");
        assert_eq!(abbreviate("com.apple.inputmethod.Japanese"), "日本語");
        assert_eq!(abbreviate("Emoji & Symbols"), "😀");
    }

    #[test]
    fn unknown_names_use_first_three_letters() {
        assert_eq!(abbreviate("Dvorak"), "DVO");
        assert_eq!(abbreviate("U.S."), "U.S");
        assert_eq!(abbreviate("ab"), "AB");
    }
}
