//! Configuration types for Barik.
//!
//! The file is TOML. Widget parameter tables are kept as untyped
//! [`ConfigData`] because each widget reads its own keys; everything the app
//! shell needs (theme, tool paths, background, displayed list) is typed.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::tools::{AEROSPACE_DEFAULT_PATH, YABAI_DEFAULT_PATH};
use crate::utils::path::tool_path;

/// Untyped parameter table of one widget.
pub type ConfigData = toml::Table;

// ============================================================================
// Root document
// ============================================================================

/// Top-level layout of the config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RootToml {
    pub theme: Option<Theme>,
    pub yabai: ToolConfig,
    pub aerospace: ToolConfig,
    pub background: BackgroundConfig,
    pub widgets: WidgetsSection,
    pub popup: ConfigData,
}

/// Color scheme of the bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Follow the system appearance.
    System,
    #[default]
    Light,
    Dark,
}

/// Location override of an external tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub path: Option<String>,
}

impl ToolConfig {
    /// Configured path with `~` expanded, or `default`.
    #[must_use]
    pub fn resolved_path(&self, default: &str) -> PathBuf { tool_path(self.path.as_deref(), default) }
}

/// Bar background.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub enabled: bool,
    pub height: BarHeight,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            height: BarHeight::MenuBar,
        }
    }
}

/// Background height: a number of points or the system menu-bar height.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum BarHeight {
    /// `"menu-bar"`.
    #[default]
    MenuBar,
    Points(f64),
}

impl BarHeight {
    /// Height in points, using `menu_bar_height` for [`BarHeight::MenuBar`].
    #[must_use]
    pub const fn resolve(self, menu_bar_height: f64) -> f64 {
        match self {
            Self::MenuBar => menu_bar_height,
            Self::Points(points) => points,
        }
    }
}

impl<'de> Deserialize<'de> for BarHeight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Float(f64),
            Integer(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Float(points) => Ok(Self::Points(points)),
            #[allow(clippy::cast_precision_loss)]
            Raw::Integer(points) => Ok(Self::Points(points as f64)),
            Raw::Text(text) if text == "menu-bar" => Ok(Self::MenuBar),
            Raw::Text(text) => Err(serde::de::Error::custom(format!(
                "invalid background height '{text}', expected a number or \"menu-bar\""
            ))),
        }
    }
}

impl Serialize for BarHeight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::MenuBar => serializer.serialize_str("menu-bar"),
            Self::Points(points) => serializer.serialize_f64(*points),
        }
    }
}

// ============================================================================
// Widgets
// ============================================================================

/// One entry of `widgets.displayed`.
///
/// Either a bare id (`"default.battery"`) or a single-key inline table
/// (`{ "default.time" = { format = "HH:mm" } }`).
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetItem {
    pub id: String,
    pub inline_params: ConfigData,
}

impl WidgetItem {
    /// Item without inline parameters.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inline_params: ConfigData::new(),
        }
    }

    fn from_value(value: toml::Value) -> Result<Self, String> {
        match value {
            toml::Value::String(id) => Ok(Self::new(id)),
            toml::Value::Table(table) => {
                if table.len() != 1 {
                    return Err(format!(
                        "inline widget entry must have exactly one key, found {}",
                        table.len()
                    ));
                }
                let Some((id, params)) = table.into_iter().next() else {
                    return Err("inline widget entry is empty".to_string());
                };
                match params {
                    toml::Value::Table(inline_params) => Ok(Self { id, inline_params }),
                    other => Err(format!(
                        "parameters of '{id}' must be a table, found {}",
                        other.type_str()
                    )),
                }
            }
            other => Err(format!(
                "widget entry must be a string or an inline table, found {}",
                other.type_str()
            )),
        }
    }
}

impl<'de> Deserialize<'de> for WidgetItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = toml::Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for WidgetItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.inline_params.is_empty() {
            return serializer.serialize_str(&self.id);
        }
        let mut table = ConfigData::new();
        table.insert(self.id.clone(), toml::Value::Table(self.inline_params.clone()));
        table.serialize(serializer)
    }
}

/// The `[widgets]` table: the displayed list plus per-widget default tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetsSection {
    pub displayed: Vec<WidgetItem>,
    /// Every other key of `[widgets]`, i.e. the `<namespace>.<id>` tables.
    pub others: ConfigData,
}

impl WidgetsSection {
    /// Global parameter table of a widget id, walking the dotted path.
    ///
    /// `default.spaces` resolves to `[widgets.default.spaces]`.
    #[must_use]
    pub fn config_for(&self, widget_id: &str) -> Option<&ConfigData> { lookup_table(&self.others, widget_id) }
}

impl<'de> Deserialize<'de> for WidgetsSection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut others = ConfigData::deserialize(deserializer)?;
        let displayed = match others.remove("displayed") {
            Some(toml::Value::Array(items)) => items
                .into_iter()
                .map(WidgetItem::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map_err(serde::de::Error::custom)?,
            Some(other) => {
                return Err(serde::de::Error::custom(format!(
                    "widgets.displayed must be an array, found {}",
                    other.type_str()
                )));
            }
            None => Vec::new(),
        };

        Ok(Self { displayed, others })
    }
}

impl Serialize for WidgetsSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.others.len() + 1))?;
        map.serialize_entry("displayed", &self.displayed)?;
        for (key, value) in &self.others {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Walks a dotted path of nested tables.
fn lookup_table<'a>(root: &'a ConfigData, dotted: &str) -> Option<&'a ConfigData> {
    dotted.split('.').try_fold(root, |table, segment| table.get(segment)?.as_table())
}

// ============================================================================
// Popup variants
// ============================================================================

/// Layout variant of a widget popup, stored as `popup.<id>.view-variant`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupVariant {
    #[default]
    Box,
    Vertical,
    Horizontal,
    Settings,
}

impl PopupVariant {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Vertical => "vertical",
            Self::Horizontal => "horizontal",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for PopupVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PopupVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "box" => Ok(Self::Box),
            "vertical" => Ok(Self::Vertical),
            "horizontal" => Ok(Self::Horizontal),
            "settings" => Ok(Self::Settings),
            other => Err(format!("unknown popup variant '{other}'")),
        }
    }
}

// ============================================================================
// Parsed configuration
// ============================================================================

/// A parsed configuration snapshot. Rebuilt wholesale on every reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub root: RootToml,
}

impl Config {
    /// Parses config file contents.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed documents or invalid widget entries.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let root: RootToml = toml::from_str(content)?;
        Ok(Self { root })
    }

    /// Selected theme (`light` when unset).
    #[must_use]
    pub fn theme(&self) -> Theme { self.root.theme.unwrap_or_default() }

    /// Widgets in display order.
    #[must_use]
    pub fn displayed(&self) -> &[WidgetItem] { &self.root.widgets.displayed }

    /// Global parameter table of a widget (empty when absent).
    #[must_use]
    pub fn global_widget_config(&self, widget_id: &str) -> ConfigData {
        self.root.widgets.config_for(widget_id).cloned().unwrap_or_default()
    }

    /// Global parameters overlaid by inline parameters, key by key.
    #[must_use]
    pub fn resolved_config(&self, widget_id: &str, inline: &ConfigData) -> ConfigData {
        let mut merged = self.global_widget_config(widget_id);
        for (key, value) in inline {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Resolved parameters of one displayed item.
    #[must_use]
    pub fn resolved_item_config(&self, item: &WidgetItem) -> ConfigData {
        self.resolved_config(&item.id, &item.inline_params)
    }

    /// Popup table of a widget, e.g. `[popup.default.time]`.
    #[must_use]
    pub fn popup_config(&self, widget_id: &str) -> Option<&ConfigData> { lookup_table(&self.root.popup, widget_id) }

    /// Popup layout variant of a widget (`box` when unset or invalid).
    #[must_use]
    pub fn popup_variant(&self, widget_id: &str) -> PopupVariant {
        self.popup_config(widget_id)
            .and_then(|table| table.get("view-variant"))
            .and_then(toml::Value::as_str)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Path of the yabai binary.
    #[must_use]
    pub fn yabai_path(&self) -> PathBuf { self.root.yabai.resolved_path(YABAI_DEFAULT_PATH) }

    /// Path of the AeroSpace binary.
    #[must_use]
    pub fn aerospace_path(&self) -> PathBuf { self.root.aerospace.resolved_path(AEROSPACE_DEFAULT_PATH) }
}

// ============================================================================
// Typed access to widget parameters
// ============================================================================

/// Read-only view over a resolved widget table with dotted-key lookups.
#[derive(Debug, Clone, Copy)]
pub struct WidgetParams<'a>(pub &'a ConfigData);

impl<'a> WidgetParams<'a> {
    /// Looks up `a.b.c` through nested tables.
    #[must_use]
    pub fn get(&self, dotted: &str) -> Option<&'a toml::Value> {
        let (parents, leaf) = dotted.rsplit_once('.').map_or((None, dotted), |(p, l)| (Some(p), l));
        let table = match parents {
            Some(parents) => lookup_table(self.0, parents)?,
            None => self.0,
        };
        table.get(leaf)
    }

    #[must_use]
    pub fn str(&self, dotted: &str) -> Option<&'a str> { self.get(dotted)?.as_str() }

    #[must_use]
    pub fn bool(&self, dotted: &str) -> Option<bool> { self.get(dotted)?.as_bool() }

    #[must_use]
    pub fn int(&self, dotted: &str) -> Option<i64> { self.get(dotted)?.as_integer() }

    /// String array, skipping non-string and empty entries.
    #[must_use]
    pub fn strings(&self, dotted: &str) -> Vec<String> {
        self.get(dotted)
            .and_then(toml::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(toml::Value::as_str)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(source: &str) -> ConfigData { toml::from_str(source).unwrap() }

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.theme(), Theme::Light);
        assert!(config.displayed().is_empty());
        assert!(config.root.background.enabled);
        assert_eq!(config.root.background.height, BarHeight::MenuBar);
        assert_eq!(config.yabai_path(), PathBuf::from(YABAI_DEFAULT_PATH));
    }

    #[test]
    fn displayed_accepts_ids_and_inline_tables() {
        let config = Config::parse(
            r#"
            [widgets]
            displayed = [
                "default.spaces",
                { "default.time" = { format = "HH:mm", time-zone = "Europe/Paris" } },
            ]
            "#,
        )
        .unwrap();

        let displayed = config.displayed();
        assert_eq!(displayed.len(), 2);
        assert_eq!(displayed[0], WidgetItem::new("default.spaces"));
        assert_eq!(displayed[1].id, "default.time");
        assert_eq!(displayed[1].inline_params.get("format").unwrap().as_str(), Some("HH:mm"));
    }

    #[test]
    fn inline_entry_with_two_keys_is_rejected() {
        let result = Config::parse(
            r#"
            [widgets]
            displayed = [{ "default.time" = {}, "default.battery" = {} }]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_ids_are_kept_verbatim() {
        let config = Config::parse("[widgets]\ndisplayed = [\"custom.weather\"]").unwrap();
        assert_eq!(config.displayed()[0].id, "custom.weather");
    }

    #[test]
    fn global_widget_config_walks_dotted_id() {
        let config = Config::parse(
            r"
            [widgets.default.spaces]
            space.show-key = true
            window.title.max-length = 50
            ",
        )
        .unwrap();

        let spaces = config.global_widget_config("default.spaces");
        let params = WidgetParams(&spaces);
        assert_eq!(params.bool("space.show-key"), Some(true));
        assert_eq!(params.int("window.title.max-length"), Some(50));
        assert!(config.global_widget_config("default.missing").is_empty());
    }

    #[test]
    fn resolved_config_prefers_inline_keys() {
        let config = Config::parse(
            r"
            [widgets.default.demo]
            a = 1
            b = 2
            ",
        )
        .unwrap();

        let resolved = config.resolved_config("default.demo", &table("b = 3\nc = 4"));
        assert_eq!(resolved, table("a = 1\nb = 3\nc = 4"));
    }

    #[test]
    fn background_height_accepts_number_or_menu_bar() {
        let config = Config::parse("[background]\nheight = 40.5").unwrap();
        assert_eq!(config.root.background.height, BarHeight::Points(40.5));

        let config = Config::parse("[background]\nheight = 32").unwrap();
        assert_eq!(config.root.background.height, BarHeight::Points(32.0));

        let config = Config::parse("[background]\nheight = \"menu-bar\"").unwrap();
        assert_eq!(config.root.background.height.resolve(55.0), 55.0);

        assert!(Config::parse("[background]\nheight = \"tall\"").is_err());
    }

    #[test]
    fn tool_paths_expand_tilde() {
        let config = Config::parse("[aerospace]\npath = \"~/bin/aerospace\"").unwrap();
        let path = config.aerospace_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("bin/aerospace"));
    }

    #[test]
    fn popup_variant_reads_nested_table() {
        let config = Config::parse("[popup.default.time]\nview-variant = \"vertical\"").unwrap();
        assert_eq!(config.popup_variant("default.time"), PopupVariant::Vertical);
        assert_eq!(config.popup_variant("default.battery"), PopupVariant::Box);
    }

    #[test]
    fn widget_params_strings_skip_empty_entries() {
        let data = table("calendar.allow-list = [\"Home\", \"\", \"Personal\"]");
        assert_eq!(WidgetParams(&data).strings("calendar.allow-list"), vec!["Home", "Personal"]);
        assert!(WidgetParams(&data).strings("calendar.deny-list").is_empty());
    }

    #[test]
    fn theme_parses_lowercase() {
        assert_eq!(Config::parse("theme = \"dark\"").unwrap().theme(), Theme::Dark);
        assert!(Config::parse("theme = \"neon\"").is_err());
    }

    #[test]
    fn displayed_items_serialize_back_to_toml_shapes() {
        let mut inline = ConfigData::new();
        inline.insert("format".into(), toml::Value::String("HH:mm".into()));
        let items = vec![
            WidgetItem::new("spacer"),
            WidgetItem {
                id: "default.time".into(),
                inline_params: inline,
            },
        ];
        let json = serde_json::to_value(&items).unwrap();
        assert_eq!(json[0], "spacer");
        assert_eq!(json[1]["default.time"]["format"], "HH:mm");
    }
}
