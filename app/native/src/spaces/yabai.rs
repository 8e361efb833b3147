use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use super::{Space, SpacesProvider, Window};
use crate::error::{BarikError, Result};
use crate::utils::command::{resolve_tool, run};

/// Entry of `yabai -m query --spaces`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct YabaiSpace {
    pub index: i64,
    #[serde(default)]
    pub has_focus: bool,
}

/// Entry of `yabai -m query --windows`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct YabaiWindow {
    pub id: i64,
    pub space: i64,
    #[serde(default = "unnamed")]
    pub title: String,
    pub app: Option<String>,
    #[serde(default)]
    pub has_focus: bool,
    #[serde(default)]
    pub stack_index: i64,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_floating: bool,
    #[serde(default)]
    pub is_sticky: bool,
}

fn unnamed() -> String { "Unnamed".to_string() }

/// Groups tiled windows under their space.
///
/// Hidden, floating and sticky windows are skipped, as are windows whose space
/// is unknown. Windows are ordered by stack index and empty spaces are dropped.
#[must_use]
pub fn merge(spaces: Vec<YabaiSpace>, windows: Vec<YabaiWindow>) -> Vec<Space> {
    let mut grouped: BTreeMap<i64, (YabaiSpace, Vec<YabaiWindow>)> =
        spaces.into_iter().map(|space| (space.index, (space, Vec::new()))).collect();

    for window in windows {
        if window.is_hidden || window.is_floating || window.is_sticky {
            continue;
        }
        if let Some((_, members)) = grouped.get_mut(&window.space) {
            members.push(window);
        }
    }

    grouped
        .into_values()
        .filter(|(_, windows)| !windows.is_empty())
        .map(|(space, mut windows)| {
            windows.sort_by_key(|window| window.stack_index);
            Space {
                id: space.index.to_string(),
                is_focused: space.has_focus,
                windows: windows
                    .into_iter()
                    .map(|window| Window {
                        id: window.id,
                        title: window.title,
                        app_name: window.app,
                        is_focused: window.has_focus,
                        app_path: None,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Reads spaces from yabai. Focus switching is not offered.
#[derive(Debug, Clone)]
pub struct YabaiProvider {
    path: PathBuf,
}

impl YabaiProvider {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self { Self { path } }

    fn query<T: serde::de::DeserializeOwned>(&self, domain: &str) -> Result<T> {
        let binary = resolve_tool(&self.path)?;
        let output = run(&binary, &["-m", "query", domain])?;
        serde_json::from_str(&output)
            .map_err(|err| BarikError::Decode(format!("yabai {domain}: {err}")))
    }
}

impl SpacesProvider for YabaiProvider {
    fn fetch(&self) -> Result<Vec<Space>> {
        let spaces = self.query("--spaces")?;
        let windows = self.query("--windows")?;
        Ok(merge(spaces, windows))
    }

    fn focus_space(&self, _space_id: &str, _need_window_focus: bool) -> Result<()> {
        Err(BarikError::Command("yabai does not support focus switching".to_string()))
    }

    fn focus_window(&self, _window_id: i64) -> Result<()> {
        Err(BarikError::Command("yabai does not support focus switching".to_string()))
    }

    fn supports_focus(&self) -> bool { false }
}
