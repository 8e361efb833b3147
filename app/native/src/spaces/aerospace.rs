use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Space, SpacesProvider, Window};
use crate::error::{BarikError, Result};
use crate::utils::command::{resolve_tool, run};

const WINDOW_FORMAT: &str = "%{window-id} %{app-name} %{window-title} %{workspace}";

/// Entry of `aerospace list-workspaces --json`.
#[derive(Debug, Clone, Deserialize)]
pub struct AeroWorkspace {
    pub workspace: String,
}

/// Entry of `aerospace list-windows --json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AeroWindow {
    pub window_id: i64,
    #[serde(default)]
    pub window_title: String,
    pub app_name: Option<String>,
    pub workspace: Option<String>,
}

/// Builds the space tree from the AeroSpace listings.
///
/// The listings carry no focus flags, so the focused workspace and window are
/// passed in separately. Windows without a workspace land on the focused one.
#[must_use]
pub fn merge(
    workspaces: Vec<AeroWorkspace>,
    windows: Vec<AeroWindow>,
    focused_workspace: Option<&str>,
    focused_window: Option<i64>,
) -> Vec<Space> {
    let order: Vec<String> = workspaces.into_iter().map(|w| w.workspace).collect();
    let mut members: HashMap<&str, Vec<Window>> = order.iter().map(|id| (id.as_str(), Vec::new())).collect();

    for window in windows {
        let target = window.workspace.as_deref().filter(|ws| !ws.is_empty()).or(focused_workspace);
        let Some(bucket) = target.and_then(|ws| members.get_mut(ws)) else {
            continue;
        };
        bucket.push(Window {
            id: window.window_id,
            is_focused: focused_window == Some(window.window_id),
            title: window.window_title,
            app_name: window.app_name,
            app_path: None,
        });
    }

    order
        .iter()
        .filter_map(|id| {
            let mut windows = members.remove(id.as_str())?;
            if windows.is_empty() {
                return None;
            }
            windows.sort_by_key(|window| window.id);
            Some(Space {
                id: id.clone(),
                is_focused: focused_workspace == Some(id.as_str()),
                windows,
            })
        })
        .collect()
}

/// Reads and switches spaces through the `aerospace` CLI.
#[derive(Debug, Clone)]
pub struct AerospaceProvider {
    path: PathBuf,
}

impl AerospaceProvider {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self { Self { path } }

    fn command(&self, args: &[&str]) -> Result<String> {
        let binary = resolve_tool(&self.path)?;
        run(&binary, args)
    }

    fn list<T: DeserializeOwned>(&self, args: &[&str]) -> Result<Vec<T>> {
        let output = self.command(args)?;
        serde_json::from_str(&output)
            .map_err(|err| BarikError::Decode(format!("aerospace {}: {err}", args.join(" "))))
    }

    fn focused_workspace(&self) -> Option<String> {
        self.list::<AeroWorkspace>(&["list-workspaces", "--focused", "--json"])
            .ok()?
            .into_iter()
            .next()
            .map(|w| w.workspace)
    }

    fn focused_window(&self) -> Option<i64> {
        self.list::<AeroWindow>(&["list-windows", "--focused", "--json"])
            .ok()?
            .first()
            .map(|w| w.window_id)
    }
}

impl SpacesProvider for AerospaceProvider {
    fn fetch(&self) -> Result<Vec<Space>> {
        let workspaces = self.list(&["list-workspaces", "--all", "--json"])?;
        let windows = self.list(&["list-windows", "--all", "--json", "--format", WINDOW_FORMAT])?;
        let focused_workspace = self.focused_workspace();
        let focused_window = self.focused_window();

        Ok(merge(workspaces, windows, focused_workspace.as_deref(), focused_window))
    }

    fn focus_space(&self, space_id: &str, need_window_focus: bool) -> Result<()> {
        self.command(&["workspace", space_id])?;
        if need_window_focus {
            let windows =
                self.list::<AeroWindow>(&["list-windows", "--workspace", space_id, "--json"])?;
            if let Some(first) = windows.iter().map(|w| w.window_id).min() {
                self.focus_window(first)?;
            }
        }
        Ok(())
    }

    fn focus_window(&self, window_id: i64) -> Result<()> {
        self.command(&["focus", "--window-id", &window_id.to_string()])?;
        Ok(())
    }

    fn supports_focus(&self) -> bool { true }
}
