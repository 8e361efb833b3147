//! Commands acting on the running bar or the desktop.

use std::path::Path;

use clap::{Args, Subcommand};
use colored::Colorize;

use super::{query_bar, try_query_bar};
use crate::cli::output;
use crate::config::{Config, config_paths, read_config};
use crate::constants::APP_VERSION;
use crate::error::{BarikError, Result};
use crate::ipc::IpcQuery;
use crate::spaces::{active_provider, sort_spaces};
use crate::updater::VersionMarker;
use crate::widgets::now_playing::MediaAction;

/// Focus targets.
#[derive(Subcommand, Debug)]
pub enum FocusCommands {
    /// Switch to a space by id.
    Space {
        id: String,
        /// Also focus the first window of the space.
        #[arg(long)]
        focus_window: bool,
    },
    /// Focus a window by id.
    Window { id: i64 },
}

/// Volume changes; at least one flag is required.
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("change").required(true).multiple(true).args(["level", "mute", "unmute"])))]
pub struct VolumeArgs {
    /// Output volume in percent.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub level: Option<u8>,
    #[arg(long, conflicts_with = "unmute")]
    pub mute: bool,
    #[arg(long)]
    pub unmute: bool,
}

impl VolumeArgs {
    /// The IPC query for these flags.
    #[must_use]
    pub fn query(&self) -> IpcQuery {
        IpcQuery::Volume {
            level: self.level.map(|percent| f32::from(percent) / 100.0),
            muted: match (self.mute, self.unmute) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum BannerCommands {
    /// Hide the "what's new" banner until the next version.
    Dismiss,
}

/// Fetches the spaces straight from the window manager.
pub(super) fn print_spaces(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let provider = active_provider(&config)
        .ok_or_else(|| BarikError::Command("No supported window manager is running".to_string()))?;

    let mut spaces = provider.fetch()?;
    sort_spaces(&mut spaces);
    output::print_json(&serde_json::to_value(spaces)?);
    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = config_path
        .map(Path::to_path_buf)
        .or_else(|| config_paths().into_iter().find(|path| path.is_file()));

    match path {
        Some(path) => Ok(read_config(&path)?),
        None => Ok(Config::default()),
    }
}

pub(super) fn toggle_popup(id: &str) -> Result<()> {
    let open = query_bar(&IpcQuery::Popup { id: id.to_string(), anchor: None })?;
    match open.as_str() {
        Some(open) => println!("Popup {} opened", open.bold()),
        None => println!("Popup closed"),
    }
    Ok(())
}

pub(super) fn media(action: MediaAction) -> Result<()> {
    let app = query_bar(&IpcQuery::Media { action })?;
    if let Some(app) = app.as_str() {
        println!("Sent to {app}");
    }
    Ok(())
}

pub(super) fn volume(args: &VolumeArgs) -> Result<()> {
    query_bar(&args.query())?;
    Ok(())
}

pub(super) fn focus(cmd: &FocusCommands) -> Result<()> {
    let query = match cmd {
        FocusCommands::Space { id, focus_window } => IpcQuery::FocusSpace {
            id: id.clone(),
            need_window_focus: *focus_window,
        },
        FocusCommands::Window { id } => IpcQuery::FocusWindow { id: *id },
    };
    query_bar(&query)?;
    Ok(())
}

/// Dismisses through the bar when it runs, so its banner hides at once.
pub(super) fn banner(cmd: &BannerCommands) -> Result<()> {
    match cmd {
        BannerCommands::Dismiss => {
            if try_query_bar(&IpcQuery::DismissBanner)?.is_none() {
                VersionMarker::default().mark_current(APP_VERSION)?;
            }
            println!("Banner dismissed for {APP_VERSION}");
            Ok(())
        }
    }
}

pub(super) fn print_state() -> Result<()> {
    output::print_json(&query_bar(&IpcQuery::State)?);
    Ok(())
}

pub(super) fn reload() -> Result<()> {
    let path = query_bar(&IpcQuery::ReloadConfig)?;
    match path.as_str() {
        Some(path) => println!("Reloaded {path}"),
        None => println!("Reloaded"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::commands::{Cli, Commands};

    fn volume_query(args: &[&str]) -> Option<IpcQuery> {
        let mut argv = vec!["barik", "volume"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).ok()?.command {
            Some(Commands::Volume(args)) => Some(args.query()),
            _ => None,
        }
    }

    #[test]
    fn volume_percent_becomes_a_level() {
        assert_eq!(volume_query(&["--level", "40"]), Some(IpcQuery::Volume { level: Some(0.4), muted: None }));
        assert_eq!(
            volume_query(&["--level", "0", "--mute"]),
            Some(IpcQuery::Volume { level: Some(0.0), muted: Some(true) })
        );
        assert_eq!(volume_query(&["--unmute"]), Some(IpcQuery::Volume { level: None, muted: Some(false) }));
    }

    #[test]
    fn volume_needs_a_flag_in_range() {
        assert_eq!(volume_query(&[]), None);
        assert_eq!(volume_query(&["--level", "140"]), None);
        assert_eq!(volume_query(&["--mute", "--unmute"]), None);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "theme = \"dark\"\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().theme(), crate::config::Theme::Dark);
    }
}
