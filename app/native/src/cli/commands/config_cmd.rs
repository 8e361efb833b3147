//! Config CLI commands.
//!
//! Commands for managing the Barik configuration file.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use colored::Colorize;

use crate::cli::output;
use crate::config::template::{DEFAULT_CONFIG, create_config_file};
use crate::config::{Config, ConfigStore, config_paths, read_config};
use crate::error::{BarikError, Result};
use crate::events::EventBus;

/// Config management commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum ConfigCommands {
    /// Show the configuration search paths and which one is in use.
    Path,

    /// Write the default configuration file.
    #[command(after_long_help = r"Examples:
  barik config init              # Create ~/.barik-config.toml
  barik config init --force      # Overwrite an existing file
  barik config init --stdout     # Print the template")]
    Init {
        /// Overwrite the file if it exists.
        #[arg(long, short)]
        force: bool,

        /// Print the template instead of writing it.
        #[arg(long)]
        stdout: bool,
    },

    /// Set a string value, keeping comments and formatting.
    ///
    /// The key is dotted: `widgets.default.time.format`.
    Set { key: String, value: String },

    /// Print the parsed configuration.
    Show {
        /// Print JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
}

/// Execute config subcommands.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cmd: &ConfigCommands, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Path => {
            show_config_path(config_path);
            Ok(())
        }
        ConfigCommands::Init { force, stdout } => {
            if *stdout {
                print!("{DEFAULT_CONFIG}");
                Ok(())
            } else {
                init_config(*force, target_path(config_path)?)
            }
        }
        ConfigCommands::Set { key, value } => set_value(target_path(config_path)?, key, value),
        ConfigCommands::Show { json } => show_config(config_path, *json),
    }
}

/// `--config` when given, else the file in use, else the preferred location.
fn target_path(config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        return Ok(path.to_path_buf());
    }
    let paths = config_paths();
    paths
        .iter()
        .find(|path| path.is_file())
        .or_else(|| paths.first())
        .cloned()
        .ok_or_else(|| BarikError::Config("No home directory to place the configuration in".to_string()))
}

fn init_config(force: bool, path: PathBuf) -> Result<()> {
    if path.exists() && !force {
        return Err(BarikError::Config(format!(
            "Configuration file already exists at: {}\nUse --force to overwrite.",
            path.display()
        )));
    }

    create_config_file(&path)
        .map_err(|err| BarikError::Config(format!("Failed to create config file {}: {err}", path.display())))?;

    println!("Configuration file created at: {}", path.display());
    Ok(())
}

fn set_value(path: PathBuf, key: &str, value: &str) -> Result<()> {
    let store = ConfigStore::load_from(path, EventBus::new());
    store.update_value(key, value)?;
    println!("{} = {}", key.cyan(), format!("{value:?}").green());
    Ok(())
}

fn show_config(config_path: Option<&Path>, json: bool) -> Result<()> {
    let path = target_path(config_path)?;
    let config = if path.is_file() { read_config(&path)? } else { Config::parse(DEFAULT_CONFIG)? };

    if json {
        output::print_json(&serde_json::to_value(&config.root)?);
    } else {
        let text = toml::to_string(&config.root).map_err(|err| BarikError::Config(err.to_string()))?;
        print!("{text}");
    }
    Ok(())
}

fn show_config_path(config_path: Option<&Path>) {
    if let Some(path) = config_path {
        let marker = if path.is_file() { " (active)" } else { " (missing)" };
        println!("{}{marker}", path.display());
        return;
    }

    println!("Configuration file search paths (in priority order):\n");

    let mut found = false;
    for (i, path) in config_paths().iter().enumerate() {
        let marker = match (path.is_file(), found) {
            (true, false) => {
                found = true;
                " (active)"
            }
            (true, true) => " (ignored)",
            _ => "",
        };
        println!("  {}. {}{marker}", i + 1, path.display());
    }

    if !found {
        println!("\nNo configuration file found.");
        println!("Run 'barik config init' to create one.");
    }
}
