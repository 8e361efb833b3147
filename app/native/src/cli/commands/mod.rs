//! CLI command definitions using Clap.
//!
//! Commands are grouped by domain:
//!
//! - `config_cmd` - configuration file management
//! - `control` - commands forwarded to the running bar
//! - `mode` - performance mode
//! - `update` - release checks and the changelog

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::app::{self, RunOptions};
use crate::constants::{APP_NAME, APP_VERSION};
use crate::error::Result;
use crate::ipc::{self, IpcError, IpcQuery};

pub mod config_cmd;
pub mod control;
pub mod mode;
pub mod update;

pub use config_cmd::ConfigCommands;
pub use control::{BannerCommands, FocusCommands, VolumeArgs};
pub use mode::ModeCommands;
pub use update::UpdateCommands;

use crate::widgets::now_playing::MediaAction;

/// Barik - a macOS menu bar driven by a TOML config.
///
/// Without a subcommand, runs the bar and writes its frames to stdout.
#[derive(Parser, Debug)]
#[command(name = "barik")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file to use instead of the default search paths.
    #[arg(long, short, global = true, value_name = "PATH", env = "BARIK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level (`RUST_LOG` still takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Do not reload when the configuration file changes.
    #[arg(long)]
    pub no_watch: bool,

    /// Do not check GitHub for new releases.
    #[arg(long)]
    pub no_update_check: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Configuration file management.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show, change or list the performance modes.
    #[command(subcommand)]
    Mode(ModeCommands),

    /// Print the spaces of the running window manager as JSON.
    ///
    /// Queries yabai or AeroSpace directly; the bar does not need to run.
    Spaces,

    /// Toggle the popup of a widget in the running bar.
    Popup {
        /// Widget id, e.g. `default.time`.
        id: String,
    },

    /// Control playback of the current music app.
    Media {
        #[arg(value_enum)]
        action: MediaAction,
    },

    /// Change the output volume.
    Volume(VolumeArgs),

    /// Focus a space or a window (AeroSpace only).
    #[command(subcommand)]
    Focus(FocusCommands),

    /// Release checks and the changelog.
    #[command(subcommand)]
    Update(UpdateCommands),

    /// The "what's new" banner.
    #[command(subcommand)]
    Banner(BannerCommands),

    /// Print the frame the running bar currently shows.
    State,

    /// Reload the configuration of the running bar.
    Reload,

    /// Generate shell completions.
    ///
    /// Usage:
    ///   eval "$(barik completions zsh)"
    ///   barik completions fish > ~/.config/fish/completions/barik.fish
    Completions {
        /// The shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Options for running the bar.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            config_path: self.config.clone(),
            no_watch: self.no_watch,
            no_update_check: self.no_update_check,
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> Result<()> {
        let Some(command) = &self.command else {
            return app::run(&self.run_options());
        };

        match command {
            Commands::Config(cmd) => config_cmd::execute(cmd, self.config.as_deref()),
            Commands::Mode(cmd) => mode::execute(cmd),
            Commands::Spaces => control::print_spaces(self.config.as_deref()),
            Commands::Popup { id } => control::toggle_popup(id),
            Commands::Media { action } => control::media(*action),
            Commands::Volume(args) => control::volume(args),
            Commands::Focus(cmd) => control::focus(cmd),
            Commands::Update(cmd) => update::execute(cmd),
            Commands::Banner(cmd) => control::banner(cmd),
            Commands::State => control::print_state(),
            Commands::Reload => control::reload(),
            Commands::Completions { shell } => {
                Self::print_completions(*shell);
                Ok(())
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, APP_NAME, &mut io::stdout());
    }
}

/// Sends `query` to the running bar and returns the reply data.
fn query_bar(query: &IpcQuery) -> Result<serde_json::Value> {
    let data = ipc::send_query(query)?.into_result()?;
    Ok(data)
}

/// Like [`query_bar`], but `None` when no bar is running.
fn try_query_bar(query: &IpcQuery) -> Result<Option<serde_json::Value>> {
    match ipc::send_query(query) {
        Ok(response) => Ok(Some(response.into_result()?)),
        Err(IpcError::AppNotRunning) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
