//! Command-line interface.
//!
//! `barik` with no subcommand runs the bar. Subcommands are one-shot actions;
//! the ones that act on the running bar go through the IPC socket.

mod commands;
mod output;

use clap::Parser;
pub use commands::Cli;

use crate::error::Result;

/// Parses the arguments, installs logging and runs the command.
///
/// # Errors
///
/// Returns the error of the executed command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);
    cli.execute()
}
