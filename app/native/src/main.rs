#![allow(clippy::multiple_crate_versions)]

//! Barik - macOS menu bar replacement with yabai and AeroSpace spaces.
//!
//! This binary serves as both the bar and the CLI:
//! - Without a subcommand it runs the bar, writing frames to stdout
//! - With a subcommand (e.g., `barik mode set balanced`) it runs CLI commands
//!
//! Commands that need the bar talk to the running process over its socket.

fn main() {
    if let Err(err) = barik_lib::cli::run() {
        eprintln!("barik: {err}");
        std::process::exit(1);
    }
}
