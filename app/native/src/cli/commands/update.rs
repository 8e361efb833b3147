//! Release commands.

use std::future::Future;

use clap::Subcommand;
use colored::Colorize;

use crate::cli::output;
use crate::constants::APP_VERSION;
use crate::error::{BarikError, Result};
use crate::updater::{UpdateChecker, extract_section, fetch_changelog};

#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum UpdateCommands {
    /// Ask GitHub for the latest release.
    Check,

    /// Print the changelog section of a version.
    Changelog {
        /// Version to show, e.g. `v0.4.0`. Defaults to this build.
        #[arg(id = "release", value_name = "VERSION")]
        version: Option<String>,
    },

    /// Download a release and replace the installed app.
    ///
    /// Without a version, installs the latest release if it is newer.
    Install {
        #[arg(id = "release", value_name = "VERSION")]
        version: Option<String>,
    },
}

/// Execute update subcommands.
///
/// # Errors
///
/// Returns an error if GitHub cannot be reached or the install fails.
pub fn execute(cmd: &UpdateCommands) -> Result<()> {
    let checker = UpdateChecker::new()?;
    match cmd {
        UpdateCommands::Check => block_on(async {
            let state = checker.check().await?;
            let latest = state.latest_version.as_deref().unwrap_or("unknown");
            println!("Current: {APP_VERSION}");
            println!("Latest:  {} {}", latest.bold(), output::format_bool(state.update_available));
            if state.update_available {
                println!("Run 'barik update install' to upgrade.");
            }
            Ok(())
        }),
        UpdateCommands::Changelog { version } => block_on(async {
            let version = version.as_deref().unwrap_or(APP_VERSION);
            let changelog = fetch_changelog(checker.client()).await?;
            let section = extract_section(&changelog_version(version), &changelog);
            if section.is_empty() {
                return Err(BarikError::InvalidArguments(format!("No changelog entry for {version}")));
            }
            println!("{section}");
            Ok(())
        }),
        UpdateCommands::Install { version } => block_on(async {
            let version = match version {
                Some(version) => version.clone(),
                None => {
                    let state = checker.check().await?;
                    match state.latest_version.filter(|_| state.update_available) {
                        Some(latest) => latest,
                        None => {
                            println!("Already up to date ({APP_VERSION})");
                            return Ok(());
                        }
                    }
                }
            };
            checker.install(&version).await?;
            println!("Installing {}; Barik restarts when done.", version.bold());
            Ok(())
        }),
    }
}

/// Changelog headers carry the bare version number.
fn changelog_version(version: &str) -> String { version.trim_start_matches('v').to_string() }

fn block_on<F>(future: F) -> Result<()>
where F: Future<Output = Result<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(future)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::commands::{Cli, Commands};

    #[test]
    fn changelog_headers_drop_the_prefix() {
        assert_eq!(changelog_version("v1.2.3"), "1.2.3");
        assert_eq!(changelog_version("0.9.0"), "0.9.0");
    }

    #[test]
    fn install_version_is_optional() {
        let cli = Cli::try_parse_from(["barik", "update", "install"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Update(UpdateCommands::Install { version: None }))));

        let cli = Cli::try_parse_from(["barik", "update", "changelog", "v0.2.0"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Update(UpdateCommands::Changelog { version: Some(ref v) })) if v == "v0.2.0"
        ));
    }
}
