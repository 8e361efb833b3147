//! Performance mode commands.

use clap::Subcommand;
use colored::Colorize;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use super::try_query_bar;
use crate::cli::output;
use crate::error::{BarikError, Result};
use crate::ipc::IpcQuery;
use crate::performance::PerformanceMode;
use crate::preferences::{PERFORMANCE_MODE_KEY, Preferences};

#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum ModeCommands {
    /// Print the current mode.
    Get,

    /// Select a mode.
    ///
    /// Applied at once when the bar runs, otherwise stored for the next start.
    Set {
        #[arg(value_enum)]
        mode: PerformanceMode,
    },

    /// Print the polling interval of every metric in every mode.
    List,
}

/// Execute mode subcommands.
///
/// # Errors
///
/// Returns an error if the bar rejects the query or the preference cannot be
/// stored.
pub fn execute(cmd: &ModeCommands) -> Result<()> {
    match cmd {
        ModeCommands::Get => {
            let mode = current_mode()?;
            println!("{}", mode.display_name());
            Ok(())
        }
        ModeCommands::Set { mode } => {
            if try_query_bar(&IpcQuery::SetMode { mode: *mode })?.is_none() {
                Preferences::open_default().set_string(PERFORMANCE_MODE_KEY, mode.as_str())?;
                println!("{} (applies when Barik starts)", mode.display_name());
            } else {
                println!("{}", mode.display_name());
            }
            Ok(())
        }
        ModeCommands::List => {
            let current = current_mode()?;
            println!("{}", format!("Performance modes (current: {})", current.display_name()).bold());
            println!("{}", interval_table());
            Ok(())
        }
    }
}

/// The running bar's mode, or the stored one.
fn current_mode() -> Result<PerformanceMode> {
    if let Some(data) = try_query_bar(&IpcQuery::GetMode)? {
        return serde_json::from_value(data).map_err(|err| BarikError::Ipc(err.to_string()));
    }

    let stored = Preferences::open_default().get_string(PERFORMANCE_MODE_KEY);
    Ok(stored.and_then(|value| value.parse().ok()).unwrap_or_default())
}

#[derive(Tabled)]
struct IntervalRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Battery Saver")]
    battery_saver: String,
    #[tabled(rename = "Balanced")]
    balanced: String,
    #[tabled(rename = "Max Performance")]
    max_performance: String,
}

fn interval_table() -> String {
    let [saver, balanced, max] = PerformanceMode::ALL.map(PerformanceMode::intervals);
    let rows: Vec<IntervalRow> = saver
        .iter()
        .map(|(metric, interval)| IntervalRow {
            metric: metric.key(),
            battery_saver: output::format_interval(interval),
            balanced: output::format_interval(balanced.get(metric)),
            max_performance: output::format_interval(max.get(metric)),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..4)).with(Alignment::right()))
        .to_string()
}
