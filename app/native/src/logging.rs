//! Log setup.
//!
//! Logs go to stderr so stdout stays reserved for bar frames and CLI output.
//! `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "barik=info,barik_lib=info";
const VERBOSE_FILTER: &str = "barik=debug,barik_lib=debug";

/// Filter used when `RUST_LOG` is unset or invalid.
#[must_use]
pub fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    // Fails only when a subscriber is already set, e.g. across tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
