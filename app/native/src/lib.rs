//! Barik - a macOS menu bar driven by a TOML config.
//!
//! This library provides both the bar process and the CLI. The bar polls
//! system metrics through per-widget managers, resolves the configured layout
//! into frames and writes them to stdout as JSON lines. A Unix socket lets
//! the CLI query and control the running bar.

// Core modules
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod performance;
pub mod preferences;

// Bar process
pub mod app;
pub mod bar;
pub mod ipc;
pub mod popup;
pub mod spaces;
pub mod updater;
pub mod utils;
pub mod widgets;
