//! Error types for Barik.
//!
//! This module provides the unified error type used throughout the application.
//! Errors serialize as `{"kind": ..., "message": ...}` so they can be returned
//! over the IPC socket without losing their category.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during application execution.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum BarikError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// Configuration could not be read, parsed, or written.
    #[error("Configuration error: {0}")]
    Config(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
    /// An external command failed to launch or exited unsuccessfully.
    #[error("Command error: {0}")]
    Command(String),
    /// Output from an external tool or service could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
    /// IPC communication error.
    #[error("IPC error: {0}")]
    Ipc(String),
    /// Outbound HTTP request failed.
    #[error("Network error: {0}")]
    Network(String),
    /// Self-update failed.
    #[error("Update error: {0}")]
    Update(String),
    /// Battery query failed.
    #[error("Battery error: {0}")]
    Battery(String),
    /// Audio query or control failed.
    #[error("Audio error: {0}")]
    Audio(String),
    /// Persisted preferences could not be read or written.
    #[error("Preferences error: {0}")]
    Preferences(String),
}

impl From<std::io::Error> for BarikError {
    fn from(err: std::io::Error) -> Self { Self::Io(err.to_string()) }
}

impl From<serde_json::Error> for BarikError {
    fn from(err: serde_json::Error) -> Self { Self::Decode(err.to_string()) }
}

impl From<toml::de::Error> for BarikError {
    fn from(err: toml::de::Error) -> Self { Self::Config(err.to_string()) }
}

impl From<reqwest::Error> for BarikError {
    fn from(err: reqwest::Error) -> Self { Self::Network(err.to_string()) }
}

impl From<String> for BarikError {
    fn from(msg: String) -> Self { Self::Command(msg) }
}

impl From<&str> for BarikError {
    fn from(msg: &str) -> Self { Self::Command(msg.to_string()) }
}

/// Convenience alias used across the crate.
pub type Result<T, E = BarikError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arguments_display() {
        let err = BarikError::InvalidArguments("Cannot combine --mute and --unmute".to_string());
        assert_eq!(err.to_string(), "Cannot combine --mute and --unmute");
    }

    #[test]
    fn test_config_error_display() {
        let err = BarikError::Config("expected a table".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("expected a table"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err: BarikError = io_err.into();
        assert!(matches!(err, BarikError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_json_error_becomes_decode() {
        let json_err = serde_json::from_str::<Vec<u32>>("[1,").unwrap_err();
        let err: BarikError = json_err.into();
        assert!(matches!(err, BarikError::Decode(_)));
    }

    #[test]
    fn test_toml_error_becomes_config() {
        let toml_err = toml::from_str::<toml::Table>("key = ").unwrap_err();
        let err: BarikError = toml_err.into();
        assert!(matches!(err, BarikError::Config(_)));
    }

    #[test]
    fn test_from_string() {
        let err: BarikError = "yabai exited with status 1".into();
        assert!(matches!(err, BarikError::Command(_)));
    }

    #[test]
    fn test_error_serializes_with_kind() {
        let err = BarikError::Battery("No battery".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"kind":"Battery","message":"No battery"}"#);
    }
}
