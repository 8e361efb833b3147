//! Tool locations from the config.

use std::path::PathBuf;

/// Location of an external tool: the configured override with `~` expanded,
/// or `default` when the override is missing or blank.
#[must_use]
pub fn tool_path(configured: Option<&str>, default: &str) -> PathBuf {
    match configured.map(str::trim) {
        Some(path) if !path.is_empty() => PathBuf::from(shellexpand::tilde(path).as_ref()),
        _ => PathBuf::from(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YABAI: &str = "/opt/homebrew/bin/yabai";

    #[test]
    fn blank_override_falls_back() {
        assert_eq!(tool_path(None, YABAI), PathBuf::from(YABAI));
        assert_eq!(tool_path(Some("  "), YABAI), PathBuf::from(YABAI));
    }

    #[test]
    fn override_is_trimmed_and_kept() {
        assert_eq!(tool_path(Some(" /usr/local/bin/yabai "), YABAI), PathBuf::from("/usr/local/bin/yabai"));
        assert_eq!(tool_path(Some("bin/aerospace"), YABAI), PathBuf::from("bin/aerospace"));
    }

    #[test]
    fn home_is_expanded() {
        let path = tool_path(Some("~/.local/bin/yabai"), YABAI);
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".local/bin/yabai"));
    }
}
