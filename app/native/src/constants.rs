//! Application-wide constants.
//!
//! Constants are grouped by the subsystem that owns them.

/// Application name, used for directories and the socket file.
pub const APP_NAME: &str = "barik";

/// Bundle identifier, used for the cache directory.
pub const APP_BUNDLE_ID: &str = "com.mocki-toki.barik";

/// Version of this build, compared against GitHub release tags.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// GitHub repository that publishes releases and the changelog.
pub mod github {
    /// `owner/name` of the upstream repository.
    pub const REPOSITORY: &str = "mocki-toki/barik";

    /// Latest release endpoint of the GitHub REST API.
    pub const LATEST_RELEASE_URL: &str =
        "https://api.github.com/repos/mocki-toki/barik/releases/latest";

    /// Raw changelog on the default branch.
    pub const CHANGELOG_URL: &str =
        "https://raw.githubusercontent.com/mocki-toki/barik/main/CHANGELOG.md";

    /// User agent sent with every request (GitHub rejects requests without one).
    pub const USER_AGENT: &str = concat!("barik/", env!("CARGO_PKG_VERSION"));
}

/// Timing constants.
pub mod timing {
    /// Duration of the popup open/close animation (ms).
    pub const POPUP_ANIMATION_MS: u64 = 350;

    /// Interval between update checks (s).
    pub const UPDATE_CHECK_INTERVAL_SECS: u64 = 1800;

    /// Interval used when a metric is missing from the interval table (ms).
    pub const FALLBACK_INTERVAL_MS: u64 = 5000;

    /// Smallest interval a periodic task accepts (ms).
    pub const MIN_POLL_INTERVAL_MS: u64 = 10;
}

/// Layout constants for the bar and the popup panel.
pub mod layout {
    /// Height of the bar background when `background.height = "menu-bar"`.
    pub const MENU_BAR_HEIGHT: f64 = 55.0;

    /// Horizontal margin kept between a popup and the screen edges.
    pub const POPUP_SCREEN_MARGIN: f64 = 8.0;

    /// Default popup width used when the content does not report one.
    pub const POPUP_DEFAULT_WIDTH: f64 = 300.0;

    /// Screen size assumed for popup placement when none is given.
    pub const DEFAULT_SCREEN_WIDTH: f64 = 1440.0;
    pub const DEFAULT_SCREEN_HEIGHT: f64 = 900.0;
}

/// Paths of bundled system tools.
pub mod tools {
    /// Default yabai location (Homebrew on Apple silicon).
    pub const YABAI_DEFAULT_PATH: &str = "/opt/homebrew/bin/yabai";

    /// Default AeroSpace location (Homebrew on Apple silicon).
    pub const AEROSPACE_DEFAULT_PATH: &str = "/opt/homebrew/bin/aerospace";

    /// AppleScript runner.
    pub const OSASCRIPT: &str = "/usr/bin/osascript";

    /// Archive extractor used by the updater.
    pub const UNZIP: &str = "/usr/bin/unzip";
}
