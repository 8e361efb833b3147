//! Now-playing source for Spotify and Music.
//!
//! Each app is queried with an AppleScript that returns
//! `state|title|artist|artwork|position|duration`, or `stopped`.

use serde::{Deserialize, Serialize};

use crate::error::{BarikError, Result};
use crate::performance::Metric;
use crate::utils::command::run_osascript;
use crate::widgets::ids;
use crate::widgets::manager::MetricSource;

/// Playback state reported by the scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl PlaybackState {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "playing" => Some(Self::Playing),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

/// Supported music applications, in query order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicApp {
    Spotify,
    Music,
}

impl MusicApp {
    pub const ALL: [Self; 2] = [Self::Spotify, Self::Music];

    /// Application name as known to AppleScript.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spotify => "Spotify",
            Self::Music => "Music",
        }
    }

    /// Script returning the pipe-delimited song line or `stopped`.
    #[must_use]
    pub fn now_playing_script(self) -> String {
        match self {
            Self::Music => r#"if application "Music" is running then
    tell application "Music"
        if player state is playing or player state is paused then
            set currentTrack to current track
            try
                set artworkURL to (get URL of artwork 1 of currentTrack) as text
            on error
                set artworkURL to ""
            end try
            set stateText to ""
            if player state is playing then
                set stateText to "playing"
            else if player state is paused then
                set stateText to "paused"
            end if
            return stateText & "|" & (name of currentTrack) & "|" & (artist of currentTrack) & "|" & artworkURL & "|" & (player position as text) & "|" & ((duration of currentTrack) as text)
        else
            return "stopped"
        end if
    end tell
else
    return "stopped"
end if"#
                .to_string(),
            Self::Spotify => {
                let name = self.name();
                format!(
                    r#"if application "{name}" is running then
    tell application "{name}"
        if player state is playing or player state is paused then
            set currentTrack to current track
            set stateText to "paused"
            if player state is playing then set stateText to "playing"
            return stateText & "|" & (name of currentTrack) & "|" & (artist of currentTrack) & "|" & (artwork url of currentTrack) & "|" & player position & "|" & (duration of currentTrack)
        else
            return "stopped"
        end if
    end tell
else
    return "stopped"
end if"#
                )
            }
        }
    }

    fn is_running_script(self) -> String { format!(r#"application "{}" is running"#, self.name()) }

    fn command_script(self, action: MediaAction) -> String {
        let verb = match action {
            MediaAction::Previous => "previous track",
            MediaAction::Toggle => "playpause",
            MediaAction::Next => "next track",
        };
        format!(r#"tell application "{}" to {verb}"#, self.name())
    }
}

/// Playback controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaAction {
    Previous,
    Toggle,
    Next,
}

/// The current song.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingSong {
    pub app: MusicApp,
    pub state: PlaybackState,
    pub title: String,
    pub artist: String,
    pub album_art_url: Option<String>,
    /// Seconds.
    pub position: f64,
    /// Seconds.
    pub duration: f64,
}

impl NowPlayingSong {
    /// Parses one script result. Anything malformed means no song.
    #[must_use]
    pub fn parse(app: MusicApp, output: &str) -> Option<Self> {
        let fields: Vec<&str> = output.trim().split('|').collect();
        let [state, title, artist, art, position, duration] = fields.as_slice() else {
            return None;
        };

        let state = PlaybackState::parse(state)?;
        let position = parse_decimal(position)?;
        let mut duration = parse_decimal(duration)?;
        if app == MusicApp::Spotify {
            duration /= 1000.0;
        }

        Some(Self {
            app,
            state,
            title: (*title).to_string(),
            artist: (*artist).to_string(),
            album_art_url: Some((*art).trim()).filter(|url| !url.is_empty()).map(str::to_string),
            position,
            duration,
        })
    }
}

/// Locale-tolerant decimal: AppleScript may print `12,5`.
fn parse_decimal(value: &str) -> Option<f64> { value.trim().replace(',', ".").parse().ok() }

/// Published now-playing state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NowPlayingState {
    pub song: Option<NowPlayingSong>,
}

/// Queries the apps in order and returns the first song found.
#[derive(Debug, Default)]
pub struct NowPlayingSource;

impl MetricSource for NowPlayingSource {
    type State = NowPlayingState;

    const METRIC: Metric = Metric::NowPlaying;
    const WIDGET_IDS: &'static [&'static str] = &[ids::NOW_PLAYING];

    fn poll(&mut self) -> Result<NowPlayingState> {
        let mut last_error = None;
        let mut answered = false;

        for app in MusicApp::ALL {
            match run_osascript(&app.now_playing_script()) {
                Ok(output) => {
                    answered = true;
                    if output == "stopped" {
                        continue;
                    }
                    if let Some(song) = NowPlayingSong::parse(app, &output) {
                        return Ok(NowPlayingState { song: Some(song) });
                    }
                    tracing::debug!(app = app.name(), output, "unrecognized now-playing output");
                }
                Err(err) => last_error = Some(err),
            }
        }

        // Every script failing means osascript itself is unusable.
        match last_error {
            Some(err) if !answered => Err(err),
            _ => Ok(NowPlayingState::default()),
        }
    }

    fn clears_on_deactivate() -> bool { true }
}

/// Sends a playback command to the first running music app.
///
/// # Errors
///
/// Returns an error when no supported app is running or the script fails.
pub fn send_media_action(action: MediaAction) -> Result<MusicApp> {
    let app = MusicApp::ALL
        .into_iter()
        .find(|app| run_osascript(&app.is_running_script()).is_ok_and(|out| out == "true"))
        .ok_or_else(|| BarikError::Command("No supported music app is running".to_string()))?;

    run_osascript(&app.command_script(action))?;
    tracing::debug!(app = app.name(), action = ?action, "media command sent");
    Ok(app)
}
