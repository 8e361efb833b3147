//! The bar itself.
//!
//! A [`BarFrame`] is everything the bar shows at one moment: the theme, the
//! background and one [`WidgetView`] per displayed item, in display order.
//! Frames are built from a [`Snapshot`] of the published states so building
//! stays pure; [`renderer`] turns them into output.

pub mod renderer;

use serde::Serialize;

use crate::config::Config;
use crate::config::types::{BackgroundConfig, Theme, WidgetItem, WidgetParams};
use crate::constants::layout::MENU_BAR_HEIGHT;
use crate::performance::PerformanceMode;
use crate::popup::{PopupContent, PopupView};
use crate::spaces::{Space, SpacesState};
use crate::updater::UpdateState;
use crate::widgets::audio::VolumeStatus;
use crate::widgets::battery::BatteryStatus;
use crate::widgets::calendar::{CalendarFilter, CalendarState};
use crate::widgets::keyboard::KeyboardLayout;
use crate::widgets::network::NetworkStatus;
use crate::widgets::now_playing::NowPlayingSong;
use crate::widgets::system_detail::SystemDetail;
use crate::widgets::system_monitor::SystemStats;
use crate::widgets::time::{TimeSettings, TimeState};
use crate::widgets::{Widgets, ids};

pub use self::renderer::BarRenderer;

const DEFAULT_TITLE_MAX_LENGTH: usize = 50;
const DEFAULT_WARNING_LEVEL: u8 = 30;
const DEFAULT_CRITICAL_LEVEL: u8 = 10;

/// Published states a frame is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub mode: PerformanceMode,
    pub spaces: SpacesState,
    pub network: NetworkStatus,
    pub battery: BatteryStatus,
    pub time: TimeState,
    pub calendar: CalendarState,
    pub now_playing: Option<NowPlayingSong>,
    pub system: SystemStats,
    /// Popup-only CPU and memory breakdown.
    pub system_detail: SystemDetail,
    pub volume: VolumeStatus,
    pub keyboard: KeyboardLayout,
    pub update: UpdateState,
    /// The "what's new" banner has not been dismissed for this version.
    pub show_whats_new: bool,
    pub popup: PopupView,
}

impl Snapshot {
    /// Reads the current state of every manager.
    #[must_use]
    pub fn capture(
        widgets: &Widgets,
        mode: PerformanceMode,
        update: UpdateState,
        show_whats_new: bool,
        popup: PopupView,
    ) -> Self {
        Self {
            mode,
            spaces: widgets.spaces.state(),
            network: widgets.network.state(),
            battery: widgets.battery.state(),
            time: widgets.time.state(),
            calendar: widgets.calendar.state(),
            now_playing: widgets.now_playing.state().song,
            system: widgets.system.state(),
            system_detail: widgets.system_detail.state(),
            volume: widgets.audio.state(),
            keyboard: widgets.keyboard.state(),
            update,
            show_whats_new,
            popup,
        }
    }
}

/// What one displayed item shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WidgetView {
    #[serde(rename_all = "camelCase")]
    Spaces {
        id: String,
        show_key: bool,
        supports_focus: bool,
        spaces: Vec<Space>,
    },
    Network {
        id: String,
        status: NetworkStatus,
    },
    #[serde(rename_all = "camelCase")]
    Battery {
        id: String,
        show_percentage: bool,
        warning_level: u8,
        critical_level: u8,
        status: BatteryStatus,
    },
    Time {
        id: String,
        text: String,
        /// Summary of the next calendar event, when events are shown.
        event: Option<String>,
    },
    NowPlaying {
        id: String,
        song: Option<NowPlayingSong>,
    },
    CpuRam {
        id: String,
        stats: SystemStats,
    },
    NetworkActivity {
        id: String,
        upload: f64,
        download: f64,
    },
    Volume {
        id: String,
        status: VolumeStatus,
    },
    Keyboard {
        id: String,
        layout: KeyboardLayout,
    },
    Spacer,
    Divider,
    #[serde(rename_all = "camelCase")]
    SystemBanner {
        update: Option<String>,
        show_whats_new: bool,
    },
    /// An id no widget is registered for.
    Unknown {
        id: String,
    },
}

/// Everything the bar shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarFrame {
    pub theme: Theme,
    pub mode: PerformanceMode,
    pub background: BackgroundConfig,
    /// Resolved background height in points.
    pub height: f64,
    pub widgets: Vec<WidgetView>,
    pub popup: Option<PopupContent>,
}

/// Builds the frame for `config` from `snapshot`.
#[must_use]
pub fn build_frame(config: &Config, snapshot: &Snapshot) -> BarFrame {
    let background = config.root.background.clone();
    let height = background.height.resolve(MENU_BAR_HEIGHT);

    BarFrame {
        theme: config.theme(),
        mode: snapshot.mode,
        background,
        height,
        widgets: config.displayed().iter().map(|item| widget_view(config, item, snapshot)).collect(),
        popup: snapshot.popup.content.clone().filter(|_| snapshot.popup.visible),
    }
}

fn widget_view(config: &Config, item: &WidgetItem, snapshot: &Snapshot) -> WidgetView {
    let resolved = config.resolved_item_config(item);
    let params = WidgetParams(&resolved);
    let id = item.id.clone();

    match item.id.as_str() {
        ids::SPACES => {
            let max_length = params
                .int("window.title.max-length")
                .and_then(|value| usize::try_from(value).ok())
                .unwrap_or(DEFAULT_TITLE_MAX_LENGTH);
            let mut spaces = snapshot.spaces.spaces.clone();
            for window in spaces.iter_mut().flat_map(|space| space.windows.iter_mut()) {
                window.title = truncate_title(&window.title, max_length);
            }

            WidgetView::Spaces {
                id,
                show_key: params.bool("space.show-key").unwrap_or(true),
                supports_focus: snapshot.spaces.supports_focus(),
                spaces,
            }
        }
        ids::NETWORK => WidgetView::Network { id, status: snapshot.network },
        ids::BATTERY => WidgetView::Battery {
            id,
            show_percentage: params.bool("show-percentage").unwrap_or(true),
            warning_level: level(params, "warning-level", DEFAULT_WARNING_LEVEL),
            critical_level: level(params, "critical-level", DEFAULT_CRITICAL_LEVEL),
            status: snapshot.battery.clone(),
        },
        ids::TIME => WidgetView::Time {
            id,
            text: TimeSettings::from_params(&resolved).format(snapshot.time.now()),
            event: CalendarFilter::from_params(&resolved)
                .show_events
                .then(|| snapshot.calendar.next_event.as_ref().map(|event| event.summary()))
                .flatten(),
        },
        ids::NOW_PLAYING => WidgetView::NowPlaying { id, song: snapshot.now_playing.clone() },
        ids::CPU_RAM => WidgetView::CpuRam { id, stats: snapshot.system.clone() },
        ids::NETWORK_ACTIVITY => WidgetView::NetworkActivity {
            id,
            upload: snapshot.system.upload_speed,
            download: snapshot.system.download_speed,
        },
        ids::VOLUME => WidgetView::Volume { id, status: snapshot.volume.clone() },
        ids::KEYBOARD => WidgetView::Keyboard { id, layout: snapshot.keyboard.clone() },
        ids::SPACER => WidgetView::Spacer,
        ids::DIVIDER => WidgetView::Divider,
        ids::SYSTEM_BANNER => WidgetView::SystemBanner {
            update: snapshot.update.latest_version.clone().filter(|_| snapshot.update.update_available),
            show_whats_new: snapshot.show_whats_new,
        },
        _ => WidgetView::Unknown { id },
    }
}

fn level(params: WidgetParams<'_>, key: &str, default: u8) -> u8 {
    params.int(key).and_then(|value| u8::try_from(value).ok()).map_or(default, |value| value.min(100))
}

/// Cuts `title` to `max_length` characters, marking the cut with an ellipsis.
fn truncate_title(title: &str, max_length: usize) -> String {
    if title.chars().count() <= max_length {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(max_length).collect();
    cut.push('…');
    cut
}
