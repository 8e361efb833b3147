//! Per-metric widget sources and the managers that drive them.

pub mod activation;
pub mod audio;
pub mod battery;
pub mod calendar;
pub mod keyboard;
pub mod manager;
pub mod network;
pub mod now_playing;
pub mod system_detail;
pub mod system_monitor;
pub mod time;

use crate::config::ConfigStore;
use crate::spaces::SpacesSource;
use crate::widgets::audio::AudioSource;
use crate::widgets::battery::BatterySource;
use crate::widgets::calendar::CalendarSource;
use crate::widgets::keyboard::KeyboardSource;
use crate::widgets::manager::{ManagerContext, WidgetManager};
use crate::widgets::network::NetworkSource;
use crate::widgets::now_playing::NowPlayingSource;
use crate::widgets::system_detail::SystemDetailSource;
use crate::widgets::system_monitor::SystemMonitorSource;
use crate::widgets::time::TimeSource;

/// Widget ids as they appear in `widgets.displayed`.
pub mod ids {
    pub const SPACES: &str = "default.spaces";
    pub const NETWORK: &str = "default.network";
    pub const BATTERY: &str = "default.battery";
    pub const TIME: &str = "default.time";
    pub const NOW_PLAYING: &str = "default.nowplaying";
    pub const CPU_RAM: &str = "default.cpuram";
    pub const NETWORK_ACTIVITY: &str = "default.networkactivity";
    pub const VOLUME: &str = "default.volume";
    pub const KEYBOARD: &str = "default.keyboard";

    /// Active while the CPU/RAM popup is open.
    pub const CPU_RAM_POPUP: &str = "popup.default.cpuram";

    // Built-in layout items with no manager behind them.
    pub const SPACER: &str = "spacer";
    pub const DIVIDER: &str = "divider";
    pub const SYSTEM_BANNER: &str = "system-banner";
}

/// Every manager the bar renders from.
#[derive(Debug, Clone)]
pub struct Widgets {
    pub spaces: WidgetManager<SpacesSource>,
    pub network: WidgetManager<NetworkSource>,
    pub battery: WidgetManager<BatterySource>,
    pub time: WidgetManager<TimeSource>,
    pub calendar: WidgetManager<CalendarSource>,
    pub now_playing: WidgetManager<NowPlayingSource>,
    pub system: WidgetManager<SystemMonitorSource>,
    pub system_detail: WidgetManager<SystemDetailSource>,
    pub audio: WidgetManager<AudioSource>,
    pub keyboard: WidgetManager<KeyboardSource>,
}

impl Widgets {
    /// Creates all managers; the ones whose widgets are displayed start polling.
    #[must_use]
    pub fn start(ctx: &ManagerContext, config: &ConfigStore) -> Self {
        Self {
            spaces: WidgetManager::new(SpacesSource::new(config.clone()), ctx.clone()),
            network: WidgetManager::new(NetworkSource, ctx.clone()),
            battery: WidgetManager::new(BatterySource, ctx.clone()),
            time: WidgetManager::new(TimeSource, ctx.clone()),
            calendar: WidgetManager::new(CalendarSource::new(config.clone()), ctx.clone()),
            now_playing: WidgetManager::new(NowPlayingSource, ctx.clone()),
            system: WidgetManager::new(SystemMonitorSource::new(), ctx.clone()),
            system_detail: WidgetManager::new(SystemDetailSource::new(), ctx.clone()),
            audio: WidgetManager::new(AudioSource, ctx.clone()),
            keyboard: WidgetManager::new(KeyboardSource, ctx.clone()),
        }
    }
}
