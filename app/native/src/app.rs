//! The bar process.
//!
//! [`App`] wires the services together: configuration, performance mode,
//! widget managers, the popup presenter and the updater. [`run`] starts them
//! on a current-thread runtime, answers IPC queries and writes a frame every
//! time something the bar shows changes.

use std::io::Write;
use std::path::PathBuf;

use eyeball::SharedObservable;
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bar::renderer::notify_on_change;
use crate::bar::{BarFrame, BarRenderer, Snapshot, build_frame};
use crate::config::ConfigStore;
use crate::constants::APP_VERSION;
use crate::constants::layout::{DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};
use crate::error::{BarikError, Result};
use crate::events::EventBus;
use crate::ipc::{self, IpcQuery, IpcResponse, IpcServer};
use crate::performance::{PerformanceController, PerformanceMode};
use crate::popup::{HeadlessPanel, PopupPresenter, PopupView, Rect};
use crate::preferences::Preferences;
use crate::spaces::{ProviderKind, SpacesProvider};
use crate::updater::{UpdateChecker, VersionMarker};
use crate::widgets::activation::ActivationRegistry;
use crate::widgets::manager::{ManagerContext, MetricSource, WidgetManager};
use crate::widgets::now_playing::send_media_action;
use crate::widgets::{Widgets, audio, ids};

/// Startup options of the bar process.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit config file instead of the search paths.
    pub config_path: Option<PathBuf>,
    /// Skip watching the config file.
    pub no_watch: bool,
    /// Skip the periodic update check.
    pub no_update_check: bool,
}

/// All services of one bar process.
#[derive(Debug, Clone)]
pub struct App {
    runtime: Handle,
    config: ConfigStore,
    performance: PerformanceController,
    activation: ActivationRegistry,
    widgets: Widgets,
    presenter: PopupPresenter<HeadlessPanel>,
    popup_view: SharedObservable<PopupView>,
    updater: UpdateChecker,
    marker: VersionMarker,
    show_whats_new: SharedObservable<bool>,
}

impl App {
    /// Creates every service on `runtime`. Managers of displayed widgets start
    /// polling right away.
    #[must_use]
    pub fn new(
        runtime: &Handle,
        config: ConfigStore,
        preferences: Preferences,
        updater: UpdateChecker,
        marker: VersionMarker,
    ) -> Self {
        let bus = config.bus().clone();
        let performance = PerformanceController::new(preferences, bus.clone());
        let activation = ActivationRegistry::new(&config.current(), bus.clone());
        let ctx = ManagerContext::new(runtime.clone(), bus.clone(), performance.clone(), activation.clone());
        let widgets = Widgets::start(&ctx, &config);

        let panel = HeadlessPanel::new();
        let popup_view = panel.observable();
        let screen = Rect::new(0.0, 0.0, DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT);
        let presenter = PopupPresenter::new(runtime, panel, bus, screen);
        let show_whats_new = SharedObservable::new(!marker.is_latest(APP_VERSION));

        Self {
            runtime: runtime.clone(),
            config,
            performance,
            activation,
            widgets,
            presenter,
            popup_view,
            updater,
            marker,
            show_whats_new,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ConfigStore { &self.config }

    #[must_use]
    pub const fn widgets(&self) -> &Widgets { &self.widgets }

    #[must_use]
    pub const fn performance(&self) -> &PerformanceController { &self.performance }

    #[must_use]
    pub const fn updater(&self) -> &UpdateChecker { &self.updater }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            &self.widgets,
            self.performance.mode(),
            self.updater.state(),
            self.show_whats_new.get(),
            self.popup_view.get(),
        )
    }

    #[must_use]
    pub fn frame(&self) -> BarFrame {
        let mut snapshot = self.snapshot();

        // The open popup shows live state, not the state it was opened with.
        let open = snapshot
            .popup
            .content
            .as_ref()
            .filter(|_| snapshot.popup.visible)
            .map(|content| content.id.clone());
        if let Some(id) = open {
            let body = self.popup_body_of(&snapshot, &id);
            if let Some(content) = snapshot.popup.content.as_mut() {
                content.body = body;
            }
        }

        build_frame(&self.config.current(), &snapshot)
    }

    /// Answers one IPC query.
    #[must_use]
    pub fn handle(&self, query: IpcQuery) -> IpcResponse {
        match query {
            IpcQuery::Ping => IpcResponse::success("pong"),
            IpcQuery::State => IpcResponse::success(self.frame()),
            IpcQuery::GetMode => IpcResponse::success(self.performance.mode()),
            IpcQuery::SetMode { mode } => {
                self.set_mode(mode);
                IpcResponse::success(mode)
            }
            IpcQuery::Popup { id, anchor } => {
                let body = self.popup_body(&id);
                self.presenter.show(anchor.unwrap_or_default(), &id, body);
                IpcResponse::success(self.presenter.current_id())
            }
            IpcQuery::PopupDismiss => {
                self.presenter.resign_key();
                IpcResponse::success(true)
            }
            IpcQuery::Media { action } => send_media_action(action)
                .map(|app| {
                    self.refresh(&self.widgets.now_playing);
                    app.name()
                })
                .into(),
            IpcQuery::Volume { level, muted } => self.set_volume(level, muted).into(),
            IpcQuery::FocusSpace { id, need_window_focus } => self
                .with_provider(|provider| provider.focus_space(&id, need_window_focus))
                .into(),
            IpcQuery::FocusWindow { id } => self.with_provider(|provider| provider.focus_window(id)).into(),
            IpcQuery::DismissBanner => self.dismiss_banner().into(),
            IpcQuery::ReloadConfig => self
                .config
                .reload()
                .map(|()| self.config.path().map(|path| path.display().to_string()))
                .map_err(|err| BarikError::Config(err.to_string()))
                .into(),
        }
    }

    pub fn set_mode(&self, mode: PerformanceMode) { self.performance.set_mode(mode); }

    /// Marks this version's "what's new" banner as seen.
    ///
    /// # Errors
    ///
    /// Returns the IO error when the marker cannot be written.
    pub fn dismiss_banner(&self) -> Result<()> {
        self.marker.mark_current(APP_VERSION)?;
        self.show_whats_new.set_if_not_eq(false);
        Ok(())
    }

    /// Popup payload of a widget: its layout variant and current state.
    #[must_use]
    pub fn popup_body(&self, widget_id: &str) -> serde_json::Value { self.popup_body_of(&self.snapshot(), widget_id) }

    fn popup_body_of(&self, snapshot: &Snapshot, widget_id: &str) -> serde_json::Value {
        let state = match widget_id {
            ids::TIME => json!(snapshot.calendar),
            ids::BATTERY => json!(snapshot.battery),
            ids::NOW_PLAYING => json!(snapshot.now_playing),
            ids::NETWORK => json!(snapshot.network),
            ids::CPU_RAM => json!({
                "usage": snapshot.system,
                "detail": snapshot.system_detail,
            }),
            ids::NETWORK_ACTIVITY => json!(snapshot.system),
            ids::VOLUME => json!(snapshot.volume),
            ids::KEYBOARD => json!(snapshot.keyboard),
            ids::SPACES => json!(snapshot.spaces),
            ids::SYSTEM_BANNER => json!({
                "update": snapshot.update,
                "showWhatsNew": snapshot.show_whats_new,
                "version": APP_VERSION,
            }),
            _ => serde_json::Value::Null,
        };

        json!({
            "variant": self.config.popup_variant(widget_id).as_str(),
            "state": state,
        })
    }

    fn set_volume(&self, level: Option<f32>, muted: Option<bool>) -> Result<()> {
        if level.is_none() && muted.is_none() {
            return Err(BarikError::InvalidArguments("Nothing to change".to_string()));
        }
        if let Some(level) = level {
            audio::set_volume(level)?;
        }
        if let Some(muted) = muted {
            audio::set_muted(muted)?;
        }
        self.refresh(&self.widgets.audio);
        Ok(())
    }

    fn with_provider(&self, f: impl FnOnce(&dyn SpacesProvider) -> Result<()>) -> Result<()> {
        let kind = self
            .widgets
            .spaces
            .state()
            .provider
            .or_else(ProviderKind::detect)
            .ok_or_else(|| BarikError::Command("No supported window manager is running".to_string()))?;

        f(kind.provider(&self.config.current()).as_ref())?;
        self.refresh(&self.widgets.spaces);
        Ok(())
    }

    /// Schedules an out-of-band poll so a control command shows up at once.
    fn refresh<S: MetricSource>(&self, manager: &WidgetManager<S>) {
        let manager = manager.clone();
        self.runtime.spawn(async move { manager.poll_now().await });
    }

    /// Keeps the activation set in sync with the configuration.
    #[must_use]
    pub fn spawn_activation_listener(&self) -> JoinHandle<()> { self.activation.spawn_listener(&self.runtime) }

    /// Writes a frame now and after every change of a published state.
    ///
    /// Returns when the output can no longer be written.
    ///
    /// # Errors
    ///
    /// Returns the write error that stopped the loop.
    pub async fn render_loop<W: Write>(&self, mut renderer: BarRenderer<W>) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _forwarders = self.spawn_forwarders(&tx);
        drop(tx);

        renderer.render(&self.frame())?;
        while rx.recv().await.is_some() {
            // Coalesce bursts into one frame.
            while rx.try_recv().is_ok() {}
            renderer.render(&self.frame())?;
        }
        Ok(())
    }

    fn spawn_forwarders(&self, tx: &mpsc::UnboundedSender<()>) -> Forwarders {
        let runtime = &self.runtime;
        let widgets = &self.widgets;
        let mut tasks = vec![
            notify_on_change(runtime, widgets.spaces.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.network.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.battery.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.time.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.calendar.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.now_playing.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.system.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.system_detail.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.audio.subscribe(), tx.clone()),
            notify_on_change(runtime, widgets.keyboard.subscribe(), tx.clone()),
            notify_on_change(runtime, self.updater.subscribe(), tx.clone()),
            notify_on_change(runtime, self.popup_view.subscribe(), tx.clone()),
            notify_on_change(runtime, self.show_whats_new.subscribe(), tx.clone()),
            notify_on_change(runtime, self.config.subscribe(), tx.clone()),
        ];

        let mut modes = self.config.bus().performance_mode_changed.subscribe();
        let tx = tx.clone();
        tasks.push(runtime.spawn(async move {
            // Lagged receivers still mean "something changed".
            while !matches!(modes.recv().await, Err(RecvError::Closed)) {
                if tx.send(()).is_err() {
                    break;
                }
            }
        }));

        Forwarders(tasks)
    }
}

/// Change forwarders of a render loop, aborted with it.
struct Forwarders(Vec<JoinHandle<()>>);

impl Drop for Forwarders {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Runs the bar until interrupted.
///
/// Frames go to stdout, one JSON document per line.
///
/// # Errors
///
/// Fails when another bar already answers on the socket, when the runtime or
/// socket cannot be set up, or when stdout closes.
pub fn run(options: &RunOptions) -> Result<()> {
    if ipc::is_app_running() {
        return Err(BarikError::Ipc("Barik is already running".to_string()));
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(serve(options))
}

async fn serve(options: &RunOptions) -> Result<()> {
    let handle = Handle::current();
    let bus = EventBus::new();
    let config = match &options.config_path {
        Some(path) => ConfigStore::load_from(path, bus),
        None => ConfigStore::load(bus),
    };

    let app = App::new(
        &handle,
        config,
        Preferences::open_default(),
        UpdateChecker::new()?,
        VersionMarker::default(),
    );

    let _activation = app.spawn_activation_listener();
    let _watcher = if options.no_watch { None } else { app.config().watch(&handle) };
    let _updates = (!options.no_update_check).then(|| app.updater().spawn_periodic(&handle));

    let server_app = app.clone();
    let _server = IpcServer::start(ipc::get_socket_path(), move |query| server_app.handle(query))?;

    tracing::info!(version = APP_VERSION, mode = %app.performance().mode(), "barik started");

    tokio::select! {
        result = app.render_loop(BarRenderer::new(std::io::stdout())) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("interrupted, shutting down");
            Ok(())
        }
    }
}
