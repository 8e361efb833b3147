//! Shared popup panel.
//!
//! One [`PopupPresenter`] owns the only panel. Showing the content that is
//! already open closes it, showing other content swaps it with a cross-fade,
//! and losing key status closes it after the animation.

mod panel;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub use self::panel::{HeadlessPanel, PopupContent, PopupPanel, PopupView};
use crate::constants::layout::{POPUP_DEFAULT_WIDTH, POPUP_SCREEN_MARGIN};
use crate::constants::timing::POPUP_ANIMATION_MS;
use crate::events::{EventBus, PopupEvent};

/// Screen-space rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self { Self { x, y, width, height } }

    #[must_use]
    pub const fn mid_x(&self) -> f64 { self.x + self.width / 2.0 }
}

/// Left edge of a popup of `width` centred under `anchor`, kept
/// [`POPUP_SCREEN_MARGIN`] away from both screen edges.
#[must_use]
pub fn popup_origin_x(anchor: &Rect, width: f64, screen_width: f64) -> f64 {
    let max = screen_width - width - POPUP_SCREEN_MARGIN;
    (anchor.mid_x() - width / 2.0).min(max).max(POPUP_SCREEN_MARGIN)
}

struct PresenterState<P> {
    panel: P,
    last_id: Option<String>,
    /// Delayed swap or hide; a newer action aborts it.
    pending: Option<JoinHandle<()>>,
}

impl<P> PresenterState<P> {
    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

/// Drives the popup panel and announces its transitions on the bus.
pub struct PopupPresenter<P: PopupPanel> {
    state: Arc<Mutex<PresenterState<P>>>,
    bus: EventBus,
    screen: Rect,
    runtime: Handle,
    animation: Duration,
}

impl<P: PopupPanel> Clone for PopupPresenter<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            bus: self.bus.clone(),
            screen: self.screen,
            runtime: self.runtime.clone(),
            animation: self.animation,
        }
    }
}

impl<P: PopupPanel> std::fmt::Debug for PopupPresenter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupPresenter")
            .field("screen", &self.screen)
            .field("last_id", &self.state.lock().last_id)
            .finish_non_exhaustive()
    }
}

impl<P: PopupPanel> PopupPresenter<P> {
    #[must_use]
    pub fn new(runtime: &Handle, panel: P, bus: EventBus, screen: Rect) -> Self {
        Self {
            state: Arc::new(Mutex::new(PresenterState {
                panel,
                last_id: None,
                pending: None,
            })),
            bus,
            screen,
            runtime: runtime.clone(),
            animation: Duration::from_millis(POPUP_ANIMATION_MS),
        }
    }

    /// Id of the content last shown, kept until a toggle closes it.
    #[must_use]
    pub fn current_id(&self) -> Option<String> { self.state.lock().last_id.clone() }

    #[must_use]
    pub fn is_key(&self) -> bool { self.state.lock().panel.is_key() }

    /// Opens `id` under `anchor`, or closes it when it is already open.
    pub fn show(&self, anchor: Rect, id: &str, body: serde_json::Value) {
        let mut state = self.state.lock();
        let is_key = state.panel.is_key();

        if is_key && state.last_id.as_deref() == Some(id) {
            self.bus.popup.publish(PopupEvent::WillHide { id: Some(id.to_string()) });
            state.cancel_pending();
            state.pending = Some(self.after(self.animation, |state| {
                state.panel.order_out();
                state.last_id = None;
            }));
            return;
        }

        let previous = state.last_id.replace(id.to_string());
        let is_content_change = is_key && previous.is_some();
        state.cancel_pending();

        let content = PopupContent {
            id: id.to_string(),
            origin_x: popup_origin_x(&anchor, POPUP_DEFAULT_WIDTH, self.screen.width),
            width: POPUP_DEFAULT_WIDTH,
            body,
        };

        if is_key {
            self.bus.popup.publish(PopupEvent::WillChangeContent {
                from: previous,
                to: id.to_string(),
            });
            let delay = if is_content_change { self.animation / 2 } else { self.animation };
            let bus = self.bus.clone();
            let id = id.to_string();
            state.pending = Some(self.after(delay, move |state| {
                state.panel.set_content(content);
                state.panel.present();
                bus.popup.publish(PopupEvent::WillShow { id });
            }));
        } else {
            state.panel.set_content(content);
            state.panel.present();
            self.bus.popup.publish(PopupEvent::WillShow { id: id.to_string() });
        }
    }

    /// The panel lost key status: close it after the animation unless a new
    /// `show` comes first.
    pub fn resign_key(&self) {
        let mut state = self.state.lock();
        state.panel.resign_key();
        self.bus.popup.publish(PopupEvent::WillHide { id: state.last_id.clone() });
        state.cancel_pending();
        state.pending = Some(self.after(self.animation, |state| state.panel.order_out()));
    }

    /// Runs `f` after `delay` on the runtime.
    fn after<F>(&self, delay: Duration, f: F) -> JoinHandle<()>
    where F: FnOnce(&mut PresenterState<P>) + Send + 'static {
        let state = Arc::clone(&self.state);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = state.lock();
            state.pending = None;
            f(&mut state);
        })
    }
}
