//! Typed event bus shared by every service.
//!
//! Each concern owns one [`Topic`] with a concrete payload type, backed by a
//! `tokio::sync::broadcast` channel. Publishing never fails when there are no
//! subscribers, and a subscriber that falls behind sees
//! [`RecvError::Lagged`](tokio::sync::broadcast::error::RecvError::Lagged) and
//! is expected to resynchronize from the owning service.
//!
//! ## Naming Convention
//!
//! Topic names follow the pattern `barik://<module>/<event-name>` and are only
//! used as log fields.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::performance::IntervalTable;
use crate::widgets::activation::ActiveWidgets;

/// Channel capacity for every topic.
const TOPIC_CAPACITY: usize = 32;

/// Topic names.
pub mod names {
    /// The configuration file was reparsed.
    pub const CONFIG_CHANGED: &str = "barik://config/changed";

    /// The performance mode changed. Payload: the full interval table.
    pub const PERFORMANCE_MODE_CHANGED: &str = "barik://performance/mode-changed";

    /// The displayed widget set was recomputed. Payload: the active id set.
    pub const WIDGET_ACTIVATION_CHANGED: &str = "barik://widgets/activation-changed";

    /// Popup show, hide and content-change signals.
    pub const POPUP: &str = "barik://popup/state";
}

/// Popup presenter signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PopupEvent {
    /// The popup became visible with the given content.
    WillShow { id: String },
    /// The popup starts its close animation.
    WillHide { id: Option<String> },
    /// The visible popup swaps to different content.
    WillChangeContent { from: Option<String>, to: String },
}

/// A named broadcast channel with a fixed payload type.
#[derive(Debug)]
pub struct Topic<T> {
    name: &'static str,
    sender: broadcast::Sender<T>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Topic<T> {
    fn new(name: &'static str) -> Self {
        let (sender, _) = broadcast::channel(TOPIC_CAPACITY);
        Self { name, sender }
    }

    /// Returns the topic name.
    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// Publishes a payload to every current subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, payload: T) -> usize {
        let delivered = self.sender.send(payload).unwrap_or(0);
        tracing::trace!(topic = self.name, delivered, "published");
        delivered
    }

    /// Subscribes to future payloads.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<T> { self.sender.subscribe() }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize { self.sender.receiver_count() }
}

/// All topics of the application.
///
/// Cloning the bus is cheap, every clone publishes to the same channels.
#[derive(Debug, Clone)]
pub struct EventBus {
    pub config_changed: Topic<Arc<Config>>,
    pub performance_mode_changed: Topic<IntervalTable>,
    pub widget_activation_changed: Topic<ActiveWidgets>,
    pub popup: Topic<PopupEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_changed: Topic::new(names::CONFIG_CHANGED),
            performance_mode_changed: Topic::new(names::PERFORMANCE_MODE_CHANGED),
            widget_activation_changed: Topic::new(names::WIDGET_ACTIVATION_CHANGED),
            popup: Topic::new(names::POPUP),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self { Self::new() }
}
