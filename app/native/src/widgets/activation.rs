//! Widget activation registry.
//!
//! The active set is the set of widget ids listed in `widgets.displayed`,
//! plus `popup.<id>` while the popup of widget `<id>` is open. It is
//! recomputed and broadcast on every configuration change and popup
//! transition, and managers decide from it whether their timer should run.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::events::{EventBus, PopupEvent};

const POPUP_PREFIX: &str = "popup.";

/// Entry the open popup of `widget_id` adds to the active set.
#[must_use]
pub fn popup_entry(widget_id: &str) -> String { format!("{POPUP_PREFIX}{widget_id}") }

/// Ids of the widgets currently displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActiveWidgets(BTreeSet<String>);

impl ActiveWidgets {
    /// The displayed ids of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        config.displayed().iter().map(|item| item.id.clone()).collect()
    }

    #[must_use]
    pub fn contains(&self, widget_id: &str) -> bool { self.0.contains(widget_id) }

    /// `true` when at least one of `widget_ids` is displayed.
    #[must_use]
    pub fn contains_any(&self, widget_ids: &[&str]) -> bool {
        widget_ids.iter().any(|id| self.contains(id))
    }

    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }
}

impl<S: Into<String>> FromIterator<S> for ActiveWidgets {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Default)]
struct ActivationState {
    displayed: ActiveWidgets,
    /// Widget whose popup is open.
    popup: Option<String>,
}

impl ActivationState {
    fn active(&self) -> ActiveWidgets {
        let mut active = self.displayed.clone();
        if let Some(id) = &self.popup {
            active.0.insert(popup_entry(id));
        }
        active
    }
}

/// Holds the active set and broadcasts it after every config change and
/// popup transition.
#[derive(Debug, Clone)]
pub struct ActivationRegistry {
    state: Arc<RwLock<ActivationState>>,
    bus: EventBus,
}

impl ActivationRegistry {
    #[must_use]
    pub fn new(config: &Config, bus: EventBus) -> Self {
        let state = ActivationState {
            displayed: ActiveWidgets::from_config(config),
            popup: None,
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            bus,
        }
    }

    #[must_use]
    pub fn is_active(&self, widget_id: &str) -> bool { self.active().contains(widget_id) }

    #[must_use]
    pub fn any_active(&self, widget_ids: &[&str]) -> bool { self.active().contains_any(widget_ids) }

    /// Snapshot of the active set.
    #[must_use]
    pub fn active(&self) -> ActiveWidgets { self.state.read().active() }

    /// Recomputes the set from `config` and broadcasts it, changed or not.
    pub fn refresh(&self, config: &Config) {
        let active = {
            let mut state = self.state.write();
            state.displayed = ActiveWidgets::from_config(config);
            state.active()
        };
        tracing::debug!(count = active.len(), "widget activation refreshed");

        self.bus.widget_activation_changed.publish(active);
    }

    /// Records the widget whose popup is open and broadcasts the set when
    /// that changes.
    pub fn set_open_popup(&self, widget_id: Option<&str>) {
        let active = {
            let mut state = self.state.write();
            if state.popup.as_deref() == widget_id {
                return;
            }
            state.popup = widget_id.map(str::to_string);
            state.active()
        };
        tracing::debug!(popup = ?widget_id, "popup activation changed");

        self.bus.widget_activation_changed.publish(active);
    }

    /// Refreshes the registry whenever the configuration is reparsed or the
    /// popup opens or closes.
    pub fn spawn_listener(&self, runtime: &Handle) -> JoinHandle<()> {
        let registry = self.clone();
        let mut config_rx = self.bus.config_changed.subscribe();
        let mut popup_rx = self.bus.popup.subscribe();

        runtime.spawn(async move {
            loop {
                tokio::select! {
                    received = config_rx.recv() => match received {
                        Ok(config) => registry.refresh(&config),
                        // The retained messages end with the latest tree.
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "activation listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    received = popup_rx.recv() => match received {
                        Ok(PopupEvent::WillShow { id }) => registry.set_open_popup(Some(&id)),
                        Ok(PopupEvent::WillHide { .. }) => registry.set_open_popup(None),
                        // A swap ends with `WillShow` of the new content.
                        Ok(PopupEvent::WillChangeContent { .. }) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "popup listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(displayed: &str) -> Config {
        Config::parse(&format!("[widgets]\ndisplayed = {displayed}")).unwrap()
    }

    #[test]
    fn active_set_follows_displayed_list() {
        let registry = ActivationRegistry::new(
            &config(r#"["default.spaces", { "default.time" = { format = "HH:mm" } }]"#),
            EventBus::new(),
        );

        assert!(registry.is_active("default.spaces"));
        assert!(registry.is_active("default.time"));
        assert!(!registry.is_active("default.battery"));
        assert!(registry.any_active(&["default.cpuram", "default.spaces"]));
        assert!(!registry.any_active(&["default.cpuram", "default.networkactivity"]));
    }

    #[test]
    fn refresh_broadcasts_even_when_unchanged() {
        let bus = EventBus::new();
        let mut rx = bus.widget_activation_changed.subscribe();
        let cfg = config(r#"["default.battery"]"#);
        let registry = ActivationRegistry::new(&cfg, bus);

        registry.refresh(&cfg);
        registry.refresh(&config("[]"));

        assert_eq!(rx.try_recv().unwrap(), ActiveWidgets::from_iter(["default.battery"]));
        assert!(rx.try_recv().unwrap().is_empty());
        assert!(!registry.is_active("default.battery"));
    }

    #[test]
    fn active_widgets_serialize_as_sorted_list() {
        let active = ActiveWidgets::from_iter(["default.time", "default.battery"]);
        assert_eq!(serde_json::to_string(&active).unwrap(), r#"["default.battery","default.time"]"#);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_refreshes_on_config_change() {
        let bus = EventBus::new();
        let registry = ActivationRegistry::new(&config("[]"), bus.clone());
        let _listener = registry.spawn_listener(&Handle::current());
        tokio::task::yield_now().await;

        bus.config_changed.publish(Arc::new(config(r#"["default.nowplaying"]"#)));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(registry.is_active("default.nowplaying"));
    }

    #[test]
    fn open_popup_adds_its_entry() {
        let bus = EventBus::new();
        let mut rx = bus.widget_activation_changed.subscribe();
        let registry = ActivationRegistry::new(&config(r#"["default.cpuram"]"#), bus);

        registry.set_open_popup(Some("default.cpuram"));
        registry.set_open_popup(Some("default.cpuram"));
        assert!(registry.is_active("popup.default.cpuram"));
        assert!(registry.is_active("default.cpuram"));

        // Config reloads keep the open popup.
        registry.refresh(&config("[]"));
        assert!(registry.is_active("popup.default.cpuram"));

        registry.set_open_popup(None);
        assert!(registry.active().is_empty());

        let broadcasts: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(broadcasts.len(), 3, "repeating the open popup is silent");
    }

    #[tokio::test(start_paused = true)]
    async fn listener_follows_popup_events() {
        let bus = EventBus::new();
        let registry = ActivationRegistry::new(&config("[]"), bus.clone());
        let _listener = registry.spawn_listener(&Handle::current());
        tokio::task::yield_now().await;

        bus.popup.publish(PopupEvent::WillShow { id: "default.time".into() });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(registry.is_active(&popup_entry("default.time")));

        bus.popup.publish(PopupEvent::WillChangeContent {
            from: Some("default.time".into()),
            to: "default.cpuram".into(),
        });
        bus.popup.publish(PopupEvent::WillShow { id: "default.cpuram".into() });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!registry.is_active(&popup_entry("default.time")));
        assert!(registry.is_active(&popup_entry("default.cpuram")));

        bus.popup.publish(PopupEvent::WillHide { id: Some("default.cpuram".into()) });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(registry.active().is_empty());
    }
}
