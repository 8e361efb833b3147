//! Generic per-metric manager.
//!
//! A [`WidgetManager`] owns one [`MetricSource`], polls it on a
//! [`PeriodicTask`] at the cadence of its metric in the current performance
//! mode, and publishes the result as observable state. It follows two
//! broadcasts for its whole lifetime:
//!
//! - `widget_activation_changed`: the manager runs only while one of its
//!   widget ids is displayed;
//! - `performance_mode_changed`: an active manager restarts its task at the
//!   new interval.
//!
//! Polls run on the blocking pool; state writes happen on the runtime.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use eyeball::{SharedObservable, Subscriber};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::events::EventBus;
use crate::performance::{Metric, PerformanceController};
use crate::utils::periodic::PeriodicTask;
use crate::widgets::activation::ActivationRegistry;

/// A blocking poll of one OS or subprocess source.
pub trait MetricSource: Send + 'static {
    /// Published state.
    type State: Clone + Default + PartialEq + Serialize + Send + Sync + 'static;

    /// Key into the interval table.
    const METRIC: Metric;

    /// Widget ids that need this source.
    const WIDGET_IDS: &'static [&'static str];

    /// Reads the current state. Runs on the blocking pool.
    ///
    /// # Errors
    ///
    /// Any error keeps the previously published state.
    fn poll(&mut self) -> Result<Self::State>;

    /// Whether the state resets to `Default` when the manager deactivates.
    #[must_use]
    fn clears_on_deactivate() -> bool { false }
}

/// Services every manager depends on.
#[derive(Debug, Clone)]
pub struct ManagerContext {
    pub runtime: Handle,
    pub bus: EventBus,
    pub performance: PerformanceController,
    pub activation: ActivationRegistry,
}

impl ManagerContext {
    #[must_use]
    pub const fn new(
        runtime: Handle,
        bus: EventBus,
        performance: PerformanceController,
        activation: ActivationRegistry,
    ) -> Self {
        Self { runtime, bus, performance, activation }
    }
}

/// Observable state of one metric plus the timer that refreshes it.
pub struct WidgetManager<S: MetricSource> {
    inner: Arc<ManagerInner<S>>,
}

impl<S: MetricSource> Clone for WidgetManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: MetricSource> fmt::Debug for WidgetManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.inner.control.lock();
        f.debug_struct("WidgetManager")
            .field("metric", &S::METRIC)
            .field("active", &control.active)
            .field("interval", &control.interval)
            .finish_non_exhaustive()
    }
}

struct ManagerInner<S: MetricSource> {
    source: Arc<Mutex<S>>,
    state: SharedObservable<S::State>,
    ctx: ManagerContext,
    control: Mutex<Control>,
    /// Set after a failed poll so repeated failures are logged once.
    failing: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

struct Control {
    active: bool,
    interval: Duration,
    task: Option<PeriodicTask>,
}

impl<S: MetricSource> Drop for ManagerInner<S> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

impl<S: MetricSource> WidgetManager<S> {
    /// Creates the manager, binds its listeners and activates it when one of
    /// its widgets is displayed.
    #[must_use]
    pub fn new(source: S, ctx: ManagerContext) -> Self {
        let interval = ctx.performance.interval(S::METRIC);
        let manager = Self {
            inner: Arc::new(ManagerInner {
                source: Arc::new(Mutex::new(source)),
                state: SharedObservable::new(S::State::default()),
                ctx,
                control: Mutex::new(Control {
                    active: false,
                    interval,
                    task: None,
                }),
                failing: AtomicBool::new(false),
                listener: Mutex::new(None),
            }),
        };

        let listener = manager.spawn_listener();
        *manager.inner.listener.lock() = Some(listener);

        if manager.inner.ctx.activation.any_active(S::WIDGET_IDS) {
            manager.activate();
        }

        manager
    }

    /// Starts polling at the current interval, with an immediate first poll.
    pub fn activate(&self) {
        let mut control = self.inner.control.lock();
        if control.active {
            return;
        }

        control.active = true;
        control.interval = self.inner.ctx.performance.interval(S::METRIC);
        control.task = Some(self.spawn_task(control.interval));

        tracing::debug!(metric = S::METRIC.key(), interval = ?control.interval, "manager activated");
    }

    /// Stops polling. Sources that clear on deactivate reset their state.
    pub fn deactivate(&self) {
        {
            let mut control = self.inner.control.lock();
            if !control.active {
                return;
            }
            control.active = false;
            if let Some(task) = control.task.take() {
                task.cancel();
            }
        }

        if S::clears_on_deactivate() {
            self.inner.state.set(S::State::default());
        }

        tracing::debug!(metric = S::METRIC.key(), "manager deactivated");
    }

    /// Restarts the task at `interval` if active and the interval changed.
    pub fn update_interval(&self, interval: Duration) {
        let mut control = self.inner.control.lock();
        if control.interval == interval {
            return;
        }

        control.interval = interval;
        if !control.active {
            return;
        }

        if let Some(task) = control.task.take() {
            task.cancel();
        }
        control.task = Some(self.spawn_task(interval));

        tracing::debug!(metric = S::METRIC.key(), interval = ?interval, "manager interval updated");
    }

    #[must_use]
    pub fn is_active(&self) -> bool { self.inner.control.lock().active }

    /// Interval of the current (or last) polling task.
    #[must_use]
    pub fn interval(&self) -> Duration { self.inner.control.lock().interval }

    /// Latest published state.
    #[must_use]
    pub fn state(&self) -> S::State { self.inner.state.get() }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> Subscriber<S::State> { self.inner.state.subscribe() }

    /// Polls once outside the timer and waits for the result.
    pub async fn poll_now(&self) { ManagerInner::poll(Arc::clone(&self.inner)).await; }

    /// Runs `f` with exclusive access to the source, e.g. for control
    /// commands. Blocks while a poll is in progress.
    pub fn with_source<R>(&self, f: impl FnOnce(&mut S) -> R) -> R { f(&mut self.inner.source.lock()) }

    fn apply_activation(&self, active: bool) {
        if active {
            self.activate();
        } else {
            self.deactivate();
        }
    }

    fn spawn_task(&self, interval: Duration) -> PeriodicTask {
        let weak = Arc::downgrade(&self.inner);
        PeriodicTask::spawn(&self.inner.ctx.runtime, interval, move || {
            let weak = Weak::clone(&weak);
            async move {
                if let Some(inner) = weak.upgrade() {
                    ManagerInner::poll(inner).await;
                }
            }
        })
    }

    fn spawn_listener(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let ctx = &self.inner.ctx;
        let performance = ctx.performance.clone();
        let activation = ctx.activation.clone();
        let mut intervals_rx = ctx.bus.performance_mode_changed.subscribe();
        let mut activation_rx = ctx.bus.widget_activation_changed.subscribe();

        ctx.runtime.spawn(async move {
            loop {
                tokio::select! {
                    received = intervals_rx.recv() => {
                        let interval = match received {
                            Ok(table) => table.get(S::METRIC),
                            Err(RecvError::Lagged(_)) => performance.interval(S::METRIC),
                            Err(RecvError::Closed) => break,
                        };
                        let Some(manager) = Self::upgrade(&weak) else { break };
                        manager.update_interval(interval);
                    }
                    received = activation_rx.recv() => {
                        let active = match received {
                            Ok(set) => set.contains_any(S::WIDGET_IDS),
                            Err(RecvError::Lagged(_)) => activation.any_active(S::WIDGET_IDS),
                            Err(RecvError::Closed) => break,
                        };
                        let Some(manager) = Self::upgrade(&weak) else { break };
                        manager.apply_activation(active);
                    }
                }
            }
        })
    }

    fn upgrade(weak: &Weak<ManagerInner<S>>) -> Option<Self> { weak.upgrade().map(|inner| Self { inner }) }
}

impl<S: MetricSource> ManagerInner<S> {
    async fn poll(inner: Arc<Self>) {
        let source = Arc::clone(&inner.source);
        let result = tokio::task::spawn_blocking(move || source.lock().poll()).await;

        match result {
            Ok(Ok(state)) => {
                inner.failing.store(false, Ordering::Relaxed);
                inner.state.set_if_not_eq(state);
            }
            Ok(Err(err)) => {
                if inner.failing.swap(true, Ordering::Relaxed) {
                    tracing::debug!(metric = S::METRIC.key(), error = %err, "poll still failing");
                } else {
                    tracing::warn!(metric = S::METRIC.key(), error = %err, "poll failed, keeping last state");
                }
            }
            Err(err) => {
                tracing::error!(metric = S::METRIC.key(), error = %err, "poll task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::config::Config;
    use crate::error::BarikError;
    use crate::performance::PerformanceMode;
    use crate::preferences::Preferences;

    struct CountingSource {
        polls: Arc<AtomicUsize>,
        fail_after: Option<usize>,
    }

    impl MetricSource for CountingSource {
        type State = usize;

        const METRIC: Metric = Metric::Battery;
        const WIDGET_IDS: &'static [&'static str] = &["test.counter"];

        fn poll(&mut self) -> Result<usize> {
            let count = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.fail_after {
                Some(limit) if count > limit => Err(BarikError::Command("boom".into())),
                _ => Ok(count),
            }
        }
    }

    struct ClearingSource;

    impl MetricSource for ClearingSource {
        type State = String;

        const METRIC: Metric = Metric::NowPlaying;
        const WIDGET_IDS: &'static [&'static str] = &["test.clearing"];

        fn poll(&mut self) -> Result<String> { Ok("playing".to_string()) }

        fn clears_on_deactivate() -> bool { true }
    }

    fn context(displayed: &str) -> ManagerContext {
        let config = Config::parse(&format!("[widgets]\ndisplayed = {displayed}")).unwrap();
        let bus = EventBus::new();
        let performance = PerformanceController::new(Preferences::in_memory(), bus.clone());
        let activation = ActivationRegistry::new(&config, bus.clone());
        ManagerContext::new(Handle::current(), bus, performance, activation)
    }

    fn counting(ctx: &ManagerContext) -> (WidgetManager<CountingSource>, Arc<AtomicUsize>) {
        let polls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            polls: Arc::clone(&polls),
            fail_after: None,
        };
        (WidgetManager::new(source, ctx.clone()), polls)
    }

    async fn settle() { tokio::time::sleep(Duration::from_millis(5)).await; }

    #[tokio::test(start_paused = true)]
    async fn manager_of_hidden_widget_never_polls() {
        let ctx = context(r#"["default.time"]"#);
        let (manager, polls) = counting(&ctx);

        assert!(!manager.is_active());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 0);

        // An unrelated activation change keeps it off.
        ctx.activation.refresh(&Config::parse("[widgets]\ndisplayed = [\"spacer\"]").unwrap());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!manager.is_active());
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn displayed_widget_polls_immediately_then_per_interval() {
        let ctx = context(r#"["test.counter"]"#);
        let (manager, polls) = counting(&ctx);

        assert!(manager.is_active());
        assert_eq!(manager.interval(), Duration::from_secs(30));
        settle().await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn mode_switch_restarts_timer_without_toggling_activation() {
        let ctx = context(r#"["test.counter"]"#);
        let (manager, polls) = counting(&ctx);
        settle().await;

        ctx.performance.set_mode(PerformanceMode::MaxPerformance);
        settle().await;

        assert!(manager.is_active());
        assert_eq!(manager.interval(), Duration::from_secs(1));
        let after_restart = polls.load(Ordering::SeqCst);
        assert_eq!(after_restart, 2, "restart polls immediately");

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(polls.load(Ordering::SeqCst), after_restart + 5);
    }

    #[tokio::test(start_paused = true)]
    async fn same_interval_does_not_restart() {
        let ctx = context(r#"["test.counter"]"#);
        let (manager, polls) = counting(&ctx);
        settle().await;

        manager.update_interval(Duration::from_secs(30));
        settle().await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_while_inactive_does_not_start() {
        let ctx = context("[]");
        let (manager, polls) = counting(&ctx);

        ctx.performance.set_mode(PerformanceMode::MaxPerformance);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!manager.is_active());
        assert_eq!(polls.load(Ordering::SeqCst), 0);

        manager.activate();
        assert_eq!(manager.interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn activation_broadcast_starts_and_stops_polling() {
        let ctx = context("[]");
        let (manager, polls) = counting(&ctx);

        ctx.activation.refresh(&Config::parse("[widgets]\ndisplayed = [\"test.counter\"]").unwrap());
        settle().await;
        assert!(manager.is_active());
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        ctx.activation.refresh(&Config::parse("[widgets]\ndisplayed = []").unwrap());
        settle().await;
        assert!(!manager.is_active());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn activate_is_idempotent() {
        let ctx = context(r#"["test.counter"]"#);
        let (manager, polls) = counting(&ctx);

        manager.activate();
        manager.activate();
        settle().await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        manager.deactivate();
        manager.deactivate();
        assert!(!manager.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_keeps_last_state() {
        let ctx = context(r#"["test.counter"]"#);
        let polls = Arc::new(AtomicUsize::new(0));
        let manager = WidgetManager::new(
            CountingSource {
                polls: Arc::clone(&polls),
                fail_after: Some(1),
            },
            ctx,
        );
        settle().await;
        assert_eq!(manager.state(), 1);

        manager.poll_now().await;
        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_source_resets_state_on_deactivate() {
        let ctx = context(r#"["test.clearing"]"#);
        let manager = WidgetManager::new(ClearingSource, ctx);
        settle().await;
        assert_eq!(manager.state(), "playing");

        manager.deactivate();
        assert_eq!(manager.state(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_manager_stops_polling() {
        let ctx = context(r#"["test.counter"]"#);
        let (manager, polls) = counting(&ctx);
        settle().await;

        drop(manager);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }
}
