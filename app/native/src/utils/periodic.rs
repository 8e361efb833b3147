//! Cancellable periodic task.
//!
//! A [`PeriodicTask`] owns one spawned tokio loop that awaits a fixed interval
//! and runs an async tick. Changing the cadence is done by cancelling the old
//! task and spawning a new one: there is never more than one loop per task.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::constants::timing::MIN_POLL_INTERVAL_MS;

/// Handle to a running periodic loop. Dropping it cancels the loop.
#[derive(Debug)]
pub struct PeriodicTask {
    period: Duration,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns `tick` on `runtime`, first immediately and then every `period`.
    ///
    /// Periods below the minimum poll interval are raised to it. Ticks that
    /// would pile up behind a slow tick are skipped, not burst.
    pub fn spawn<F, Fut>(runtime: &Handle, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(MIN_POLL_INTERVAL_MS));
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tick().await;
            }
        });

        Self { period, handle }
    }

    /// Returns the effective period.
    #[must_use]
    pub const fn period(&self) -> Duration { self.period }

    /// Returns `true` until the task has been cancelled.
    #[must_use]
    pub fn is_running(&self) -> bool { !self.handle.is_finished() }

    /// Stops the loop. A tick already in progress is aborted at its next await.
    pub fn cancel(self) { drop(self); }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) { self.handle.abort(); }
}
