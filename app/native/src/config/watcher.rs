//! Configuration file watcher for hot-reloading.
//!
//! The watcher observes the config file's parent directory (some editors save
//! by writing a temp file and renaming it over the original) and filters
//! events by file name. Matching events are forwarded to a task on the main
//! runtime, which waits for the burst to settle and then runs the reload
//! callback there. Dropping the [`ConfigWatcher`] stops both the thread and
//! the task.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Sender, channel};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils::thread::spawn_named_thread;

/// Debounce duration for config file changes.
/// Some editors trigger multiple events per save (write to temp, rename, etc.).
const CONFIG_DEBOUNCE_MS: u64 = 200;

/// Input of the watcher thread.
enum WatchMessage {
    Fs(notify::Result<Event>),
    Shutdown,
}

/// Keeps the watch alive. Dropping it stops reloading.
pub struct ConfigWatcher {
    path: PathBuf,
    task: JoinHandle<()>,
    control: Sender<WatchMessage>,
    thread: Option<std::thread::JoinHandle<()>>,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher").field("path", &self.path).finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// The watched config file.
    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Stops the reload task and joins the watcher thread. Returns `true`
    /// when this call joined the thread.
    fn stop(&mut self) -> bool {
        self.task.abort();
        // Fails only when the thread is already gone.
        let _ = self.control.send(WatchMessage::Shutdown);
        self.thread.take().is_some_and(|thread| thread.join().is_ok())
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) { self.stop(); }
}

/// Starts watching `config_path` and calls `on_change` on `runtime` after
/// each settled burst of writes.
///
/// Returns `None` (after logging) when the watcher cannot be set up; the app
/// then simply runs without live reload.
pub fn watch<F>(config_path: &Path, runtime: &Handle, on_change: F) -> Option<ConfigWatcher>
where F: Fn() + Send + 'static {
    let config_filename: OsString = config_path.file_name()?.to_os_string();
    let watch_path = config_path.parent().unwrap_or(config_path).to_path_buf();

    let (tx, rx) = channel::<WatchMessage>();
    let fs_tx = tx.clone();
    let handler = move |result: notify::Result<Event>| {
        // The thread is gone once the watcher shuts down.
        let _ = fs_tx.send(WatchMessage::Fs(result));
    };
    let mut watcher = match notify::recommended_watcher(handler) {
        Ok(watcher) => watcher,
        Err(err) => {
            tracing::warn!(error = %err, "failed to create config watcher");
            return None;
        }
    };

    if let Err(err) = watcher.watch(&watch_path, RecursiveMode::NonRecursive) {
        tracing::warn!(error = %err, path = %watch_path.display(), "failed to watch config file");
        return None;
    }

    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<()>();

    let spawned = spawn_named_thread("config-watcher", move || {
        for message in rx {
            match message {
                WatchMessage::Fs(Ok(event)) => {
                    if !affects_config(&event, &config_filename) {
                        continue;
                    }
                    if changed_tx.send(()).is_err() {
                        // Reload task is gone.
                        break;
                    }
                }
                WatchMessage::Fs(Err(err)) => tracing::warn!(error = %err, "config watch error"),
                WatchMessage::Shutdown => break,
            }
        }
        tracing::debug!("config watcher stopped");
    });
    let thread = match spawned {
        Ok(thread) => thread,
        Err(err) => {
            tracing::warn!(error = %err, "failed to start config watcher thread");
            return None;
        }
    };

    let task = runtime.spawn(async move {
        let debounce = Duration::from_millis(CONFIG_DEBOUNCE_MS);
        while changed_rx.recv().await.is_some() {
            tokio::time::sleep(debounce).await;
            while changed_rx.try_recv().is_ok() {}
            tracing::debug!("config file changed");
            on_change();
        }
    });

    Some(ConfigWatcher {
        path: config_path.to_path_buf(),
        task,
        control: tx,
        thread: Some(thread),
        _watcher: watcher,
    })
}

/// Whether a filesystem event touches the config file itself.
fn affects_config(event: &Event, config_filename: &OsString) -> bool {
    if event.kind.is_access() {
        return false;
    }

    event.paths.iter().any(|path| path.file_name().is_some_and(|name| name == config_filename))
}

#[cfg(test)]
mod tests {
    use notify::EventKind;
    use notify::event::{AccessKind, ModifyKind};

    use super::*;

    #[test]
    fn config_debounce_duration_is_reasonable() {
        // Debounce should be at least 100ms but not more than 1 second
        const { assert!(CONFIG_DEBOUNCE_MS >= 100) };
        const { assert!(CONFIG_DEBOUNCE_MS <= 1000) };
    }

    #[test]
    fn filters_by_file_name() {
        let name = OsString::from("config.toml");
        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/home/u/.config/barik/config.toml"));
        let other = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/home/u/.config/barik/config.toml.swp"));

        assert!(affects_config(&modify, &name));
        assert!(!affects_config(&other, &name));
    }

    #[test]
    fn ignores_access_events() {
        let name = OsString::from("config.toml");
        let access = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/tmp/config.toml"));
        assert!(!affects_config(&access, &name));
    }

    #[tokio::test]
    async fn stopping_joins_the_thread_without_a_file_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "theme = \"dark\"\n").unwrap();

        let mut watcher = watch(&path, &Handle::current(), || {}).unwrap();
        assert_eq!(watcher.path(), path);

        assert!(watcher.stop());
        assert!(!watcher.stop(), "the thread is joined once");
    }
}
