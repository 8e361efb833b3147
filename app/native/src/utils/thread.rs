//! Named OS threads for the blocking loops (IPC accept, file events).

use std::io;
use std::thread::{self, JoinHandle};

/// Starts `task` on a thread named `barik-<name>`.
///
/// # Errors
///
/// Returns the OS error when the thread cannot be created.
pub fn spawn_named_thread<F, T>(name: &str, task: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new().name(format!("barik-{name}")).spawn(task)
}
