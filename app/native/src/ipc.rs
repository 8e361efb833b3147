//! Unix domain socket between the CLI and the running bar.
//!
//! The bar listens on `<cache dir>/barik.sock`. A client connects, writes one
//! JSON query line and reads one JSON response line:
//!
//! ```json
//! {"type": "setMode", "mode": "balanced"}
//! {"type": "focusSpace", "id": "2", "needWindowFocus": true}
//! ```
//!
//! Responses carry either `data` or `error`:
//!
//! ```json
//! {"data": "balanced"}
//! {"error": "no window manager detected"}
//! ```

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::get_cache_dir;
use crate::constants::APP_NAME;
use crate::error::BarikError;
use crate::performance::PerformanceMode;
use crate::popup::Rect;
use crate::utils::thread::spawn_named_thread;
use crate::widgets::now_playing::MediaAction;

/// Timeout for socket reads and writes.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts made while the socket refuses connections.
const MAX_RETRIES: u32 = 3;

const RETRY_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// Messages
// ============================================================================

/// Requests from the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IpcQuery {
    Ping,
    /// The frame currently on screen.
    State,
    GetMode,
    SetMode { mode: PerformanceMode },
    /// Opens (or toggles) the popup of a widget.
    Popup {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<Rect>,
    },
    PopupDismiss,
    Media { action: MediaAction },
    Volume {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        muted: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    FocusSpace {
        id: String,
        #[serde(default)]
        need_window_focus: bool,
    },
    FocusWindow { id: i64 },
    /// Hides the "what's new" banner for this version.
    DismissBanner,
    ReloadConfig,
}

/// Reply to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpcResponse {
    Success { data: serde_json::Value },
    Error { error: String },
}

impl IpcResponse {
    pub fn success(data: impl Serialize) -> Self {
        Self::Success {
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn error(message: impl Into<String>) -> Self { Self::Error { error: message.into() } }

    /// Converts the reply into a result for the caller.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Remote`] for error replies.
    pub fn into_result(self) -> Result<serde_json::Value, IpcError> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Error { error } => Err(IpcError::Remote(error)),
        }
    }
}

impl<T: Serialize> From<crate::error::Result<T>> for IpcResponse {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::error(err.to_string()),
        }
    }
}

// ============================================================================
// Socket path
// ============================================================================

/// Path of the bar's socket.
#[must_use]
pub fn get_socket_path() -> PathBuf { get_cache_dir().join(format!("{APP_NAME}.sock")) }

// ============================================================================
// Server (bar side)
// ============================================================================

type Handler = dyn Fn(IpcQuery) -> IpcResponse + Send + Sync;

/// Running socket server. Dropping it stops accepting and removes the socket.
#[derive(Debug)]
pub struct IpcServer {
    path: PathBuf,
    running: Arc<AtomicBool>,
}

impl IpcServer {
    /// Binds `path` and answers every connection with `handler` on a
    /// background thread. A stale socket file is replaced.
    ///
    /// # Errors
    ///
    /// Returns the IO error when the socket cannot be bound.
    pub fn start<F>(path: impl Into<PathBuf>, handler: F) -> io::Result<Self>
    where F: Fn(IpcQuery) -> IpcResponse + Send + Sync + 'static {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        remove_socket(&path);

        let listener = UnixListener::bind(&path)?;
        tracing::info!(path = %path.display(), "ipc server listening");

        let running = Arc::new(AtomicBool::new(true));
        let handler: Arc<Handler> = Arc::new(handler);
        let flag = Arc::clone(&running);
        spawn_named_thread("ipc-server", move || server_loop(&listener, &flag, &handler))?;

        Ok(Self { path, running })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Wakes the accept loop so it sees the flag.
        let _ = UnixStream::connect(&self.path);
        remove_socket(&self.path);
    }
}

fn remove_socket(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

fn server_loop(listener: &UnixListener, running: &AtomicBool, handler: &Arc<Handler>) {
    for stream in listener.incoming() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        match stream {
            Ok(stream) => {
                let handler = Arc::clone(handler);
                let spawned = spawn_named_thread("ipc-conn", move || {
                    if let Err(err) = handle_connection(stream, handler.as_ref()) {
                        tracing::debug!(error = %err, "ipc connection failed");
                    }
                });
                if let Err(err) = spawned {
                    tracing::error!(error = %err, "failed to spawn ipc connection thread");
                }
            }
            Err(err) => tracing::warn!(error = %err, "ipc accept failed"),
        }
    }
    tracing::debug!("ipc server stopped");
}

fn handle_connection(stream: UnixStream, handler: &Handler) -> io::Result<()> {
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(());
    }

    let response = match serde_json::from_str::<IpcQuery>(line.trim()) {
        Ok(query) => {
            tracing::debug!(?query, "ipc query");
            handler(query)
        }
        Err(err) => IpcResponse::error(format!("Invalid query: {err}")),
    };

    let json = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string());
    let mut stream = reader.into_inner();
    writeln!(stream, "{json}")
}

// ============================================================================
// Client (CLI side)
// ============================================================================

#[derive(Debug, Error)]
pub enum IpcError {
    /// No socket, or nothing accepting on it.
    #[error("Barik is not running")]
    AppNotRunning,
    #[error("Connection timed out")]
    Timeout,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The bar answered with an error.
    #[error("{0}")]
    Remote(String),
}

impl From<IpcError> for BarikError {
    fn from(err: IpcError) -> Self { Self::Ipc(err.to_string()) }
}

/// Sends `query` to the running bar.
///
/// # Errors
///
/// See [`send_query_to`].
pub fn send_query(query: &IpcQuery) -> Result<IpcResponse, IpcError> { send_query_to(&get_socket_path(), query) }

/// Sends `query` to the socket at `path`, retrying up to three times while
/// nothing accepts connections.
///
/// # Errors
///
/// Returns [`IpcError::AppNotRunning`] when nothing listens, or the timeout,
/// IO or decoding error of the last attempt.
pub fn send_query_to(path: &Path, query: &IpcQuery) -> Result<IpcResponse, IpcError> {
    let mut attempt = 1;
    loop {
        match send_query_once(path, query) {
            Err(IpcError::AppNotRunning) if attempt < MAX_RETRIES => {
                attempt += 1;
                std::thread::sleep(RETRY_DELAY);
            }
            result => return result,
        }
    }
}

fn send_query_once(path: &Path, query: &IpcQuery) -> Result<IpcResponse, IpcError> {
    if !path.exists() {
        return Err(IpcError::AppNotRunning);
    }

    let mut stream = UnixStream::connect(path).map_err(|err| match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotFound
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset => IpcError::AppNotRunning,
        _ => IpcError::Io(err),
    })?;
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

    let json = serde_json::to_string(query)
        .map_err(|err| IpcError::InvalidResponse(format!("Failed to serialize query: {err}")))?;
    writeln!(stream, "{json}").map_err(|err| match err.kind() {
        io::ErrorKind::BrokenPipe => IpcError::AppNotRunning,
        _ => IpcError::Io(err),
    })?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).map_err(|err| match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => IpcError::Timeout,
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => IpcError::AppNotRunning,
        _ => IpcError::Io(err),
    })?;

    serde_json::from_str(line.trim())
        .map_err(|err| IpcError::InvalidResponse(format!("Failed to parse response: {err}")))
}

/// Whether a bar answers on the default socket.
#[must_use]
pub fn is_app_running() -> bool {
    matches!(send_query(&IpcQuery::Ping), Ok(IpcResponse::Success { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_lives_in_the_cache_dir() {
        let path = get_socket_path();
        assert!(path.ends_with("barik.sock"));
        assert!(path.starts_with(get_cache_dir()));
    }

    #[test]
    fn queries_use_camel_case_tags() {
        assert_eq!(serde_json::to_string(&IpcQuery::PopupDismiss).unwrap(), r#"{"type":"popupDismiss"}"#);
        assert_eq!(
            serde_json::to_string(&IpcQuery::SetMode { mode: PerformanceMode::MaxPerformance }).unwrap(),
            r#"{"type":"setMode","mode":"max-performance"}"#
        );

        let query: IpcQuery = serde_json::from_str(r#"{"type":"focusSpace","id":"2"}"#).unwrap();
        assert_eq!(query, IpcQuery::FocusSpace { id: "2".into(), need_window_focus: false });
    }

    #[test]
    fn responses_carry_data_or_error() {
        assert_eq!(serde_json::to_string(&IpcResponse::success([1, 2])).unwrap(), r#"{"data":[1,2]}"#);
        assert_eq!(serde_json::to_string(&IpcResponse::error("nope")).unwrap(), r#"{"error":"nope"}"#);

        let failed: IpcResponse = crate::error::Result::<()>::Err(BarikError::Audio("muted".into())).into();
        assert!(matches!(failed.into_result(), Err(IpcError::Remote(message)) if message == "Audio error: muted"));
    }

    #[test]
    fn missing_socket_means_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let result = send_query_to(&dir.path().join("none.sock"), &IpcQuery::Ping);
        assert!(matches!(result, Err(IpcError::AppNotRunning)));
    }

    #[test]
    fn server_answers_queries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let server = IpcServer::start(&path, |query| match query {
            IpcQuery::Ping => IpcResponse::success("pong"),
            other => IpcResponse::error(format!("unexpected {other:?}")),
        })
        .unwrap();

        let reply = send_query_to(server.path(), &IpcQuery::Ping).unwrap();
        assert_eq!(reply, IpcResponse::success("pong"));

        let reply = send_query_to(server.path(), &IpcQuery::ReloadConfig).unwrap();
        assert!(matches!(reply, IpcResponse::Error { .. }));

        drop(server);
        assert!(!path.exists());
    }

    #[test]
    fn malformed_query_gets_an_error_reply() {
        let dir = tempfile::tempdir().unwrap();
        let server = IpcServer::start(dir.path().join("raw.sock"), |_| IpcResponse::success(true)).unwrap();

        let mut stream = UnixStream::connect(server.path()).unwrap();
        writeln!(stream, "{{\"type\":\"bogus\"}}").unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();

        let reply: IpcResponse = serde_json::from_str(line.trim()).unwrap();
        assert!(matches!(reply, IpcResponse::Error { error } if error.starts_with("Invalid query")));
    }
}
