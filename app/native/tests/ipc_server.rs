//! The bar's IPC socket end to end: a server answering with [`App`] and the
//! blocking client the CLI uses.

use std::path::PathBuf;

use barik_lib::app::App;
use barik_lib::config::{Config, ConfigStore};
use barik_lib::events::EventBus;
use barik_lib::ipc::{IpcError, IpcQuery, IpcResponse, IpcServer, send_query_to};
use barik_lib::performance::PerformanceMode;
use barik_lib::preferences::Preferences;
use barik_lib::updater::{UpdateChecker, VersionMarker};
use tokio::runtime::Handle;

fn start(dir: &tempfile::TempDir, toml: &str) -> (App, IpcServer, PathBuf) {
    let config = ConfigStore::detached(Config::parse(toml).unwrap(), EventBus::new());
    let app = App::new(
        &Handle::current(),
        config,
        Preferences::in_memory(),
        UpdateChecker::for_version("0.1.0").unwrap(),
        VersionMarker::at(dir.path().join("version")),
    );

    let path = dir.path().join("barik.sock");
    let handler = app.clone();
    let server = IpcServer::start(&path, move |query| handler.handle(query)).unwrap();
    (app, server, path)
}

#[tokio::test]
async fn ping_and_mode_over_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _server, path) = start(&dir, "");

    let pong = send_query_to(&path, &IpcQuery::Ping).unwrap().into_result().unwrap();
    assert_eq!(pong, "pong");

    let mode = send_query_to(&path, &IpcQuery::SetMode { mode: PerformanceMode::MaxPerformance })
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(mode, "max-performance");
    assert_eq!(app.performance().mode(), PerformanceMode::MaxPerformance);

    let mode = send_query_to(&path, &IpcQuery::GetMode).unwrap().into_result().unwrap();
    assert_eq!(mode, "max-performance");
}

#[tokio::test]
async fn state_matches_the_configured_layout() {
    let dir = tempfile::tempdir().unwrap();
    let (_app, _server, path) = start(&dir, "theme = \"dark\"\n[widgets]\ndisplayed = [\"divider\", \"spacer\"]\n");

    let frame = send_query_to(&path, &IpcQuery::State).unwrap().into_result().unwrap();
    assert_eq!(frame["theme"], "dark");
    assert_eq!(frame["widgets"][0]["kind"], "divider");
    assert_eq!(frame["widgets"][1]["kind"], "spacer");
}

#[tokio::test]
async fn errors_come_back_as_remote_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (_app, _server, path) = start(&dir, "");

    let reply = send_query_to(&path, &IpcQuery::Volume { level: None, muted: None }).unwrap();
    assert_eq!(reply, IpcResponse::error("Nothing to change"));
    assert!(matches!(reply.into_result(), Err(IpcError::Remote(message)) if message == "Nothing to change"));
}

#[tokio::test]
async fn socket_disappears_with_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let (_app, server, path) = start(&dir, "");
    assert!(path.exists());

    drop(server);
    assert!(!path.exists());
    assert!(send_query_to(&path, &IpcQuery::Ping).is_err());
}
