//! Release checks and self-update.
//!
//! The checker asks the GitHub releases API for the latest tag every 30
//! minutes and publishes whether it is newer than this build. Installing
//! downloads the release zip, unpacks it under the cache directory and hands
//! the swap over to a detached shell script, since the running app cannot
//! replace itself.

pub mod changelog;
pub mod version;

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use eyeball::{SharedObservable, Subscriber};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use uuid::Uuid;

pub use self::changelog::{extract_section, fetch_changelog};
pub use self::version::{VersionMarker, compare_versions};
use crate::cache::get_cache_subdir;
use crate::constants::APP_VERSION;
use crate::constants::github::{LATEST_RELEASE_URL, REPOSITORY, USER_AGENT};
use crate::constants::timing::UPDATE_CHECK_INTERVAL_SECS;
use crate::constants::tools::UNZIP;
use crate::error::{BarikError, Result};
use crate::utils::command::run;
use crate::utils::periodic::PeriodicTask;

/// Bundle name inside the release archive.
const APP_BUNDLE: &str = "Barik.app";

/// Where the installed app lives.
pub const INSTALL_DESTINATION: &str = "/Applications/Barik.app";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Subset of the GitHub release payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Published update state. Stays default (hidden) until a check succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateState {
    pub latest_version: Option<String>,
    pub update_available: bool,
    pub asset_url: Option<String>,
}

impl UpdateState {
    /// Compares `release` with the running version.
    #[must_use]
    pub fn from_release(release: &Release, current: &str) -> Self {
        let asset_url = release
            .assets
            .iter()
            .find(|asset| asset.name.ends_with(".zip"))
            .map(|asset| asset.browser_download_url.clone());

        Self {
            latest_version: Some(release.tag_name.clone()),
            update_available: compare_versions(&release.tag_name, current) == Ordering::Greater,
            asset_url,
        }
    }
}

/// Download URL of a release zip when the API listed no asset.
#[must_use]
pub fn fallback_download_url(version: &str) -> String {
    let bare = version.strip_prefix('v').unwrap_or(version);
    format!("https://github.com/{REPOSITORY}/releases/download/{version}/barik-v{bare}.zip")
}

/// Script that waits for the app to quit, swaps the bundle and relaunches it.
#[must_use]
pub fn install_script(new_app: &Path, destination: &Path) -> String {
    format!(
        "#!/bin/bash\nsleep 2\nrm -rf \"{dest}\"\nmv \"{new}\" \"{dest}\"\nopen \"{dest}\"\nrm -- \"$0\"\n",
        dest = destination.display(),
        new = new_app.display(),
    )
}

/// Checks GitHub for newer releases and installs them.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    client: Client,
    state: SharedObservable<UpdateState>,
    current: String,
}

impl UpdateChecker {
    /// # Errors
    ///
    /// Returns [`BarikError::Network`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self> { Self::for_version(APP_VERSION) }

    /// Checker comparing releases against `current` instead of this build.
    ///
    /// # Errors
    ///
    /// Returns [`BarikError::Network`] when the HTTP client cannot be built.
    pub fn for_version(current: &str) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            state: SharedObservable::new(UpdateState::default()),
            current: current.to_string(),
        })
    }

    #[must_use]
    pub const fn client(&self) -> &Client { &self.client }

    #[must_use]
    pub fn state(&self) -> UpdateState { self.state.get() }

    #[must_use]
    pub fn subscribe(&self) -> Subscriber<UpdateState> { self.state.subscribe() }

    /// Fetches the latest release.
    ///
    /// # Errors
    ///
    /// Returns [`BarikError::Network`] on transport errors, non-success
    /// statuses or an unexpected payload.
    pub async fn latest_release(&self) -> Result<Release> {
        let release = self.client.get(LATEST_RELEASE_URL).send().await?.error_for_status()?.json().await?;
        Ok(release)
    }

    /// Runs one check and publishes the result.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::latest_release`] errors; the published state is
    /// left untouched.
    pub async fn check(&self) -> Result<UpdateState> {
        let release = self.latest_release().await?;
        let state = UpdateState::from_release(&release, &self.current);
        tracing::debug!(latest = %release.tag_name, available = state.update_available, "update check");
        self.state.set_if_not_eq(state.clone());
        Ok(state)
    }

    /// Checks now and then every 30 minutes. Failures are logged only.
    #[must_use]
    pub fn spawn_periodic(&self, runtime: &Handle) -> PeriodicTask {
        let checker = self.clone();
        PeriodicTask::spawn(runtime, Duration::from_secs(UPDATE_CHECK_INTERVAL_SECS), move || {
            let checker = checker.clone();
            async move {
                if let Err(err) = checker.check().await {
                    tracing::warn!(error = %err, "update check failed");
                }
            }
        })
    }

    /// Downloads the release zip for `version` and unpacks it into a fresh
    /// directory. Returns that directory.
    ///
    /// # Errors
    ///
    /// Fails on download errors, when `unzip` fails, or when the archive has
    /// no `Barik.app`.
    pub async fn download_and_unzip(&self, version: &str) -> Result<PathBuf> {
        let url = self
            .state
            .get()
            .asset_url
            .filter(|_| self.state.get().latest_version.as_deref() == Some(version))
            .unwrap_or_else(|| fallback_download_url(version));

        tracing::info!(%url, "downloading update");
        let bytes = self.client.get(&url).send().await?.error_for_status()?.bytes().await?;

        let target = get_cache_subdir("updates").join(Uuid::now_v7().to_string());
        tokio::task::spawn_blocking(move || unpack(&bytes, &target))
            .await
            .map_err(|err| BarikError::Update(err.to_string()))?
    }

    /// Downloads `version` and starts the detached install script.
    ///
    /// # Errors
    ///
    /// Fails when the download, unpacking or script launch fails.
    pub async fn install(&self, version: &str) -> Result<()> {
        let dir = self.download_and_unzip(version).await?;
        let script = dir.join("update.sh");
        fs::write(&script, install_script(&dir.join(APP_BUNDLE), Path::new(INSTALL_DESTINATION)))?;
        make_executable(&script)?;

        Command::new(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| BarikError::Update(format!("failed to start {}: {err}", script.display())))?;

        tracing::info!(version, "update install started");
        Ok(())
    }
}

fn unpack(archive: &[u8], target: &Path) -> Result<PathBuf> {
    fs::create_dir_all(target)?;
    let zip = target.join("update.zip");
    fs::write(&zip, archive)?;

    run(Path::new(UNZIP), &[OsStr::new("-o"), zip.as_os_str(), OsStr::new("-d"), target.as_os_str()])
    .map_err(|err| BarikError::Update(err.to_string()))?;

    if !target.join(APP_BUNDLE).exists() {
        return Err(BarikError::Update(format!("{APP_BUNDLE} not found in archive")));
    }
    Ok(target.to_path_buf())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> { Ok(()) }
