//! App name to bundle path lookups.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use super::Space;

/// Read-through cache keyed by app name. Lookups that find nothing are not
/// cached, so an app launched later still resolves.
#[derive(Debug, Clone, Default)]
pub struct IconCache {
    entries: Arc<DashMap<String, PathBuf>>,
}

impl IconCache {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn get(&self, app_name: &str) -> Option<PathBuf> { self.entries.get(app_name).map(|e| e.value().clone()) }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Fills `app_path` on every window from running processes.
    pub fn fill(&self, spaces: &mut [Space]) { self.fill_with(spaces, running_app_bundles); }

    /// Fills `app_path`, asking `locate` only for the names not cached yet.
    pub fn fill_with<F>(&self, spaces: &mut [Space], locate: F)
    where F: FnOnce(&[String]) -> Vec<(String, PathBuf)> {
        let mut missing: Vec<String> = spaces
            .iter()
            .flat_map(|space| &space.windows)
            .filter_map(|window| window.app_name.as_ref())
            .filter(|name| !self.entries.contains_key(name.as_str()))
            .cloned()
            .collect();
        missing.sort_unstable();
        missing.dedup();

        if !missing.is_empty() {
            for (name, path) in locate(&missing) {
                self.entries.insert(name, path);
            }
        }

        for window in spaces.iter_mut().flat_map(|space| &mut space.windows) {
            window.app_path = window.app_name.as_deref().and_then(|name| self.get(name));
        }
    }
}

/// Closest enclosing `.app` bundle of an executable, or the executable itself.
#[must_use]
pub fn bundle_root(executable: &Path) -> PathBuf {
    executable
        .ancestors()
        .find(|path| path.extension() == Some(OsStr::new("app")))
        .unwrap_or(executable)
        .to_path_buf()
}

fn running_app_bundles(names: &[String]) -> Vec<(String, PathBuf)> {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
    );

    let mut found = Vec::new();
    for process in system.processes().values() {
        let name = process.name().to_string_lossy();
        if found.iter().any(|(known, _): &(String, PathBuf)| *known == name) {
            continue;
        }
        if let Some(wanted) = names.iter().find(|wanted| **wanted == name)
            && let Some(exe) = process.exe()
        {
            found.push((wanted.clone(), bundle_root(exe)));
        }
    }
    found
}
