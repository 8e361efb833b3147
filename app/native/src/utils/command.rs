use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::constants::tools::OSASCRIPT;
use crate::error::{BarikError, Result};

/// Resolve the absolute path to an executable binary.
///
/// This helper first checks if the provided command name is already an absolute path.
/// If not, it searches for the executable in a priority-ordered list of directories:
/// 1. Any directory specified via the `BARIK_EXTRA_PATHS` env var (colon-separated).
/// 2. The current process `PATH`.
/// 3. A curated list of fallback directories commonly used on macOS for user-installed tools.
///
/// The fallbacks matter because a bar launched from Finder or launchd inherits
/// a minimal `PATH` without Homebrew.
///
/// # Errors
///
/// Returns [`BarikError::Command`] when the binary is not found or not executable.
pub fn resolve_binary(binary: &str) -> Result<PathBuf> {
    if binary.is_empty() {
        return Err(BarikError::Command("Binary name cannot be empty".to_string()));
    }

    let candidate = Path::new(binary);
    if candidate.is_absolute() {
        return if is_executable(candidate) {
            Ok(candidate.to_path_buf())
        } else {
            Err(BarikError::Command(format!(
                "Binary at {} is not executable",
                candidate.display()
            )))
        };
    }

    let mut search_paths = Vec::new();

    if let Ok(extra) = env::var("BARIK_EXTRA_PATHS") {
        search_paths.extend(extra.split(':').map(PathBuf::from));
    }

    if let Some(path_var) = env::var_os("PATH") {
        search_paths.extend(env::split_paths(&path_var));
    }

    search_paths.extend([
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/opt/homebrew/bin"),
        PathBuf::from("/opt/homebrew/sbin"),
    ]);

    if let Some(home) = dirs::home_dir() {
        search_paths.push(home.join(".cargo/bin"));
        search_paths.push(home.join(".local/bin"));
    }

    search_paths
        .into_iter()
        .filter(|directory| !directory.as_os_str().is_empty())
        .map(|directory| directory.join(binary))
        .find(|path| is_executable(path))
        .ok_or_else(|| {
            BarikError::Command(format!(
                "Unable to locate executable '{binary}' in known search paths"
            ))
        })
}

/// Resolves a configured tool path, falling back to a `PATH` lookup by file name.
///
/// Users configure `yabai.path` for a specific install; when that file is gone
/// (Intel Homebrew, Nix) the bare name is looked up instead.
///
/// # Errors
///
/// Returns [`BarikError::Command`] when neither lookup finds an executable.
pub fn resolve_tool(configured: &Path) -> Result<PathBuf> {
    if is_executable(configured) {
        return Ok(configured.to_path_buf());
    }

    let name = configured
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| BarikError::Command(format!("Invalid tool path {}", configured.display())))?;

    resolve_binary(name)
}

/// Runs a program to completion and returns its stdout.
///
/// # Errors
///
/// Returns [`BarikError::Command`] if the program cannot be launched or exits
/// with a non-zero status (stderr is included in the message).
pub fn run<S: AsRef<std::ffi::OsStr>>(program: &Path, args: &[S]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| BarikError::Command(format!("{}: {err}", program.display())))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BarikError::Command(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs a program found on the search paths, see [`resolve_binary`].
///
/// # Errors
///
/// Propagates lookup and execution failures.
pub fn run_binary<S: AsRef<std::ffi::OsStr>>(binary: &str, args: &[S]) -> Result<String> {
    let program = resolve_binary(binary)?;
    run(&program, args)
}

/// Executes an AppleScript and returns its trimmed result.
///
/// # Errors
///
/// Returns [`BarikError::Command`] when `osascript` is unavailable or the script fails.
pub fn run_osascript(script: &str) -> Result<String> {
    let output = run(Path::new(OSASCRIPT), &["-e", script])?;
    Ok(output.trim().to_string())
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };

    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
