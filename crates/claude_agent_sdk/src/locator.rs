//! Resolves which `claude` executable to spawn, in priority order: an
//! explicit override, a bundled path shipped alongside the host application,
//! the `PATH`, then a handful of well-known install locations. Also
//! validates the eventual argv against platform argument-length ceilings
//! before a caller wastes a spawn attempt on it.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::error::ClaudeAgentError;

/// Windows' `CreateProcess` rejects a command line longer than this; we
/// check it ourselves so callers get `ClaudeAgentError::InvalidRequest`
/// instead of an opaque OS spawn failure.
pub const WINDOWS_MAX_ARGV_CHARS: usize = 8_191;

const ENV_OVERRIDE: &str = "CLAUDE_BINARY";
const EXE_NAME: &str = "claude";

fn well_known_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = env::var_os("HOME").map(PathBuf::from) {
        dirs.push(home.join(".claude").join("local"));
        dirs.push(home.join(".local").join("bin"));
    }
    dirs.push(PathBuf::from("/usr/local/bin"));
    dirs.push(PathBuf::from("/opt/homebrew/bin"));
    dirs
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn search_path_env() -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(EXE_NAME);
        is_executable(&candidate).then_some(candidate)
    })
}

/// Resolves the `claude` binary per the priority order above.
///
/// `explicit` is `ClaudeAgentOptions::cli_path`; `bundled` is
/// `ClaudeAgentOptions::bundled_cli_path`. An explicit path that isn't an
/// executable file fails immediately rather than falling through to the
/// remaining search order, since the caller asked for a specific binary.
pub fn locate_executable(
    explicit: Option<&Path>,
    bundled: Option<&Path>,
) -> Result<PathBuf, ClaudeAgentError> {
    let mut probed = Vec::new();

    if let Some(explicit) = explicit {
        if is_executable(explicit) {
            return Ok(explicit.to_path_buf());
        }
        return Err(ClaudeAgentError::NotFound { probed: vec![explicit.to_path_buf()] });
    }

    if let Some(env_path) = env::var_os(ENV_OVERRIDE).map(PathBuf::from) {
        probed.push(env_path.clone());
        if is_executable(&env_path) {
            return Ok(env_path);
        }
    }

    if let Some(bundled) = bundled {
        probed.push(bundled.to_path_buf());
        if is_executable(bundled) {
            return Ok(bundled.to_path_buf());
        }
    }

    if let Some(found) = search_path_env() {
        return Ok(found);
    }
    probed.push(PathBuf::from(format!("$PATH/{EXE_NAME}")));

    for dir in well_known_dirs() {
        let candidate = dir.join(EXE_NAME);
        probed.push(candidate.clone());
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    Err(ClaudeAgentError::NotFound { probed })
}

/// Validates the total length of an eventual command line on Windows, where
/// `CreateProcess` enforces a hard ceiling the OS spawn call won't explain if
/// exceeded. A no-op check on other platforms.
pub fn validate_argv_length(argv: &[String]) -> Result<(), ClaudeAgentError> {
    if !cfg!(windows) {
        return Ok(());
    }
    let total: usize = argv.iter().map(|arg| arg.len() + 1).sum();
    if total > WINDOWS_MAX_ARGV_CHARS {
        return Err(ClaudeAgentError::InvalidRequest(format!(
            "command line length {total} exceeds the Windows maximum of {WINDOWS_MAX_ARGV_CHARS} characters"
        )));
    }
    Ok(())
}
