//! Owns the child process end to end: spawning it with the right argv/env,
//! handing its stdin/stdout to the writer/framer layers, pumping stderr into
//! the host's observer with a bounded ring buffer (so a chatty child can't
//! grow memory unbounded), materializing any temp files the argv needed
//! (e.g. an oversized inline settings blob), and tearing everything down —
//! gracefully first, then forcibly — on close.

use std::{
    path::{Path, PathBuf},
    process::ExitStatus,
    sync::Arc,
    time::Duration,
};

use tempfile::NamedTempFile;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    task::JoinHandle,
    time,
};
use tracing::{debug, warn};

use crate::{
    argv::{build_argv, build_env},
    error::ClaudeAgentError,
    locator::{locate_executable, validate_argv_length},
    options::{ClaudeAgentOptions, StderrCallback},
    process::apply_env,
    writer::WriteSerializer,
};

/// How long `close()` waits for the child to exit on its own after stdin is
/// closed before escalating to `kill()`.
const GRACEFUL_SHUTDOWN_WINDOW: Duration = Duration::from_secs(5);

/// Ring buffer cap for stderr retained toward `ClaudeAgentError::Process`'s
/// diagnostic text. Past this, the oldest bytes are dropped.
const STDERR_CAPTURE_CAP: usize = 64 * 1024;

pub struct ChildProcessSupervisor {
    child: Child,
    pub writer: Arc<WriteSerializer>,
    pub stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    _temp_files: Vec<NamedTempFile>,
    binary: PathBuf,
}

impl ChildProcessSupervisor {
    /// Resolves the executable, builds argv/env, spawns the child, and wires
    /// up stdin/stdout ownership plus the stderr pump. Does not perform the
    /// protocol handshake — that's the Client Facade's job once it owns this
    /// supervisor.
    pub async fn connect(options: &ClaudeAgentOptions) -> Result<Self, ClaudeAgentError> {
        let binary = locate_executable(
            options.cli_path.as_deref(),
            options.bundled_cli_path.as_deref(),
        )?;

        let mut temp_files = Vec::new();
        let argv = materialize_large_values(build_argv(options), &mut temp_files)?;
        validate_argv_length(&argv)?;
        let env = build_env(options);

        let mut command = Command::new(&binary);
        command.args(&argv);
        if let Some(cwd) = &options.cwd {
            command.current_dir(cwd);
        }
        apply_env(&mut command, &env);
        command.stdin(std::process::Stdio::piped());
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());
        command.kill_on_drop(true);

        let mut child = spawn_child_with_retry(&mut command, &binary).await?;

        let stdin = child.stdin.take().ok_or(ClaudeAgentError::MissingStdin)?;
        let stdout = child.stdout.take().ok_or(ClaudeAgentError::MissingStdout)?;
        let stderr = child.stderr.take().ok_or(ClaudeAgentError::MissingStderr)?;

        let stderr_task = tokio::spawn(pump_stderr(stderr, options.stderr_callback.clone()));

        Ok(Self {
            child,
            writer: Arc::new(WriteSerializer::new(stdin)),
            stdout: Some(stdout),
            stderr_task: Some(stderr_task),
            _temp_files: temp_files,
            binary,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Takes ownership of the stdout handle, for the Client Facade to wrap
    /// in a `LineFramer`. Can only be called once.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Closes stdin and waits up to the graceful shutdown window for the
    /// child to exit on its own, escalating to `kill()` if it doesn't.
    pub async fn close(&mut self) -> Result<ExitStatus, ClaudeAgentError> {
        self.writer.end_input().await?;
        match time::timeout(GRACEFUL_SHUTDOWN_WINDOW, self.child.wait()).await {
            Ok(result) => result.map_err(ClaudeAgentError::Wait),
            Err(_) => {
                warn!(pid = ?self.pid(), "child did not exit within the graceful window, killing");
                self.kill().await
            }
        }
    }

    /// Terminates the child immediately.
    pub async fn kill(&mut self) -> Result<ExitStatus, ClaudeAgentError> {
        self.child.start_kill().map_err(ClaudeAgentError::Wait)?;
        self.child.wait().await.map_err(ClaudeAgentError::Wait)
    }

    /// Drains the stderr pump task and returns whatever it had buffered,
    /// for attaching to a non-zero-exit `ClaudeAgentError::Process`.
    pub async fn captured_stderr(&mut self) -> String {
        if let Some(task) = self.stderr_task.take() {
            task.await.unwrap_or_default()
        } else {
            String::new()
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }
}

/// Retries a spawn that fails with "text file busy", which shows up when the
/// CLI binary was just written by an install/update running concurrently.
/// Backs off without blocking the executor, unlike a plain `thread::sleep`.
pub(crate) async fn spawn_child_with_retry(
    command: &mut Command,
    binary: &Path,
) -> Result<Child, ClaudeAgentError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    debug!(attempt, ?backoff, "spawn busy, retrying");
                    time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(ClaudeAgentError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }

    unreachable!("spawn_child_with_retry should return before exhausting retries")
}

async fn pump_stderr(stderr: tokio::process::ChildStderr, callback: Option<StderrCallback>) -> String {
    let mut reader = BufReader::new(stderr).lines();
    let mut captured = String::new();
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                if let Some(callback) = &callback {
                    callback(&line);
                }
                debug!(line, "claude stderr");
                captured.push_str(&line);
                captured.push('\n');
                if captured.len() > STDERR_CAPTURE_CAP {
                    let overflow = captured.len() - STDERR_CAPTURE_CAP;
                    captured.drain(..overflow);
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "stderr pump read error, stopping");
                break;
            }
        }
    }
    captured
}

/// Any single argv value over this length gets written to a temp file and
/// replaced with `@<path>`, since some flags (inline settings/mcp config)
/// can carry payloads too large to be a comfortable single argv entry.
const INLINE_VALUE_CAP: usize = 4096;

fn materialize_large_values(
    argv: Vec<String>,
    temp_files: &mut Vec<NamedTempFile>,
) -> Result<Vec<String>, ClaudeAgentError> {
    let mut out = Vec::with_capacity(argv.len());
    for value in argv {
        if value.len() > INLINE_VALUE_CAP && !value.starts_with('-') {
            let mut file = NamedTempFile::new().map_err(ClaudeAgentError::StdoutRead)?;
            use std::io::Write;
            file.write_all(value.as_bytes())
                .map_err(ClaudeAgentError::StdoutRead)?;
            out.push(format!("@{}", file.path().display()));
            temp_files.push(file);
        } else {
            out.push(value);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_not_materialized() {
        let mut temp_files = Vec::new();
        let argv = vec!["--model".to_string(), "claude-opus".to_string()];
        let out = materialize_large_values(argv.clone(), &mut temp_files).unwrap();
        assert_eq!(out, argv);
        assert!(temp_files.is_empty());
    }

    #[test]
    fn oversized_values_spill_to_a_temp_file() {
        let mut temp_files = Vec::new();
        let huge = "x".repeat(INLINE_VALUE_CAP + 1);
        let argv = vec!["--settings".to_string(), huge];
        let out = materialize_large_values(argv, &mut temp_files).unwrap();
        assert_eq!(temp_files.len(), 1);
        assert!(out[1].starts_with('@'));
    }
}
