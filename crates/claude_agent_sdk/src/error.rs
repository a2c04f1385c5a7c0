use std::{path::PathBuf, process::ExitStatus, time::Duration};

use thiserror::Error;

/// Every error this crate can surface, tagged by the kind taxonomy the host
/// is expected to match on (not-found / version-too-old / connection /
/// process / parse / timeout / closed / protocol), plus the lower-level
/// spawn/IO failures that precede those classifications.
#[derive(Debug, Error)]
pub enum ClaudeAgentError {
    #[error("claude executable not found; probed: {probed:?}")]
    NotFound { probed: Vec<PathBuf> },

    #[error("claude CLI version {found} is older than the required minimum {minimum}")]
    VersionTooOld { found: String, minimum: String },

    #[error("failed to spawn claude process (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("claude process exited with {status:?}: {stderr}")]
    Process { status: ExitStatus, stderr: String },

    #[error("failed to parse line {line_number}: {message}")]
    Parse { line_number: usize, message: String },

    #[error("operation timed out after {duration:?}: {operation}")]
    Timeout { operation: String, duration: Duration },

    #[error("operation attempted on closed {resource}")]
    Closed { resource: &'static str },

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("failed waiting for claude process: {0}")]
    Wait(std::io::Error),

    #[error("failed reading stdout: {0}")]
    StdoutRead(std::io::Error),

    #[error("failed reading stderr: {0}")]
    StderrRead(std::io::Error),

    #[error("failed writing stdin: {0}")]
    StdinWrite(std::io::Error),

    #[error("internal error: missing stdout pipe")]
    MissingStdout,

    #[error("internal error: missing stderr pipe")]
    MissingStderr,

    #[error("internal error: missing stdin pipe")]
    MissingStdin,

    #[error("internal error: task join failure: {0}")]
    Join(String),

    #[error("request is invalid: {0}")]
    InvalidRequest(String),

    #[error("failed to serialize control message: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to parse JSON output: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("no handler registered for tool permission requests")]
    PermissionCallbackMissing,

    #[error("unknown callback id: {0}")]
    UnknownCallbackId(String),

    #[error("unknown mcp server: {0}")]
    UnknownMcpServer(String),
}

impl ClaudeAgentError {
    pub fn is_closed(&self) -> bool {
        matches!(self, ClaudeAgentError::Closed { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClaudeAgentError::Timeout { .. })
    }
}

/// Error produced while decoding one line of a `stream-json` transcript.
#[derive(Debug, Error, Clone)]
#[error("stream-json line {line_number}: {message}")]
pub struct StreamJsonLineError {
    pub line_number: usize,
    pub message: String,
}
