//! Serializes writes to the child's stdin behind a single mutex so that a
//! `send_query` call and a control-response write from the callback
//! dispatcher never interleave their bytes on the pipe.
//!
//! The readiness check — "is the pipe still open" — happens *inside* the
//! lock, not before acquiring it, so a close racing a write can't slip a
//! write through between the check and the lock.

use serde_json::Value;
use tokio::{
    io::AsyncWriteExt,
    process::ChildStdin,
    sync::Mutex,
};

use crate::error::ClaudeAgentError;

pub struct WriteSerializer {
    stdin: Mutex<Option<ChildStdin>>,
}

impl WriteSerializer {
    pub fn new(stdin: ChildStdin) -> Self {
        Self {
            stdin: Mutex::new(Some(stdin)),
        }
    }

    /// Serializes `value` to a single line of JSON and writes it with a
    /// trailing newline.
    pub async fn write_line(&self, value: &Value) -> Result<(), ClaudeAgentError> {
        let mut line = serde_json::to_string(value).map_err(ClaudeAgentError::Serialize)?;
        line.push('\n');
        self.write_raw(line.as_bytes()).await
    }

    async fn write_raw(&self, bytes: &[u8]) -> Result<(), ClaudeAgentError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or(ClaudeAgentError::Closed { resource: "stdin" })?;
        if let Err(err) = stdin.write_all(bytes).await {
            *guard = None;
            return Err(ClaudeAgentError::StdinWrite(err));
        }
        if let Err(err) = stdin.flush().await {
            *guard = None;
            return Err(ClaudeAgentError::StdinWrite(err));
        }
        Ok(())
    }

    /// Closes stdin, signalling end-of-input to the child without killing
    /// the process. Idempotent.
    pub async fn end_input(&self) -> Result<(), ClaudeAgentError> {
        let mut guard = self.stdin.lock().await;
        guard.take();
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.stdin.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn end_input_makes_subsequent_writes_fail_closed() {
        // A ChildStdin can't be constructed outside a real child process, so
        // this exercises the closed-state path via end_input on a writer
        // that never had one, which takes the same `None` branch.
        let writer = WriteSerializer { stdin: Mutex::new(None) };
        assert!(!writer.is_open().await);
        let err = writer
            .write_line(&serde_json::json!({"type": "ping"}))
            .await
            .unwrap_err();
        assert!(err.is_closed());
    }
}
