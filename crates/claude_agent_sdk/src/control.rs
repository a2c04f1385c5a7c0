//! The Control Multiplexer: the child and the host exchange control
//! requests/responses over the same duplex stream as ordinary session
//! messages, correlated by a request id carried in each envelope's
//! `request_id` field. This module owns the pending-request table and the
//! dispatch loop that tells a decoded line apart as either a session message,
//! a control response addressed to us, or a control request addressed to us.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::error::ClaudeAgentError;

/// Fixed control-subtype set the wire uses, per the Data Model's control
/// envelope. Unrecognized subtypes decode into `Other` rather than failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSubtype {
    Initialize,
    Interrupt,
    SetPermissionMode,
    SetModel,
    SetMaxThinkingTokens,
    RewindFiles,
    McpMessage,
    McpToolCall,
    McpStatus,
    McpReconnect,
    McpToggle,
    McpSetServers,
    CanUseTool,
    HookCallback,
    Other(String),
}

impl ControlSubtype {
    fn from_wire(name: &str) -> Self {
        match name {
            "initialize" => ControlSubtype::Initialize,
            "interrupt" => ControlSubtype::Interrupt,
            "set_permission_mode" => ControlSubtype::SetPermissionMode,
            "set_model" => ControlSubtype::SetModel,
            "set_max_thinking_tokens" => ControlSubtype::SetMaxThinkingTokens,
            "rewind_files" => ControlSubtype::RewindFiles,
            "mcp_message" => ControlSubtype::McpMessage,
            "mcp_tool_call" => ControlSubtype::McpToolCall,
            "mcp_status" => ControlSubtype::McpStatus,
            "mcp_reconnect" => ControlSubtype::McpReconnect,
            "mcp_toggle" => ControlSubtype::McpToggle,
            "mcp_set_servers" => ControlSubtype::McpSetServers,
            "can_use_tool" => ControlSubtype::CanUseTool,
            "hook_callback" => ControlSubtype::HookCallback,
            other => ControlSubtype::Other(other.to_string()),
        }
    }

    pub fn as_wire_name(&self) -> &str {
        match self {
            ControlSubtype::Initialize => "initialize",
            ControlSubtype::Interrupt => "interrupt",
            ControlSubtype::SetPermissionMode => "set_permission_mode",
            ControlSubtype::SetModel => "set_model",
            ControlSubtype::SetMaxThinkingTokens => "set_max_thinking_tokens",
            ControlSubtype::RewindFiles => "rewind_files",
            ControlSubtype::McpMessage => "mcp_message",
            ControlSubtype::McpToolCall => "mcp_tool_call",
            ControlSubtype::McpStatus => "mcp_status",
            ControlSubtype::McpReconnect => "mcp_reconnect",
            ControlSubtype::McpToggle => "mcp_toggle",
            ControlSubtype::McpSetServers => "mcp_set_servers",
            ControlSubtype::CanUseTool => "can_use_tool",
            ControlSubtype::HookCallback => "hook_callback",
            ControlSubtype::Other(name) => name,
        }
    }
}

/// A decoded line that carries a `request_id`: either our own outgoing
/// request getting its answer, or a request the child addressed to us.
#[derive(Debug)]
pub enum ControlEnvelope {
    /// We sent `control_request`; this is the matching `control_response`.
    Response { request_id: String, payload: Result<Value, String> },
    /// The child sent `control_request`; we owe it a `control_response`.
    Request {
        request_id: String,
        subtype: ControlSubtype,
        payload: Value,
    },
}

pub fn decode_control_envelope(raw: &Value) -> Option<ControlEnvelope> {
    let kind = raw.get("type")?.as_str()?;
    match kind {
        "control_response" => {
            let response = raw.get("response")?;
            let request_id = response.get("request_id")?.as_str()?.to_string();
            let payload = match response.get("subtype").and_then(Value::as_str) {
                Some("error") => Err(response
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("control request failed")
                    .to_string()),
                _ => Ok(response.get("response").cloned().unwrap_or(Value::Null)),
            };
            Some(ControlEnvelope::Response { request_id, payload })
        }
        "control_request" => {
            let request_id = raw.get("request_id")?.as_str()?.to_string();
            let request = raw.get("request")?;
            let subtype = request.get("subtype")?.as_str()?;
            Some(ControlEnvelope::Request {
                request_id,
                subtype: ControlSubtype::from_wire(subtype),
                payload: request.clone(),
            })
        }
        _ => None,
    }
}

/// Builds the `control_response` envelope line for an answer to a control
/// request the child sent us.
pub fn encode_control_response(request_id: &str, result: Result<Value, String>) -> Value {
    match result {
        Ok(response) => serde_json::json!({
            "type": "control_response",
            "response": {
                "subtype": "success",
                "request_id": request_id,
                "response": response,
            }
        }),
        Err(message) => serde_json::json!({
            "type": "control_response",
            "response": {
                "subtype": "error",
                "request_id": request_id,
                "error": message,
            }
        }),
    }
}

/// Builds the `control_request` envelope line for a request we're
/// originating (a runtime setter like `set_permission_mode`).
pub fn encode_control_request(request_id: &str, subtype: &ControlSubtype, mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("subtype".to_string(), Value::String(subtype.as_wire_name().to_string()));
    }
    serde_json::json!({
        "type": "control_request",
        "request_id": request_id,
        "request": body,
    })
}

type PendingTable = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, ClaudeAgentError>>>>>;

/// Tracks control requests this side originated, resolving each one's
/// `oneshot` the moment the matching `control_response` arrives.
#[derive(Clone)]
pub struct PendingRequests {
    table: PendingTable,
    next_id: Arc<AtomicU64>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_request_id(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("req_{id}")
    }

    /// Registers interest in `request_id` and returns the receiving half.
    /// Callers must insert before the request is written out, never after,
    /// to avoid racing against a response that arrives immediately.
    pub async fn register(&self, request_id: String) -> oneshot::Receiver<Result<Value, ClaudeAgentError>> {
        let (tx, rx) = oneshot::channel();
        self.table.lock().await.insert(request_id, tx);
        rx
    }

    pub async fn resolve(&self, request_id: &str, payload: Result<Value, String>) {
        if let Some(tx) = self.table.lock().await.remove(request_id) {
            let mapped = payload.map_err(ClaudeAgentError::Connection);
            let _ = tx.send(mapped);
        } else {
            debug!(request_id, "control response for unknown or already-resolved request");
        }
    }

    /// Fails every still-pending request, used when the transport closes.
    pub async fn fail_all(&self, reason: &'static str) {
        let mut table = self.table.lock().await;
        for (_, tx) in table.drain() {
            let _ = tx.send(Err(ClaudeAgentError::Closed { resource: reason }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_control_response_success() {
        let raw = serde_json::json!({
            "type": "control_response",
            "response": {"subtype": "success", "request_id": "req_1", "response": {"ok": true}},
        });
        match decode_control_envelope(&raw) {
            Some(ControlEnvelope::Response { request_id, payload }) => {
                assert_eq!(request_id, "req_1");
                assert_eq!(payload.unwrap(), serde_json::json!({"ok": true}));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_control_request_with_subtype() {
        let raw = serde_json::json!({
            "type": "control_request",
            "request_id": "req_7",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash"},
        });
        match decode_control_envelope(&raw) {
            Some(ControlEnvelope::Request { request_id, subtype, .. }) => {
                assert_eq!(request_id, "req_7");
                assert_eq!(subtype, ControlSubtype::CanUseTool);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_then_resolve_delivers_result() {
        let pending = PendingRequests::new();
        let id = pending.next_request_id();
        let rx = pending.register(id.clone()).await;
        pending.resolve(&id, Ok(serde_json::json!({"done": true}))).await;
        let result = rx.await.unwrap().unwrap();
        assert_eq!(result, serde_json::json!({"done": true}));
    }

    #[tokio::test]
    async fn fail_all_closes_outstanding_receivers() {
        let pending = PendingRequests::new();
        let id = pending.next_request_id();
        let rx = pending.register(id).await;
        pending.fail_all("control multiplexer").await;
        let err = rx.await.unwrap().unwrap_err();
        assert!(err.is_closed());
    }
}
