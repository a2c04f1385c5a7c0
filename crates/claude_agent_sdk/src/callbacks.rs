//! Dispatches incoming `control_request` lines (the child calling back into
//! the host) to the registered permission callback, hook chains, or
//! in-process tool servers, and turns the result into the `control_response`
//! envelope the Write Serializer sends back out.

use std::{collections::BTreeMap, sync::Arc};

use serde_json::{json, Value};
use tracing::warn;

use crate::{
    control::{decode_control_envelope, encode_control_response, ControlEnvelope, ControlSubtype},
    error::ClaudeAgentError,
    hooks::{run_chain, HookEvent, HookInput, HookMatcher},
    permissions::{CanUseTool, PermissionContext, PermissionResult, PermissionUpdate},
    tool_server::SdkMcpServer,
};

/// Everything the dispatcher needs in order to answer a control request
/// without reaching back into the client facade.
pub struct CallbackRegistry {
    pub can_use_tool: Option<Arc<dyn CanUseTool>>,
    pub hooks: BTreeMap<HookEvent, Vec<HookMatcher>>,
    pub sdk_mcp_servers: BTreeMap<String, Arc<SdkMcpServer>>,
    /// Ids minted for each `hooks` matcher, index-aligned with its `Vec`.
    hook_ids: BTreeMap<HookEvent, Vec<String>>,
    /// Reverse of `hook_ids`, for dispatching an incoming `hook_callback` by
    /// the id the child echoes back rather than by re-sending the event name.
    hook_id_owner: BTreeMap<String, HookEvent>,
}

impl CallbackRegistry {
    pub fn new(
        can_use_tool: Option<Arc<dyn CanUseTool>>,
        hooks: BTreeMap<HookEvent, Vec<HookMatcher>>,
        sdk_mcp_servers: BTreeMap<String, Arc<SdkMcpServer>>,
    ) -> Self {
        let mut hook_ids = BTreeMap::new();
        let mut hook_id_owner = BTreeMap::new();
        let mut next_id: u64 = 1;
        for (event, matchers) in &hooks {
            let ids: Vec<String> = matchers
                .iter()
                .map(|_| {
                    let id = format!("hook_{next_id}");
                    next_id += 1;
                    hook_id_owner.insert(id.clone(), *event);
                    id
                })
                .collect();
            hook_ids.insert(*event, ids);
        }
        Self {
            can_use_tool,
            hooks,
            sdk_mcp_servers,
            hook_ids,
            hook_id_owner,
        }
    }

    /// The callback-identifier map sent in the `initialize` control request:
    /// one entry per hook event, each carrying the minted id and matcher
    /// pattern for every registered matcher, so the child can reference a
    /// specific matcher by id on every subsequent `hook_callback`.
    pub fn hook_callback_map(&self) -> BTreeMap<String, Vec<Value>> {
        self.hooks
            .iter()
            .map(|(event, matchers)| {
                let ids = self.hook_ids.get(event).map(Vec::as_slice).unwrap_or(&[]);
                let entries = matchers
                    .iter()
                    .zip(ids)
                    .map(|(matcher, id)| {
                        json!({
                            "callbackId": id,
                            "matcher": matcher.matcher,
                        })
                    })
                    .collect();
                (hook_event_to_wire(*event).to_string(), entries)
            })
            .collect()
    }

    /// Handles one decoded `control_request` line, returning the
    /// `control_response` line to write back, or `None` if the line wasn't
    /// actually a control request (e.g. it was a response to our own
    /// outgoing request, which `control.rs`'s pending table owns instead).
    pub async fn handle_line(&self, raw: &Value) -> Option<Value> {
        match decode_control_envelope(raw)? {
            ControlEnvelope::Response { .. } => None,
            ControlEnvelope::Request {
                request_id,
                subtype,
                payload,
            } => {
                let result = self.dispatch(subtype, payload).await;
                Some(encode_control_response(&request_id, result))
            }
        }
    }

    async fn dispatch(&self, subtype: ControlSubtype, payload: Value) -> Result<Value, String> {
        match subtype {
            ControlSubtype::CanUseTool => self.handle_can_use_tool(payload).await,
            ControlSubtype::HookCallback => self.handle_hook_callback(payload).await,
            ControlSubtype::McpMessage | ControlSubtype::McpToolCall => {
                self.handle_mcp_message(payload).await
            }
            ControlSubtype::McpStatus => Ok(self.handle_mcp_status()),
            other => {
                warn!(subtype = other.as_wire_name(), "unhandled control request subtype");
                Err(format!("unsupported control subtype: {}", other.as_wire_name()))
            }
        }
    }

    async fn handle_can_use_tool(&self, payload: Value) -> Result<Value, String> {
        let Some(handler) = &self.can_use_tool else {
            return Err(ClaudeAgentError::PermissionCallbackMissing.to_string());
        };
        let tool_name = payload
            .get("tool_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let input = payload.get("input").cloned().unwrap_or(Value::Null);
        let tool_use_id = payload
            .get("tool_use_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let suggestions: Vec<PermissionUpdate> = payload
            .get("permission_suggestions")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let ctx = PermissionContext {
            tool_name,
            input,
            tool_use_id,
            suggestions,
        };
        let result = handler
            .can_use_tool(ctx)
            .await
            .map_err(|err| err.to_string())?;
        serde_json::to_value(result).map_err(|err| err.to_string())
    }

    async fn handle_hook_callback(&self, payload: Value) -> Result<Value, String> {
        let callback_id = payload
            .get("callback_id")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing callback_id".to_string())?;
        let event = *self
            .hook_id_owner
            .get(callback_id)
            .ok_or_else(|| ClaudeAgentError::UnknownCallbackId(callback_id.to_string()).to_string())?;
        let Some(matchers) = self.hooks.get(&event) else {
            return Ok(json!({}));
        };
        let tool_name = payload
            .get("tool_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let input = HookInput {
            event,
            tool_name,
            payload: payload.get("input").cloned().unwrap_or(Value::Null),
        };
        let output = run_chain(matchers, input)
            .await
            .map_err(|err| err.to_string())?;
        Ok(match output {
            Some(output) => json!({
                "decision": output.decision,
                "systemMessage": output.system_message,
            }),
            None => json!({}),
        })
    }

    async fn handle_mcp_message(&self, payload: Value) -> Result<Value, String> {
        let server_name = payload
            .get("server_name")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing server_name".to_string())?;
        let server = self
            .sdk_mcp_servers
            .get(server_name)
            .ok_or_else(|| ClaudeAgentError::UnknownMcpServer(server_name.to_string()).to_string())?;
        let message = payload.get("message").cloned().unwrap_or(Value::Null);
        match server.dispatch(message).await {
            Some(response) => Ok(response),
            None => Ok(Value::Null),
        }
    }

    fn handle_mcp_status(&self) -> Value {
        let servers: Vec<Value> = self
            .sdk_mcp_servers
            .keys()
            .map(|name| json!({ "name": name, "status": "connected" }))
            .collect();
        json!({ "servers": servers })
    }
}

fn hook_event_to_wire(event: HookEvent) -> &'static str {
    match event {
        HookEvent::PreToolUse => "PreToolUse",
        HookEvent::PostToolUse => "PostToolUse",
        HookEvent::UserPromptSubmit => "UserPromptSubmit",
        HookEvent::Stop => "Stop",
        HookEvent::SubagentStop => "SubagentStop",
        HookEvent::PreCompact => "PreCompact",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::CanUseToolFn;

    fn registry_allowing_everything() -> CallbackRegistry {
        CallbackRegistry::new(
            Some(Arc::new(CanUseToolFn(|_ctx: PermissionContext| async {
                Ok(PermissionResult::allow())
            }))),
            BTreeMap::new(),
            BTreeMap::new(),
        )
    }

    #[tokio::test]
    async fn can_use_tool_round_trips_allow() {
        let registry = registry_allowing_everything();
        let line = json!({
            "type": "control_request",
            "request_id": "req_1",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {}},
        });
        let response = registry.handle_line(&line).await.unwrap();
        assert_eq!(response["response"]["subtype"], "success");
        assert_eq!(response["response"]["response"]["behavior"], "allow");
    }

    #[tokio::test]
    async fn missing_permission_handler_denies_via_error() {
        let registry = CallbackRegistry::new(None, BTreeMap::new(), BTreeMap::new());
        let line = json!({
            "type": "control_request",
            "request_id": "req_2",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {}},
        });
        let response = registry.handle_line(&line).await.unwrap();
        assert_eq!(response["response"]["subtype"], "error");
    }

    #[tokio::test]
    async fn non_request_lines_are_ignored() {
        let registry = registry_allowing_everything();
        let line = json!({"type": "assistant", "message": {"role": "assistant", "content": []}});
        assert!(registry.handle_line(&line).await.is_none());
    }

    fn registry_with_one_hook() -> CallbackRegistry {
        use crate::hooks::{HookFn, HookMatcher, HookOutput};

        let mut hooks = BTreeMap::new();
        hooks.insert(
            HookEvent::PreToolUse,
            vec![HookMatcher::new(Arc::new(HookFn(|_input| async {
                Ok(HookOutput::stop(json!({"decision": "block"})))
            })))],
        );
        CallbackRegistry::new(None, hooks, BTreeMap::new())
    }

    #[test]
    fn hook_callback_map_mints_one_id_per_matcher() {
        let registry = registry_with_one_hook();
        let map = registry.hook_callback_map();
        let entries = &map["PreToolUse"];
        assert_eq!(entries.len(), 1);
        assert!(entries[0]["callbackId"].as_str().unwrap().starts_with("hook_"));
    }

    #[tokio::test]
    async fn hook_callback_dispatches_by_minted_id() {
        let registry = registry_with_one_hook();
        let callback_id = registry.hook_callback_map()["PreToolUse"][0]["callbackId"]
            .as_str()
            .unwrap()
            .to_string();
        let line = json!({
            "type": "control_request",
            "request_id": "req_3",
            "request": {"subtype": "hook_callback", "callback_id": callback_id, "input": {}},
        });
        let response = registry.handle_line(&line).await.unwrap();
        assert_eq!(response["response"]["subtype"], "success");
        assert_eq!(response["response"]["response"]["decision"], json!({"decision": "block"}));
    }

    #[tokio::test]
    async fn hook_callback_with_unknown_id_errors() {
        let registry = registry_with_one_hook();
        let line = json!({
            "type": "control_request",
            "request_id": "req_4",
            "request": {"subtype": "hook_callback", "callback_id": "hook_999", "input": {}},
        });
        let response = registry.handle_line(&line).await.unwrap();
        assert_eq!(response["response"]["subtype"], "error");
    }
}
