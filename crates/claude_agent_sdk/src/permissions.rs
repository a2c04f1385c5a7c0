//! The permission callback: the host's say over whether a tool call the
//! child wants to make is allowed, denied, or allowed with a rewritten
//! input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClaudeAgentError;

/// Context accompanying a `can_use_tool` control request.
#[derive(Debug, Clone)]
pub struct PermissionContext {
    pub tool_name: String,
    pub input: Value,
    pub tool_use_id: Option<String>,
    pub suggestions: Vec<PermissionUpdate>,
}

/// A permission-mode or allow/deny-list change the child is proposing
/// alongside a tool call, for the host to optionally apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionUpdate {
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}

/// What the host decides for a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "camelCase")]
pub enum PermissionResult {
    Allow {
        #[serde(skip_serializing_if = "Option::is_none")]
        updated_input: Option<Value>,
    },
    Deny {
        message: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        interrupt: bool,
    },
}

impl PermissionResult {
    pub fn allow() -> Self {
        PermissionResult::Allow { updated_input: None }
    }

    pub fn allow_with_input(updated_input: Value) -> Self {
        PermissionResult::Allow {
            updated_input: Some(updated_input),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        PermissionResult::Deny {
            message: message.into(),
            interrupt: false,
        }
    }
}

/// Host-implemented authority over tool calls. `ClaudeAgentOptions::can_use_tool`
/// holds one implementation shared across the session's lifetime.
#[async_trait]
pub trait CanUseTool: Send + Sync {
    async fn can_use_tool(
        &self,
        ctx: PermissionContext,
    ) -> Result<PermissionResult, ClaudeAgentError>;
}

/// Adapts a plain async closure into a [`CanUseTool`].
pub struct CanUseToolFn<F>(pub F);

#[async_trait]
impl<F, Fut> CanUseTool for CanUseToolFn<F>
where
    F: Fn(PermissionContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<PermissionResult, ClaudeAgentError>> + Send,
{
    async fn can_use_tool(
        &self,
        ctx: PermissionContext,
    ) -> Result<PermissionResult, ClaudeAgentError> {
        (self.0)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_serializes_without_updated_input_when_absent() {
        let value = serde_json::to_value(PermissionResult::allow()).unwrap();
        assert_eq!(value, serde_json::json!({"behavior": "allow"}));
    }

    #[test]
    fn deny_carries_message() {
        let value = serde_json::to_value(PermissionResult::deny("no")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"behavior": "deny", "message": "no"})
        );
    }
}
