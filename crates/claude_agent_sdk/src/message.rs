//! Typed message envelope for the `stream-json` wire format the child
//! speaks: one JSON object per line, discriminated by its top-level `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single block inside an assistant or user message's `content` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Top-level discriminant of a line emitted on the child's stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SdkMessage {
    System {
        subtype: String,
        #[serde(flatten)]
        data: Value,
    },
    User {
        message: Value,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    Assistant {
        message: AssistantPayload,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    Result {
        subtype: String,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(flatten)]
        extra: Value,
    },
    StreamEvent {
        event: Value,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantPayload {
    pub role: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub model: Option<String>,
}

impl SdkMessage {
    pub fn is_result(&self) -> bool {
        matches!(self, SdkMessage::Result { .. })
    }

    /// Whether a result message reports a successful turn: `subtype ==
    /// "success"` and no `is_error` flag. Non-result messages are never
    /// successes in this sense.
    pub fn is_success(&self) -> bool {
        match self {
            SdkMessage::Result { subtype, is_error, .. } => subtype == "success" && !is_error,
            _ => false,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SdkMessage::Result { session_id, .. } => session_id.as_deref(),
            SdkMessage::System { data, .. } => data.get("session_id").and_then(Value::as_str),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_result_message() {
        let raw = r#"{"type":"result","subtype":"success","is_error":false,"session_id":"abc"}"#;
        let msg: SdkMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.is_result());
        assert!(msg.is_success());
        assert_eq!(msg.session_id(), Some("abc"));
    }

    #[test]
    fn error_result_is_not_a_success() {
        let raw = r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#;
        let msg: SdkMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.is_result());
        assert!(!msg.is_success());
    }

    #[test]
    fn decodes_assistant_text_block() {
        let raw = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"hi"}]}}"#;
        let msg: SdkMessage = serde_json::from_str(raw).unwrap();
        match msg {
            SdkMessage::Assistant { message, .. } => {
                assert_eq!(message.content, vec![ContentBlock::Text { text: "hi".into() }]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn system_init_message_carries_session_id() {
        let raw = r#"{"type":"system","subtype":"init","session_id":"sess-1"}"#;
        let msg: SdkMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.session_id(), Some("sess-1"));
    }

    #[test]
    fn unrecognized_type_is_unknown_not_an_error() {
        let raw = r#"{"type":"something_new"}"#;
        let msg: SdkMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg, SdkMessage::Unknown);
    }
}
