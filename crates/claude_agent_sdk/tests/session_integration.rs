//! End-to-end coverage of the Client Facade against the `mock_claude_cli`
//! fixture binary built alongside this crate (see `tests/fixtures`). Covers
//! a minimal query/response turn, the permission callback's allow/deny
//! paths, an in-process tool call answered through the control protocol,
//! and graceful shutdown. Speculative line reassembly and concurrent-write
//! serialization are covered at the unit level in `framer.rs`/`writer.rs`,
//! where the byte-level conditions that exercise them can be constructed
//! deterministically instead of relying on real OS read-size boundaries.

use std::sync::Arc;

use claude_agent_sdk::{
    CanUseToolFn, ClaudeAgentOptionsBuilder, ClaudeAgentError, ClientState, PermissionResult,
    SdkMcpServer, ToolDefinition, ToolHandlerFn,
};
use serde_json::json;

fn fixture_binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_mock_claude_cli"))
}

#[tokio::test]
async fn minimal_query_round_trips_through_the_fixture_child() {
    let options = ClaudeAgentOptionsBuilder::new().cli_path(fixture_binary()).build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await.expect("connect");
    assert_eq!(client.state().await, ClientState::Ready);
    assert!(client.initialization_result().await.is_some());

    let result = client.run_query("ping").await.expect("run_query");
    assert!(result.is_result());
    assert!(result.is_success());
    assert_eq!(client.session_id().await.as_deref(), Some("fixture-session-001"));

    client.close().await.expect("close");
    assert_eq!(client.state().await, ClientState::Closed);
}

#[tokio::test]
async fn permission_callback_allow_lets_the_tool_through() {
    let options = ClaudeAgentOptionsBuilder::new()
        .cli_path(fixture_binary())
        .can_use_tool(Arc::new(CanUseToolFn(|_ctx: claude_agent_sdk::PermissionContext| async {
            Ok(PermissionResult::allow())
        })))
        .build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await.expect("connect");

    let result = client.run_query("use-tool").await.expect("run_query");
    match result {
        claude_agent_sdk::SdkMessage::Result { is_error, result, .. } => {
            assert!(!is_error);
            assert_eq!(result.as_deref(), Some("tool allowed"));
        }
        other => panic!("expected a result message, got {other:?}"),
    }

    client.close().await.expect("close");
}

#[tokio::test]
async fn permission_callback_deny_surfaces_the_denial_message() {
    let options = ClaudeAgentOptionsBuilder::new()
        .cli_path(fixture_binary())
        .can_use_tool(Arc::new(CanUseToolFn(|_ctx: claude_agent_sdk::PermissionContext| async {
            Ok(PermissionResult::deny("not allowed in tests"))
        })))
        .build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await.expect("connect");

    let result = client.run_query("use-tool").await.expect("run_query");
    match result {
        claude_agent_sdk::SdkMessage::Result { is_error, result, .. } => {
            assert!(is_error);
            assert_eq!(
                result.as_deref(),
                Some("tool denied: not allowed in tests")
            );
        }
        other => panic!("expected a result message, got {other:?}"),
    }

    client.close().await.expect("close");
}

#[tokio::test]
async fn missing_permission_handler_denies_the_tool_call() {
    let options = ClaudeAgentOptionsBuilder::new().cli_path(fixture_binary()).build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await.expect("connect");

    let result = client.run_query("use-tool").await.expect("run_query");
    match result {
        claude_agent_sdk::SdkMessage::Result { is_error, result, .. } => {
            assert!(is_error);
            assert!(result.unwrap_or_default().starts_with("tool denied:"));
        }
        other => panic!("expected a result message, got {other:?}"),
    }

    client.close().await.expect("close");
}

#[tokio::test]
async fn in_process_tool_call_is_answered_over_the_control_protocol() {
    let server = SdkMcpServer::new("demo", "1.0.0").with_tool(ToolDefinition {
        name: "echo".into(),
        description: "echoes its arguments".into(),
        input_schema: json!({"type": "object"}),
        handler: Arc::new(ToolHandlerFn(|args: serde_json::Value| async move { Ok(args) })),
    });
    let options = ClaudeAgentOptionsBuilder::new()
        .cli_path(fixture_binary())
        .sdk_mcp_server(server)
        .build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await.expect("connect");

    let result = client.run_query("call-tool").await.expect("run_query");
    match result {
        claude_agent_sdk::SdkMessage::Result { is_error, result, .. } => {
            assert!(!is_error);
            let content = result.expect("tool content echoed back");
            let content: serde_json::Value =
                serde_json::from_str(&content).expect("content blocks are valid JSON");
            assert_eq!(content[0]["type"], "text");
            assert!(content[0]["text"].as_str().unwrap().contains("\"text\":\"hi\""));
        }
        other => panic!("expected a result message, got {other:?}"),
    }

    client.close().await.expect("close");
}

#[tokio::test]
async fn close_without_any_turn_shuts_the_child_down_gracefully() {
    let options = ClaudeAgentOptionsBuilder::new().cli_path(fixture_binary()).build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await.expect("connect");
    client.close().await.expect("close should not need to escalate to kill");
    assert_eq!(client.state().await, ClientState::Closed);
}

#[tokio::test]
async fn send_query_after_close_reports_a_closed_error() {
    let options = ClaudeAgentOptionsBuilder::new().cli_path(fixture_binary()).build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await.expect("connect");
    client.close().await.expect("close");

    let err = client.send_query("ping").await.unwrap_err();
    assert!(matches!(err, ClaudeAgentError::Closed { .. }));
}
