//! A tiny stand-in for the `claude` CLI, used only by the integration tests
//! in this directory. Speaks just enough of the `stream-json` duplex
//! protocol to exercise the Client Facade end to end without a real binary:
//! one handshake line on startup, then a line-at-a-time loop that answers
//! user turns and control requests according to the prompt text.

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

const SESSION_ID: &str = "fixture-session-001";

fn emit(value: &Value) {
    let mut out = io::stdout();
    writeln!(out, "{value}").expect("write to stdout");
    out.flush().expect("flush stdout");
}

fn main() {
    emit(&json!({
        "type": "system",
        "subtype": "init",
        "session_id": SESSION_ID,
        "version": "9.9.9",
    }));

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(Ok(raw)) = lines.next() {
        if raw.trim().is_empty() {
            continue;
        }
        let line: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => continue,
        };

        match line.get("type").and_then(Value::as_str) {
            Some("user") => handle_user_turn(&line, &mut lines),
            Some("control_request") => respond_to_host_control_request(&line),
            _ => {}
        }
    }
}

fn handle_user_turn(line: &Value, lines: &mut io::Lines<io::StdinLock<'_>>) {
    let prompt = line
        .pointer("/message/content/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match prompt {
        "ping" => {
            emit(&json!({
                "type": "assistant",
                "message": {"role": "assistant", "content": [{"type": "text", "text": "pong"}]},
            }));
            emit(&result(false, Some("pong")));
        }
        "use-tool" => {
            let decision = ask_host_for_permission(lines);
            match decision {
                Some(Ok(())) => emit(&result(false, Some("tool allowed"))),
                Some(Err(message)) => emit(&result(true, Some(&format!("tool denied: {message}")))),
                None => emit(&result(true, Some("permission request aborted"))),
            }
        }
        "call-tool" => {
            let content = call_in_process_tool(lines);
            emit(&result(false, Some(&content.to_string())));
        }
        other => emit(&result(true, Some(&format!("unrecognized prompt: {other}")))),
    }
}

/// Sends a `can_use_tool` control request to the host and blocks for its
/// answer, which the host's callback dispatcher writes back without any
/// involvement from the conversational message channel.
fn ask_host_for_permission(lines: &mut io::Lines<io::StdinLock<'_>>) -> Option<Result<(), String>> {
    emit(&json!({
        "type": "control_request",
        "request_id": "mock_req_permission",
        "request": {"subtype": "can_use_tool", "tool_name": "Demo", "input": {}},
    }));
    let raw = lines.next()?.ok()?;
    let response: Value = serde_json::from_str(&raw).ok()?;
    let subtype = response.pointer("/response/subtype")?.as_str()?;
    if subtype == "error" {
        let message = response
            .pointer("/response/error")
            .and_then(Value::as_str)
            .unwrap_or("denied")
            .to_string();
        return Some(Err(message));
    }
    let behavior = response.pointer("/response/response/behavior").and_then(Value::as_str);
    match behavior {
        Some("allow") => Some(Ok(())),
        _ => {
            let message = response
                .pointer("/response/response/message")
                .and_then(Value::as_str)
                .unwrap_or("denied")
                .to_string();
            Some(Err(message))
        }
    }
}

/// Sends an `mcp_tool_call` control request addressed to the `demo` in-process
/// server the test registers, and returns the tool's reported content.
fn call_in_process_tool(lines: &mut io::Lines<io::StdinLock<'_>>) -> Value {
    emit(&json!({
        "type": "control_request",
        "request_id": "mock_req_tool",
        "request": {
            "subtype": "mcp_tool_call",
            "server_name": "demo",
            "message": {
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "echo", "arguments": {"text": "hi"}},
            },
        },
    }));
    let Some(Ok(raw)) = lines.next() else {
        return Value::Null;
    };
    let response: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
    response
        .pointer("/response/response/result/content")
        .cloned()
        .unwrap_or(Value::Null)
}

fn respond_to_host_control_request(line: &Value) {
    let Some(request_id) = line.get("request_id").and_then(Value::as_str) else {
        return;
    };
    emit(&json!({
        "type": "control_response",
        "response": {"subtype": "success", "request_id": request_id, "response": {}},
    }));
}

fn result(is_error: bool, text: Option<&str>) -> Value {
    json!({
        "type": "result",
        "subtype": if is_error { "error" } else { "success" },
        "is_error": is_error,
        "result": text,
        "session_id": SESSION_ID,
    })
}
