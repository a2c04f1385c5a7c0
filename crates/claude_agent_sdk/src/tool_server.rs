//! The in-process tool server: a JSON-RPC 2.0 subset the child addresses
//! through the control protocol's `mcp_message` subtype instead of over its
//! own stdio pipe. No subprocess, no transport of its own — `control.rs`
//! hands requests in and responses back out.

use std::{collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ClaudeAgentError;

pub const JSONRPC_PARSE_ERROR: i64 = -32700;
pub const JSONRPC_INVALID_REQUEST: i64 = -32600;
pub const JSONRPC_METHOD_NOT_FOUND: i64 = -32601;
pub const JSONRPC_CANCELLED: i64 = -32800;

const METHOD_INITIALIZE: &str = "initialize";
const METHOD_TOOLS_LIST: &str = "tools/list";
const METHOD_TOOLS_CALL: &str = "tools/call";
const METHOD_PING: &str = "ping";
const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";

/// One tool the host exposes through a [`SdkMcpServer`], invoked without ever
/// leaving this process.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, ClaudeAgentError>;
}

pub struct ToolHandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> ToolHandler for ToolHandlerFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ClaudeAgentError>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value, ClaudeAgentError> {
        (self.0)(arguments).await
    }
}

/// A named, versioned bundle of in-process tools. Registered under a server
/// name in `ClaudeAgentOptions::sdk_mcp_servers`; the child addresses it the
/// same way it addresses an external MCP server, by that name.
pub struct SdkMcpServer {
    pub name: String,
    pub version: String,
    tools: BTreeMap<String, ToolDefinition>,
}

impl fmt::Debug for SdkMcpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkMcpServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SdkMcpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: BTreeMap::new(),
        }
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.insert(tool.name.clone(), tool);
        self
    }

    /// Handles one JSON-RPC request or notification addressed to this
    /// server, returning `None` for notifications (no response expected).
    pub async fn dispatch(&self, request: Value) -> Option<Value> {
        let method = request.get("method").and_then(Value::as_str);
        let id = request.get("id").cloned();

        let Some(method) = method else {
            return id.map(|id| error_response(id, JSONRPC_INVALID_REQUEST, "missing method"));
        };

        match method {
            NOTIFICATION_INITIALIZED | NOTIFICATION_CANCELLED => None,
            METHOD_INITIALIZE => {
                let id = id?;
                Some(success_response(
                    id,
                    json!({
                        "protocolVersion": "2024-11-05",
                        "serverInfo": {"name": self.name, "version": self.version},
                        "capabilities": {"tools": {"listChanged": false}},
                    }),
                ))
            }
            METHOD_PING => {
                let id = id?;
                Some(success_response(id, json!({})))
            }
            METHOD_TOOLS_LIST => {
                let id = id?;
                let tools: Vec<Value> = self
                    .tools
                    .values()
                    .map(|tool| {
                        json!({
                            "name": tool.name,
                            "description": tool.description,
                            "inputSchema": tool.input_schema,
                        })
                    })
                    .collect();
                Some(success_response(id, json!({ "tools": tools })))
            }
            METHOD_TOOLS_CALL => {
                let id = id?;
                Some(self.dispatch_tool_call(id, request.get("params")).await)
            }
            other => {
                warn!(method = other, "unrecognized tool server method");
                let id = id?;
                Some(error_response(
                    id,
                    JSONRPC_METHOD_NOT_FOUND,
                    &format!("method not found: {other}"),
                ))
            }
        }
    }

    async fn dispatch_tool_call(&self, id: Value, params: Option<&Value>) -> Value {
        let Some(params) = params else {
            return error_response(id, JSONRPC_INVALID_REQUEST, "missing params");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return error_response(id, JSONRPC_INVALID_REQUEST, "missing tool name");
        };
        let Some(tool) = self.tools.get(name) else {
            return error_response(
                id,
                JSONRPC_METHOD_NOT_FOUND,
                &format!("unknown tool: {name}"),
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        match tool.handler.call(arguments).await {
            Ok(result) => success_response(
                id,
                json!({ "content": [text_block(&value_to_text(&result))], "isError": false }),
            ),
            Err(err) => success_response(
                id,
                json!({
                    "content": [text_block(&format!("Error: {err}"))],
                    "isError": true,
                }),
            ),
        }
    }
}

/// Renders a handler's return value as the text of a single content block. A
/// bare JSON string is used as-is rather than re-quoted.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_block(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

fn success_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A write-one-line-at-a-time guard over an arbitrary async writer, mirroring
/// `writer::WriteSerializer`'s check-inside-the-lock pattern but generic
/// instead of tied to a `ChildStdin`.
struct StdioResponseWriter<W> {
    sink: tokio::sync::Mutex<W>,
}

impl<W: tokio::io::AsyncWrite + Unpin> StdioResponseWriter<W> {
    async fn write_line(&self, value: &Value) -> Result<(), ClaudeAgentError> {
        use tokio::io::AsyncWriteExt;
        let mut line = serde_json::to_string(value).map_err(ClaudeAgentError::Serialize)?;
        line.push('\n');
        let mut sink = self.sink.lock().await;
        sink.write_all(line.as_bytes())
            .await
            .map_err(ClaudeAgentError::StdinWrite)?;
        sink.flush().await.map_err(ClaudeAgentError::StdinWrite)
    }
}

/// Serves this tool server over its own newline-delimited JSON-RPC stream,
/// independent of the control multiplexer. Used when an in-process server is
/// driven directly over stdio (for example by a sidecar child process) rather
/// than addressed through `mcp_message`. Reads one [`JsonRpcRequest`] per
/// line, skips blank lines, and stops on EOF.
pub async fn serve_stdio<R, W>(server: &SdkMcpServer, mut input: R, output: W) -> Result<(), ClaudeAgentError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    let writer = StdioResponseWriter { sink: tokio::sync::Mutex::new(output) };
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = input
            .read_line(&mut line)
            .await
            .map_err(ClaudeAgentError::StdoutRead)?;
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(_) => {
                writer
                    .write_line(&error_response(Value::Null, JSONRPC_PARSE_ERROR, "parse error"))
                    .await?;
                continue;
            }
        };
        let request_value = serde_json::to_value(&request).map_err(ClaudeAgentError::Serialize)?;
        if let Some(response) = server.dispatch(request_value).await {
            writer.write_line(&response).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_server() -> SdkMcpServer {
        SdkMcpServer::new("echo", "1.0.0").with_tool(ToolDefinition {
            name: "echo".into(),
            description: "echoes its input".into(),
            input_schema: json!({"type": "object"}),
            handler: Arc::new(ToolHandlerFn(|args: Value| async move { Ok(args) })),
        })
    }

    #[tokio::test]
    async fn lists_registered_tools() {
        let server = echo_server();
        let response = server
            .dispatch(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .await
            .unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
    }

    #[tokio::test]
    async fn calls_registered_tool() {
        let server = echo_server();
        let response = server
            .dispatch(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "echo", "arguments": {"hello": "world"}},
            }))
            .await
            .unwrap();
        assert_eq!(response["result"]["content"][0]["type"], "text");
        assert_eq!(response["result"]["content"][0]["text"], json!({"hello": "world"}).to_string());
        assert_eq!(response["result"]["isError"], false);
    }

    #[tokio::test]
    async fn tool_error_is_prefixed_and_wrapped() {
        let server = SdkMcpServer::new("boom", "1.0.0").with_tool(ToolDefinition {
            name: "boom".into(),
            description: "always fails".into(),
            input_schema: json!({"type": "object"}),
            handler: Arc::new(ToolHandlerFn(|_: Value| async move {
                Err(ClaudeAgentError::InvalidRequest("bad input".into()))
            })),
        });
        let response = server
            .dispatch(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": {"name": "boom", "arguments": {}},
            }))
            .await
            .unwrap();
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(response["result"]["content"][0]["text"], "Error: request is invalid: bad input");
    }

    #[tokio::test]
    async fn initialize_reports_no_list_changed() {
        let server = echo_server();
        let response = server
            .dispatch(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
            .await
            .unwrap();
        assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);
    }

    /// Shares a `Vec<u8>` between the writer under test and the assertions,
    /// since `serve_stdio` takes its output writer by value.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);

    impl tokio::io::AsyncWrite for SharedBuf {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn serve_stdio_answers_one_request_per_line() {
        let server = echo_server();
        let input = std::io::Cursor::new(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n\n".to_vec());
        let output = SharedBuf::default();
        serve_stdio(&server, tokio::io::BufReader::new(input), output.clone())
            .await
            .unwrap();
        let written = output.0.lock().unwrap().clone();
        let line = String::from_utf8(written).unwrap();
        let response: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(response["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn unknown_tool_surfaces_method_not_found() {
        let server = echo_server();
        let response = server
            .dispatch(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "missing", "arguments": {}},
            }))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], JSONRPC_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let server = echo_server();
        let response = server
            .dispatch(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        assert!(response.is_none());
    }
}
