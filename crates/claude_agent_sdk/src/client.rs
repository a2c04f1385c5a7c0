//! The Client Facade: the single type applications hold. Owns the Option
//! record, drives the state machine (Unconnected → Connecting → Ready →
//! Closing → Closed), and is the only place `SendQuery`/`ReceiveMessage`/
//! `Interrupt`/the runtime setters are exposed.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    callbacks::CallbackRegistry,
    commands::admin::AdminClient,
    control::{decode_control_envelope, encode_control_request, ControlEnvelope, ControlSubtype, PendingRequests},
    error::ClaudeAgentError,
    framer::{FramedLine, LineFramer},
    message::SdkMessage,
    options::{AgentDefinition, ClaudeAgentOptions, PermissionMode},
    supervisor::ChildProcessSupervisor,
    writer::WriteSerializer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unconnected,
    Connecting,
    Ready,
    Closing,
    Closed,
}

/// Metadata the child reports in its `initialize` control response: the
/// commands it registered, the active output style, the models it can run,
/// and a summary of the authenticated account. Cached for the life of the
/// session once `connect()` completes.
#[derive(Debug, Clone, Default)]
pub struct InitializationResult {
    pub commands: Vec<Value>,
    pub output_style: Option<String>,
    pub models: Vec<Value>,
    pub account: Option<Value>,
}

impl InitializationResult {
    fn from_response(response: Value) -> Self {
        Self {
            commands: response
                .get("commands")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            output_style: response
                .get("output_style")
                .and_then(Value::as_str)
                .map(str::to_string),
            models: response
                .get("models")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            account: response.get("account").cloned(),
        }
    }
}

struct ConnectedSession {
    supervisor: Mutex<ChildProcessSupervisor>,
    writer: Arc<WriteSerializer>,
    pending: PendingRequests,
    read_task: JoinHandle<()>,
    message_rx: Mutex<mpsc::UnboundedReceiver<SdkMessage>>,
    session_id: Arc<Mutex<Option<String>>>,
    initialization_result: Mutex<Option<InitializationResult>>,
}

/// Drives one `claude` subprocess as a long-lived, conversational session.
pub struct ClaudeAgentClient {
    options: ClaudeAgentOptions,
    state: Mutex<ClientState>,
    session: Mutex<Option<Arc<ConnectedSession>>>,
}

impl ClaudeAgentClient {
    pub fn new(options: ClaudeAgentOptions) -> Self {
        Self {
            options,
            state: Mutex::new(ClientState::Unconnected),
            session: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> ClientState {
        *self.state.lock().await
    }

    /// The session id the child announced, once a message carrying one has
    /// arrived. `None` before the first such message or after `close`.
    pub async fn session_id(&self) -> Option<String> {
        let session = self.session.lock().await.clone()?;
        let id = session.session_id.lock().await.clone();
        id
    }

    /// The metadata cached from the `initialize` handshake, once `connect()`
    /// has completed. `None` before connecting or after `close`.
    pub async fn initialization_result(&self) -> Option<InitializationResult> {
        let session = self.session.lock().await.clone()?;
        let result = session.initialization_result.lock().await.clone();
        result
    }

    /// Spawns the child, performs the version handshake if
    /// `min_cli_version` is set, starts the background read loop that
    /// demultiplexes session messages from control traffic, then performs
    /// the mandatory `initialize` round trip before any user turn is sent.
    /// Moves back to `Unconnected` if any of this fails.
    pub async fn connect(&self) -> Result<(), ClaudeAgentError> {
        {
            let mut state = self.state.lock().await;
            if *state != ClientState::Unconnected {
                return Err(ClaudeAgentError::Connection(
                    "connect called more than once".to_string(),
                ));
            }
            *state = ClientState::Connecting;
        }

        match self.connect_inner().await {
            Ok(()) => {
                *self.state.lock().await = ClientState::Ready;
                Ok(())
            }
            Err(err) => {
                *self.state.lock().await = ClientState::Unconnected;
                Err(err)
            }
        }
    }

    async fn connect_inner(&self) -> Result<(), ClaudeAgentError> {
        let mut supervisor = ChildProcessSupervisor::connect(&self.options).await?;
        let stdout = supervisor
            .take_stdout()
            .ok_or(ClaudeAgentError::MissingStdout)?;
        let writer = supervisor.writer.clone();

        let callbacks = Arc::new(CallbackRegistry::new(
            self.options.can_use_tool.clone(),
            self.options.hooks.clone(),
            self.options.sdk_mcp_servers.clone(),
        ));
        let pending = PendingRequests::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut framer = LineFramer::new(stdout, self.options.max_buffer_size);
        let session_id = Arc::new(Mutex::new(None));

        if let Some(minimum) = &self.options.min_cli_version {
            match framer.next_line().await? {
                Some(FramedLine::Json(value)) => {
                    check_min_version(&value, minimum)?;
                    dispatch_or_forward(&value, &callbacks, &pending, &writer, &tx, &session_id).await;
                }
                Some(FramedLine::Unparsed(raw)) => {
                    return Err(ClaudeAgentError::Protocol(format!(
                        "expected handshake line, got unparseable data: {raw}"
                    )))
                }
                None => {
                    return Err(ClaudeAgentError::Closed {
                        resource: "child stdout",
                    })
                }
            }
        }

        let read_task = tokio::spawn(read_loop(
            framer,
            callbacks.clone(),
            pending.clone(),
            writer.clone(),
            tx,
            session_id.clone(),
        ));

        let connected = Arc::new(ConnectedSession {
            supervisor: Mutex::new(supervisor),
            writer,
            pending,
            read_task,
            message_rx: Mutex::new(rx),
            session_id,
            initialization_result: Mutex::new(None),
        });

        // The read task must already be running so the `initialize` response
        // routes back through the pending table, and the session must be
        // reachable from `connected` directly since it isn't "official"
        // client state yet.
        let init_body = build_initialize_body(&self.options, &callbacks);
        match send_control_request_on(&connected, ControlSubtype::Initialize, init_body).await {
            Ok(response) => {
                *connected.initialization_result.lock().await =
                    Some(InitializationResult::from_response(response));
            }
            Err(err) => {
                connected.read_task.abort();
                connected.pending.fail_all("client").await;
                let _ = connected.supervisor.lock().await.kill().await;
                return Err(err);
            }
        }

        *self.session.lock().await = Some(connected);
        Ok(())
    }

    async fn session(&self) -> Result<Arc<ConnectedSession>, ClaudeAgentError> {
        self.session
            .lock()
            .await
            .clone()
            .ok_or(ClaudeAgentError::Closed { resource: "client" })
    }

    /// Sends a user turn. Safe to call while a `receive_message` future is
    /// outstanding: the only serialization point is the Write Serializer's
    /// internal mutex.
    pub async fn send_query(&self, prompt: impl Into<String>) -> Result<(), ClaudeAgentError> {
        let session = self.session().await?;
        let message = json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "text", "text": prompt.into()}],
            },
        });
        session.writer.write_line(&message).await
    }

    /// Waits for and returns the next session message (not control traffic,
    /// which the read loop answers on its own).
    pub async fn receive_message(&self) -> Result<Option<SdkMessage>, ClaudeAgentError> {
        let session = self.session().await?;
        let msg = session.message_rx.lock().await.recv().await;
        Ok(msg)
    }

    pub async fn interrupt(&self) -> Result<(), ClaudeAgentError> {
        self.send_control_request(ControlSubtype::Interrupt, json!({}))
            .await
            .map(|_| ())
    }

    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<(), ClaudeAgentError> {
        self.send_control_request(
            ControlSubtype::SetPermissionMode,
            json!({ "mode": mode.as_arg_value() }),
        )
        .await
        .map(|_| ())
    }

    pub async fn set_model(&self, model: impl Into<String>) -> Result<(), ClaudeAgentError> {
        self.send_control_request(ControlSubtype::SetModel, json!({ "model": model.into() }))
            .await
            .map(|_| ())
    }

    pub async fn set_max_thinking_tokens(&self, tokens: u32) -> Result<(), ClaudeAgentError> {
        self.send_control_request(
            ControlSubtype::SetMaxThinkingTokens,
            json!({ "max_thinking_tokens": tokens }),
        )
        .await
        .map(|_| ())
    }

    pub async fn toggle_mcp_server(&self, name: impl Into<String>, enabled: bool) -> Result<(), ClaudeAgentError> {
        self.send_control_request(
            ControlSubtype::McpToggle,
            json!({ "server_name": name.into(), "enabled": enabled }),
        )
        .await
        .map(|_| ())
    }

    pub async fn reconnect_mcp_server(&self, name: impl Into<String>) -> Result<(), ClaudeAgentError> {
        self.send_control_request(
            ControlSubtype::McpReconnect,
            json!({ "server_name": name.into() }),
        )
        .await
        .map(|_| ())
    }

    pub async fn set_mcp_servers(&self, servers: Value) -> Result<(), ClaudeAgentError> {
        self.send_control_request(ControlSubtype::McpSetServers, json!({ "servers": servers }))
            .await
            .map(|_| ())
    }

    pub async fn mcp_server_status(&self) -> Result<Value, ClaudeAgentError> {
        self.send_control_request(ControlSubtype::McpStatus, json!({})).await
    }

    pub async fn rewind_files_with_options(&self, options: Value) -> Result<Value, ClaudeAgentError> {
        self.send_control_request(ControlSubtype::RewindFiles, options).await
    }

    async fn send_control_request(
        &self,
        subtype: ControlSubtype,
        body: Value,
    ) -> Result<Value, ClaudeAgentError> {
        let session = self.session().await?;
        send_control_request_on(&session, subtype, body).await
    }

    /// Convenience for the common case: send one prompt, stream messages
    /// until the `result` message, and return it.
    pub async fn run_query(&self, prompt: impl Into<String>) -> Result<SdkMessage, ClaudeAgentError> {
        self.send_query(prompt).await?;
        loop {
            match self.receive_message().await? {
                Some(message) if message.is_result() => return Ok(message),
                Some(_) => continue,
                None => {
                    return Err(ClaudeAgentError::Closed {
                        resource: "session stream",
                    })
                }
            }
        }
    }

    pub fn admin(&self) -> Result<AdminClient, ClaudeAgentError> {
        AdminClient::new(&self.options)
    }

    /// Closes stdin and waits for the child to exit gracefully, then kills
    /// it if it doesn't, tearing down the background read loop either way.
    pub async fn close(&self) -> Result<(), ClaudeAgentError> {
        *self.state.lock().await = ClientState::Closing;
        let Some(session) = self.session.lock().await.take() else {
            *self.state.lock().await = ClientState::Closed;
            return Ok(());
        };
        session.read_task.abort();
        session.pending.fail_all("client").await;
        let result = session.supervisor.lock().await.close().await;
        *self.state.lock().await = ClientState::Closed;
        result.map(|_| ())
    }

    pub async fn kill(&self) -> Result<(), ClaudeAgentError> {
        *self.state.lock().await = ClientState::Closing;
        let Some(session) = self.session.lock().await.take() else {
            *self.state.lock().await = ClientState::Closed;
            return Ok(());
        };
        session.read_task.abort();
        session.pending.fail_all("client").await;
        let result = session.supervisor.lock().await.kill().await;
        *self.state.lock().await = ClientState::Closed;
        result.map(|_| ())
    }
}

async fn read_loop(
    mut framer: LineFramer<tokio::process::ChildStdout>,
    callbacks: Arc<CallbackRegistry>,
    pending: PendingRequests,
    writer: Arc<WriteSerializer>,
    tx: mpsc::UnboundedSender<SdkMessage>,
    session_id: Arc<Mutex<Option<String>>>,
) {
    loop {
        match framer.next_line().await {
            Ok(Some(FramedLine::Json(value))) => {
                dispatch_or_forward(&value, &callbacks, &pending, &writer, &tx, &session_id).await;
            }
            Ok(Some(FramedLine::Unparsed(raw))) => {
                warn!(raw, "discarding unparseable trailing line at stream end");
            }
            Ok(None) => {
                debug!("child stdout closed, ending read loop");
                break;
            }
            Err(err) => {
                warn!(error = %err, "read loop terminating on error");
                pending.fail_all("transport").await;
                break;
            }
        }
    }
}

async fn dispatch_or_forward(
    value: &Value,
    callbacks: &Arc<CallbackRegistry>,
    pending: &PendingRequests,
    writer: &Arc<WriteSerializer>,
    tx: &mpsc::UnboundedSender<SdkMessage>,
    session_id: &Arc<Mutex<Option<String>>>,
) {
    match decode_control_envelope(value) {
        Some(ControlEnvelope::Response { request_id, payload }) => {
            pending.resolve(&request_id, payload).await;
        }
        Some(ControlEnvelope::Request { .. }) => {
            if let Some(response) = callbacks.handle_line(value).await {
                if let Err(err) = writer.write_line(&response).await {
                    warn!(error = %err, "failed to write control response");
                }
            }
        }
        None => match serde_json::from_value::<SdkMessage>(value.clone()) {
            Ok(message) => {
                if let Some(id) = message.session_id() {
                    *session_id.lock().await = Some(id.to_string());
                }
                let _ = tx.send(message);
            }
            Err(err) => warn!(error = %err, "dropping line that is not a recognized session message"),
        },
    }
}

/// Sends one control request over an already-built session and awaits its
/// matching response. Shared by the public `send_control_request` method and
/// the `initialize` handshake in `connect_inner`, which needs to send before
/// the session is installed as `self.session`.
async fn send_control_request_on(
    session: &ConnectedSession,
    subtype: ControlSubtype,
    body: Value,
) -> Result<Value, ClaudeAgentError> {
    let request_id = session.pending.next_request_id();
    let rx = session.pending.register(request_id.clone()).await;
    let envelope = encode_control_request(&request_id, &subtype, body);
    session.writer.write_line(&envelope).await?;
    rx.await
        .map_err(|_| ClaudeAgentError::Closed { resource: "control channel" })?
}

/// The callback-identifier map and agent-definition map the child needs
/// before it can route `hook_callback`/`can_use_tool` requests or resolve an
/// `@agent` reference to its prompt.
fn build_initialize_body(options: &ClaudeAgentOptions, callbacks: &CallbackRegistry) -> Value {
    let agents: std::collections::BTreeMap<&str, Value> = options
        .agents
        .iter()
        .map(|(name, definition)| (name.as_str(), agent_definition_to_wire(definition)))
        .collect();
    json!({
        "hooks": callbacks.hook_callback_map(),
        "agents": agents,
    })
}

fn agent_definition_to_wire(definition: &AgentDefinition) -> Value {
    json!({
        "description": definition.description,
        "prompt": definition.prompt,
        "tools": definition.tools,
        "model": definition.model,
    })
}

fn check_min_version(handshake: &Value, minimum: &str) -> Result<(), ClaudeAgentError> {
    let found = handshake
        .get("version")
        .or_else(|| handshake.get("cli_version"))
        .and_then(Value::as_str)
        .unwrap_or("0.0.0");
    let found_parts: Vec<u32> = found.split('.').filter_map(|p| p.parse().ok()).collect();
    let min_parts: Vec<u32> = minimum.split('.').filter_map(|p| p.parse().ok()).collect();
    if found_parts < min_parts {
        return Err(ClaudeAgentError::VersionTooOld {
            found: found.to_string(),
            minimum: minimum.to_string(),
        });
    }
    Ok(())
}
