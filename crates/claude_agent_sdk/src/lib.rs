#![forbid(unsafe_code)]
//! Async client for driving the `claude` CLI as a long-lived agent
//! subprocess: spawns it, holds a duplex `stream-json` session open, and
//! multiplexes the embedded control protocol (permission callbacks, hooks,
//! in-process tool calls, runtime setters) over the same pipes as the
//! conversational messages.
//!
//! The one-shot administrative subcommands (`doctor`, `update`, `mcp`,
//! `plugin`) live under [`commands`] and don't require a session at all.

mod argv;
mod builder;
mod callbacks;
mod client;
mod commands;
mod control;
mod error;
mod framer;
mod hooks;
mod locator;
mod message;
mod options;
mod permissions;
mod process;
mod stream_json;
mod supervisor;
mod tool_server;
mod writer;

pub use builder::ClaudeAgentOptionsBuilder;
pub use client::{ClaudeAgentClient, ClientState, InitializationResult};
pub use commands::{
    AdminClient, ClaudeCommandRequest, ClaudeDoctorRequest, ClaudeUpdateRequest,
    McpAddJsonRequest, McpAddRequest, McpGetRequest, McpRemoveRequest, McpScope,
    McpTransport as McpCommandTransport,
};
pub use control::ControlSubtype;
pub use error::{ClaudeAgentError, StreamJsonLineError};
pub use hooks::{HookCallback, HookEvent, HookFn, HookInput, HookMatcher, HookOutput};
pub use locator::{locate_executable, WINDOWS_MAX_ARGV_CHARS};
pub use message::{AssistantPayload, ContentBlock, SdkMessage};
pub use options::{
    AgentDefinition, ClaudeAgentOptions, LocalPlugin, McpServerConfig, McpTransport,
    PermissionMode, SandboxSettings, SettingSource, SettingsSource, StderrCallback, SystemPrompt,
    ToolsConfig, DEFAULT_MAX_BUFFER_SIZE,
};
pub use permissions::{CanUseTool, CanUseToolFn, PermissionContext, PermissionResult, PermissionUpdate};
pub use process::CommandOutput;
pub use stream_json::{parse_stream_json_lines, StreamJsonLine, StreamJsonLineOutcome};
pub use tool_server::{serve_stdio, JsonRpcRequest, SdkMcpServer, ToolDefinition, ToolHandler, ToolHandlerFn};
