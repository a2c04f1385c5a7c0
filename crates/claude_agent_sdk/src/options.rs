//! The Option record: configuration the [`crate::client::ClaudeAgentClient`]
//! consumes, frozen at connect time except for the subset exposed through
//! the client's runtime setters (`set_permission_mode`, `set_model`, ...).

use std::{
    collections::BTreeMap,
    fmt, path::PathBuf,
    sync::Arc,
};

use crate::{
    hooks::{HookEvent, HookMatcher},
    permissions::CanUseTool,
    tool_server::SdkMcpServer,
};

/// `default 1 MiB` ceiling for the Line Framer's speculative-reassembly buffer.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl PermissionMode {
    pub(crate) fn as_arg_value(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg_value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemPrompt {
    Literal(String),
    Preset {
        preset: String,
        append: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolsConfig {
    List(Vec<String>),
    Preset(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    User,
    Project,
    Local,
}

impl SettingSource {
    pub(crate) fn as_arg_value(self) -> &'static str {
        match self {
            SettingSource::User => "user",
            SettingSource::Project => "project",
            SettingSource::Local => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    Path(PathBuf),
    Json(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    Stdio,
    Sse,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    pub transport: McpTransport,
    /// Command (stdio) or URL (sse/http).
    pub command_or_url: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl McpServerConfig {
    pub fn stdio(command: impl Into<String>) -> Self {
        Self {
            transport: McpTransport::Stdio,
            command_or_url: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefinition {
    pub description: String,
    pub prompt: String,
    pub tools: Option<Vec<String>>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SandboxSettings {
    pub enabled: bool,
    pub allowed_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPlugin {
    pub name: String,
    pub path: PathBuf,
}

/// A host-supplied callback invoked on each complete stderr line the child
/// emits. Never blocks the main ingestion path: see `supervisor`'s
/// backpressure policy.
pub type StderrCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration the [`crate::client::ClaudeAgentClient`] is built from.
/// Fields are grouped into three sections: child-process, session,
/// extensibility.
#[derive(Clone)]
pub struct ClaudeAgentOptions {
    // --- child-process group ---
    pub cli_path: Option<PathBuf>,
    pub bundled_cli_path: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub extra_args: BTreeMap<String, Option<String>>,
    pub env: BTreeMap<String, String>,
    pub stderr_callback: Option<StderrCallback>,
    pub max_buffer_size: usize,
    pub min_cli_version: Option<String>,

    // --- session group ---
    pub model: Option<String>,
    pub fallback_model: Option<String>,
    pub max_turns: Option<u32>,
    pub max_budget_usd: Option<f64>,
    pub max_thinking_tokens: Option<u32>,
    pub continue_conversation: bool,
    pub resume: Option<String>,
    pub fork_session: bool,
    pub permission_mode: Option<PermissionMode>,
    pub permission_prompt_tool_name: Option<String>,
    pub tools: Option<ToolsConfig>,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub sandbox: Option<SandboxSettings>,
    pub system_prompt: Option<SystemPrompt>,
    pub append_system_prompt: Option<String>,
    pub setting_sources: Option<Vec<SettingSource>>,
    pub settings: Option<SettingsSource>,
    pub add_dirs: Vec<PathBuf>,
    pub betas: Vec<String>,
    pub output_format_schema: Option<serde_json::Value>,
    pub user: Option<String>,

    // --- extensibility group ---
    pub hooks: BTreeMap<HookEvent, Vec<HookMatcher>>,
    pub can_use_tool: Option<Arc<dyn CanUseTool>>,
    pub sdk_mcp_servers: BTreeMap<String, Arc<SdkMcpServer>>,
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    pub agents: BTreeMap<String, AgentDefinition>,
    pub plugins: Vec<LocalPlugin>,
    pub include_partial_messages: bool,
    pub enable_file_checkpointing: bool,
}

impl fmt::Debug for ClaudeAgentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeAgentOptions")
            .field("cli_path", &self.cli_path)
            .field("cwd", &self.cwd)
            .field("model", &self.model)
            .field("permission_mode", &self.permission_mode)
            .field("resume", &self.resume)
            .field("fork_session", &self.fork_session)
            .field("sdk_mcp_servers", &self.sdk_mcp_servers.keys().collect::<Vec<_>>())
            .field("mcp_servers", &self.mcp_servers.keys().collect::<Vec<_>>())
            .field("max_buffer_size", &self.max_buffer_size)
            .finish_non_exhaustive()
    }
}

impl Default for ClaudeAgentOptions {
    fn default() -> Self {
        Self {
            cli_path: None,
            bundled_cli_path: None,
            cwd: None,
            extra_args: BTreeMap::new(),
            env: BTreeMap::new(),
            stderr_callback: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            min_cli_version: None,

            model: None,
            fallback_model: None,
            max_turns: None,
            max_budget_usd: None,
            max_thinking_tokens: None,
            continue_conversation: false,
            resume: None,
            fork_session: false,
            permission_mode: None,
            permission_prompt_tool_name: None,
            tools: None,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            sandbox: None,
            system_prompt: None,
            append_system_prompt: None,
            setting_sources: None,
            settings: None,
            add_dirs: Vec::new(),
            betas: Vec::new(),
            output_format_schema: None,
            user: None,

            hooks: BTreeMap::new(),
            can_use_tool: None,
            sdk_mcp_servers: BTreeMap::new(),
            mcp_servers: BTreeMap::new(),
            agents: BTreeMap::new(),
            plugins: Vec::new(),
            include_partial_messages: false,
            enable_file_checkpointing: false,
        }
    }
}
