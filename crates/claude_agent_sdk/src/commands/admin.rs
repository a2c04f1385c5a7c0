use std::path::PathBuf;

use tokio::process::Command;

use crate::{
    commands::command::ClaudeCommandRequest,
    commands::doctor::ClaudeDoctorRequest,
    commands::mcp::{McpAddJsonRequest, McpAddRequest, McpGetRequest, McpRemoveRequest},
    commands::update::ClaudeUpdateRequest,
    error::ClaudeAgentError,
    locator::locate_executable,
    options::ClaudeAgentOptions,
    process::{self, CommandOutput},
};

/// A thin plugin request: listing what's installed, installing, and
/// uninstalling. Marketplace browsing/publishing is out of scope here.
#[derive(Debug, Clone)]
pub struct PluginRequest {
    name: Option<String>,
}

impl PluginRequest {
    pub fn list() -> Self {
        Self { name: None }
    }

    pub fn install(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()) }
    }

    fn into_command(self, action: &str) -> ClaudeCommandRequest {
        let mut cmd = ClaudeCommandRequest::new(["plugin", action]);
        if let Some(name) = self.name {
            cmd = cmd.arg(name);
        }
        cmd
    }
}

/// Runs one-shot `claude` subcommands: administrative operations that spawn,
/// run to completion, and exit, as opposed to the long-lived session the
/// Client Facade drives.
pub struct AdminClient {
    binary: PathBuf,
    cwd: Option<PathBuf>,
    env: std::collections::BTreeMap<String, String>,
}

impl AdminClient {
    pub fn new(options: &ClaudeAgentOptions) -> Result<Self, ClaudeAgentError> {
        let binary = locate_executable(
            options.cli_path.as_deref(),
            options.bundled_cli_path.as_deref(),
        )?;
        Ok(Self {
            binary,
            cwd: options.cwd.clone(),
            env: options.env.clone(),
        })
    }

    async fn run(&self, request: ClaudeCommandRequest) -> Result<CommandOutput, ClaudeAgentError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(request.argv());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        process::apply_env(&mut cmd, &self.env);
        process::run_command(
            cmd,
            &self.binary,
            request.stdin.as_deref(),
            request.timeout,
            false,
            false,
        )
        .await
    }

    pub async fn doctor(&self) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(ClaudeDoctorRequest::new().into_command()).await
    }

    pub async fn update(&self) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(ClaudeUpdateRequest::new().into_command()).await
    }

    pub async fn mcp_list(&self) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(ClaudeCommandRequest::new(["mcp", "list"])).await
    }

    pub async fn mcp_get(&self, request: McpGetRequest) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(request.into_command()).await
    }

    pub async fn mcp_add(&self, request: McpAddRequest) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(request.into_command()).await
    }

    pub async fn mcp_remove(&self, request: McpRemoveRequest) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(request.into_command()).await
    }

    pub async fn mcp_add_json(&self, request: McpAddJsonRequest) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(request.into_command()).await
    }

    pub async fn plugin_list(&self) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(PluginRequest::list().into_command("list")).await
    }

    pub async fn plugin_install(&self, name: impl Into<String>) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(PluginRequest::install(name).into_command("install")).await
    }

    pub async fn plugin_uninstall(&self, name: impl Into<String>) -> Result<CommandOutput, ClaudeAgentError> {
        self.run(PluginRequest::install(name).into_command("uninstall")).await
    }
}
