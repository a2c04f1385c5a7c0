//! Assembles a [`ClaudeAgentOptions`]: a fluent, consuming builder with a
//! `.build()` at the end.

use std::{path::PathBuf, sync::Arc};

use crate::{
    hooks::{HookEvent, HookMatcher},
    options::{
        AgentDefinition, ClaudeAgentOptions, LocalPlugin, McpServerConfig, PermissionMode,
        SandboxSettings, SettingSource, SettingsSource, StderrCallback, SystemPrompt, ToolsConfig,
    },
    permissions::CanUseTool,
    tool_server::SdkMcpServer,
};

#[derive(Default)]
pub struct ClaudeAgentOptionsBuilder {
    options: ClaudeAgentOptions,
}

impl ClaudeAgentOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cli_path = Some(path.into());
        self
    }

    pub fn bundled_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.bundled_cli_path = Some(path.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    pub fn extra_arg(mut self, flag: impl Into<String>, value: Option<String>) -> Self {
        self.options.extra_args.insert(flag.into(), value);
        self
    }

    pub fn stderr_callback(mut self, callback: StderrCallback) -> Self {
        self.options.stderr_callback = Some(callback);
        self
    }

    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.options.max_buffer_size = bytes;
        self
    }

    pub fn min_cli_version(mut self, version: impl Into<String>) -> Self {
        self.options.min_cli_version = Some(version.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.options.fallback_model = Some(model.into());
        self
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.options.max_turns = Some(turns);
        self
    }

    pub fn max_budget_usd(mut self, budget: f64) -> Self {
        self.options.max_budget_usd = Some(budget);
        self
    }

    pub fn max_thinking_tokens(mut self, tokens: u32) -> Self {
        self.options.max_thinking_tokens = Some(tokens);
        self
    }

    pub fn continue_conversation(mut self, enabled: bool) -> Self {
        self.options.continue_conversation = enabled;
        self
    }

    pub fn resume(mut self, session_id: impl Into<String>) -> Self {
        self.options.resume = Some(session_id.into());
        self
    }

    pub fn fork_session(mut self, enabled: bool) -> Self {
        self.options.fork_session = enabled;
        self
    }

    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = Some(mode);
        self
    }

    pub fn permission_prompt_tool_name(mut self, name: impl Into<String>) -> Self {
        self.options.permission_prompt_tool_name = Some(name.into());
        self
    }

    pub fn tools(mut self, tools: ToolsConfig) -> Self {
        self.options.tools = Some(tools);
        self
    }

    pub fn allowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn disallowed_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn sandbox(mut self, sandbox: SandboxSettings) -> Self {
        self.options.sandbox = Some(sandbox);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.system_prompt = Some(SystemPrompt::Literal(prompt.into()));
        self
    }

    pub fn system_prompt_preset(mut self, preset: impl Into<String>, append: Option<String>) -> Self {
        self.options.system_prompt = Some(SystemPrompt::Preset {
            preset: preset.into(),
            append,
        });
        self
    }

    pub fn append_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.options.append_system_prompt = Some(text.into());
        self
    }

    pub fn setting_sources(mut self, sources: impl IntoIterator<Item = SettingSource>) -> Self {
        self.options.setting_sources = Some(sources.into_iter().collect());
        self
    }

    pub fn settings(mut self, settings: SettingsSource) -> Self {
        self.options.settings = Some(settings);
        self
    }

    pub fn add_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.add_dirs.push(dir.into());
        self
    }

    pub fn betas(mut self, betas: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options.betas = betas.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_format_schema(mut self, schema: serde_json::Value) -> Self {
        self.options.output_format_schema = Some(schema);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.options.user = Some(user.into());
        self
    }

    pub fn hook(mut self, event: HookEvent, matcher: HookMatcher) -> Self {
        self.options.hooks.entry(event).or_default().push(matcher);
        self
    }

    pub fn can_use_tool(mut self, handler: Arc<dyn CanUseTool>) -> Self {
        self.options.can_use_tool = Some(handler);
        self
    }

    pub fn sdk_mcp_server(mut self, server: SdkMcpServer) -> Self {
        self.options
            .sdk_mcp_servers
            .insert(server.name.clone(), Arc::new(server));
        self
    }

    pub fn mcp_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        self.options.mcp_servers.insert(name.into(), config);
        self
    }

    pub fn agent(mut self, name: impl Into<String>, definition: AgentDefinition) -> Self {
        self.options.agents.insert(name.into(), definition);
        self
    }

    pub fn plugin(mut self, plugin: LocalPlugin) -> Self {
        self.options.plugins.push(plugin);
        self
    }

    pub fn include_partial_messages(mut self, enabled: bool) -> Self {
        self.options.include_partial_messages = enabled;
        self
    }

    pub fn enable_file_checkpointing(mut self, enabled: bool) -> Self {
        self.options.enable_file_checkpointing = enabled;
        self
    }

    pub fn build(self) -> ClaudeAgentOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_applies_requested_fields() {
        let options = ClaudeAgentOptionsBuilder::new()
            .model("claude-opus")
            .permission_mode(PermissionMode::Plan)
            .max_turns(5)
            .build();
        assert_eq!(options.model.as_deref(), Some("claude-opus"));
        assert_eq!(options.permission_mode, Some(PermissionMode::Plan));
        assert_eq!(options.max_turns, Some(5));
    }

    #[test]
    fn hooks_accumulate_per_event() {
        use crate::hooks::{HookFn, HookOutput};

        let options = ClaudeAgentOptionsBuilder::new()
            .hook(
                HookEvent::PreToolUse,
                HookMatcher::new(Arc::new(HookFn(|_input| async { Ok(HookOutput::nil()) }))),
            )
            .hook(
                HookEvent::PreToolUse,
                HookMatcher::new(Arc::new(HookFn(|_input| async { Ok(HookOutput::nil()) }))),
            )
            .build();
        assert_eq!(options.hooks.get(&HookEvent::PreToolUse).unwrap().len(), 2);
    }
}
