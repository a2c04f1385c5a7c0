//! Pure translation from an [`ClaudeAgentOptions`] into the `claude` argv and
//! the environment overlay to spawn it with. Produces the same flags in the
//! same order every time for a given input, so tests can assert on argv
//! shape without caring about map iteration order.

use std::collections::BTreeMap;

use crate::options::{
    ClaudeAgentOptions, McpServerConfig, McpTransport, PermissionMode, SettingsSource,
    SystemPrompt, ToolsConfig,
};

pub const ENTRYPOINT_ENV: &str = "CLAUDE_CODE_ENTRYPOINT";
pub const SDK_VERSION_ENV: &str = "CLAUDE_AGENT_SDK_VERSION";
pub const FILE_CHECKPOINTING_ENV: &str = "CLAUDE_CODE_ENABLE_SDK_FILE_CHECKPOINTING";
const ENTRYPOINT_VALUE: &str = "sdk-rust";

fn push_flag(argv: &mut Vec<String>, flag: &str) {
    argv.push(flag.to_string());
}

fn push_value(argv: &mut Vec<String>, flag: &str, value: &str) {
    argv.push(flag.to_string());
    argv.push(value.to_string());
}

fn push_list(argv: &mut Vec<String>, flag: &str, values: &[impl AsRef<str>]) {
    if values.is_empty() {
        return;
    }
    let joined = values.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
    push_value(argv, flag, &joined);
}

/// Builds the argv for a persistent, streaming session: `stream-json` on
/// both ends so the duplex session can carry the control protocol alongside
/// ordinary messages.
pub fn build_argv(options: &ClaudeAgentOptions) -> Vec<String> {
    let mut argv = vec![
        "--input-format".to_string(),
        "stream-json".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--print".to_string(),
    ];

    if options.include_partial_messages {
        push_flag(&mut argv, "--include-partial-messages");
    }
    if let Some(model) = &options.model {
        push_value(&mut argv, "--model", model);
    }
    if let Some(fallback) = &options.fallback_model {
        push_value(&mut argv, "--fallback-model", fallback);
    }
    match &options.system_prompt {
        Some(SystemPrompt::Literal(text)) => push_value(&mut argv, "--system-prompt", text),
        Some(SystemPrompt::Preset { preset, .. }) => {
            push_value(&mut argv, "--system-prompt", preset)
        }
        None => {}
    }
    let mut append_system_prompt = options.append_system_prompt.clone();
    if let Some(SystemPrompt::Preset { append: Some(extra), .. }) = &options.system_prompt {
        append_system_prompt = Some(match append_system_prompt {
            Some(existing) => format!("{existing}\n{extra}"),
            None => extra.clone(),
        });
    }
    if let Some(text) = &append_system_prompt {
        push_value(&mut argv, "--append-system-prompt", text);
    }
    match &options.tools {
        Some(ToolsConfig::List(names)) => push_list(&mut argv, "--tools", names),
        Some(ToolsConfig::Preset(preset)) => push_value(&mut argv, "--tools", preset),
        None => {}
    }
    push_list(&mut argv, "--allowedTools", &options.allowed_tools);
    push_list(&mut argv, "--disallowedTools", &options.disallowed_tools);
    if let Some(turns) = options.max_turns {
        push_value(&mut argv, "--max-turns", &turns.to_string());
    }
    if let Some(budget) = options.max_budget_usd {
        push_value(&mut argv, "--max-budget-usd", &budget.to_string());
    }
    if let Some(tokens) = options.max_thinking_tokens {
        push_value(&mut argv, "--max-thinking-tokens", &tokens.to_string());
    }
    if let Some(mode) = options.permission_mode {
        push_value(&mut argv, "--permission-mode", mode.as_arg_value());
    }
    if let Some(name) = &options.permission_prompt_tool_name {
        push_value(&mut argv, "--permission-prompt-tool-name", name);
    }
    if options.continue_conversation {
        push_flag(&mut argv, "--continue");
    }
    if let Some(session) = &options.resume {
        push_value(&mut argv, "--resume", session);
    }
    if options.fork_session {
        push_flag(&mut argv, "--fork-session");
    }
    for dir in &options.add_dirs {
        push_value(&mut argv, "--add-dir", &dir.to_string_lossy());
    }
    push_list(&mut argv, "--betas", &options.betas);
    if let Some(sources) = &options.setting_sources {
        let values: Vec<&str> = sources.iter().map(|s| s.as_arg_value()).collect();
        push_list(&mut argv, "--setting-sources", &values);
    }
    match &options.settings {
        Some(SettingsSource::Path(path)) => {
            push_value(&mut argv, "--settings", &path.to_string_lossy())
        }
        Some(SettingsSource::Json(json)) => push_value(&mut argv, "--settings", json),
        None => {}
    }
    if let Some(user) = &options.user {
        push_value(&mut argv, "--user", user);
    }
    if let Some(schema) = &options.output_format_schema {
        push_value(&mut argv, "--json-schema", &schema.to_string());
    }
    if options.enable_file_checkpointing {
        push_flag(&mut argv, "--enable-file-checkpointing");
    }

    for (name, config) in &options.mcp_servers {
        push_value(&mut argv, "--mcp-server", &encode_mcp_server(name, config));
    }
    for name in options.sdk_mcp_servers.keys() {
        push_value(&mut argv, "--sdk-mcp-server", name);
    }
    for plugin in &options.plugins {
        push_value(&mut argv, "--plugin-dir", &plugin.path.to_string_lossy());
    }

    for (flag, value) in &options.extra_args {
        push_flag(&mut argv, flag);
        if let Some(value) = value {
            argv.push(value.clone());
        }
    }

    argv
}

fn encode_mcp_server(name: &str, config: &McpServerConfig) -> String {
    let transport = match config.transport {
        McpTransport::Stdio => "stdio",
        McpTransport::Sse => "sse",
        McpTransport::Http => "http",
    };
    format!("{name}={transport}:{}", config.command_or_url)
}

/// Builds the environment overlay applied on top of the inherited process
/// environment: SDK identification vars first, then the caller's own
/// `ClaudeAgentOptions::env`, which always wins on conflict.
pub fn build_env(options: &ClaudeAgentOptions) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("DISABLE_AUTOUPDATER".to_string(), "1".to_string());
    env.insert(ENTRYPOINT_ENV.to_string(), ENTRYPOINT_VALUE.to_string());
    env.insert(
        SDK_VERSION_ENV.to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    if options.enable_file_checkpointing {
        env.insert(FILE_CHECKPOINTING_ENV.to_string(), "1".to_string());
    }
    for (key, value) in &options.env {
        env.insert(key.clone(), value.clone());
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PermissionMode;

    #[test]
    fn base_argv_always_requests_stream_json_both_ways() {
        let argv = build_argv(&ClaudeAgentOptions::default());
        assert_eq!(
            argv,
            vec!["--input-format", "stream-json", "--output-format", "stream-json", "--print"]
        );
    }

    #[test]
    fn model_and_permission_mode_are_appended_in_order() {
        let mut options = ClaudeAgentOptions::default();
        options.model = Some("claude-opus".into());
        options.permission_mode = Some(PermissionMode::AcceptEdits);
        let argv = build_argv(&options);
        let model_idx = argv.iter().position(|a| a == "--model").unwrap();
        assert_eq!(argv[model_idx + 1], "claude-opus");
        let mode_idx = argv.iter().position(|a| a == "--permission-mode").unwrap();
        assert_eq!(argv[mode_idx + 1], "acceptEdits");
    }

    #[test]
    fn caller_env_overrides_sdk_defaults() {
        let mut options = ClaudeAgentOptions::default();
        options.env.insert("DISABLE_AUTOUPDATER".into(), "0".into());
        let env = build_env(&options);
        assert_eq!(env.get("DISABLE_AUTOUPDATER").unwrap(), "0");
    }

    #[test]
    fn allowed_and_disallowed_tools_are_comma_joined() {
        let mut options = ClaudeAgentOptions::default();
        options.allowed_tools = vec!["Bash".into(), "Edit".into()];
        let argv = build_argv(&options);
        let idx = argv.iter().position(|a| a == "--allowedTools").unwrap();
        assert_eq!(argv[idx + 1], "Bash,Edit");
    }
}
