//! Small helper for examples that need a real `claude` CLI binary on PATH.
//!
//! Conventions:
//! - Examples default to using the caller's existing config/auth state.
//! - Set `CLAUDE_EXAMPLE_LIVE=1` to enable examples that spawn a real session
//!   (they otherwise print a skip notice and exit 0, so `cargo run --example`
//!   stays usable in CI without a configured CLI).

#![allow(dead_code)]

use std::{env, error::Error};

use claude_agent_sdk::ClaudeAgentOptionsBuilder;

pub const ENV_BINARY: &str = "CLAUDE_BINARY";
pub const ENV_EXAMPLE_LIVE: &str = "CLAUDE_EXAMPLE_LIVE";

fn is_truthy(var: &str) -> bool {
    matches!(env::var(var).ok().as_deref(), Some("1") | Some("true") | Some("yes"))
}

pub fn live_enabled() -> bool {
    is_truthy(ENV_EXAMPLE_LIVE)
}

pub fn require_live(example_name: &str) -> Result<(), Box<dyn Error>> {
    if live_enabled() {
        return Ok(());
    }
    eprintln!("skipped {example_name}: set {ENV_EXAMPLE_LIVE}=1 to run against a real claude binary");
    Ok(())
}

pub fn builder() -> ClaudeAgentOptionsBuilder {
    let mut b = ClaudeAgentOptionsBuilder::new();
    if let Some(binary) = env::var_os(ENV_BINARY) {
        b = b.cli_path(binary);
    }
    b
}
