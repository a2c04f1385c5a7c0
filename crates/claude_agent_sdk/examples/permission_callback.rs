//! Demonstrates gating tool calls with a `can_use_tool` callback (real CLI
//! only). Allows everything but `Bash`, which it denies with a message the
//! child surfaces back to the model.
//!
//! Usage:
//! - `CLAUDE_EXAMPLE_LIVE=1 cargo run -p claude_agent_sdk --example permission_callback`

use std::{error::Error, sync::Arc};

use claude_agent_sdk::{CanUseToolFn, PermissionContext, PermissionResult};

#[path = "support/real_cli.rs"]
mod real_cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if !real_cli::live_enabled() {
        return real_cli::require_live("permission_callback");
    }

    let options = real_cli::builder()
        .can_use_tool(Arc::new(CanUseToolFn(|ctx: PermissionContext| async move {
            if ctx.tool_name == "Bash" {
                Ok(PermissionResult::deny("shell access is disabled in this example"))
            } else {
                Ok(PermissionResult::allow())
            }
        })))
        .build();

    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await?;

    let result = client.run_query("List the files in the current directory.").await?;
    println!("{result:?}");

    client.close().await?;
    Ok(())
}
