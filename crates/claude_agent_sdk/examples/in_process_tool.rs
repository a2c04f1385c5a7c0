//! Demonstrates an in-process tool served without a subprocess of its own,
//! answered over the control protocol's `mcp_message` subtype (real CLI
//! only).
//!
//! Usage:
//! - `CLAUDE_EXAMPLE_LIVE=1 cargo run -p claude_agent_sdk --example in_process_tool`

use std::{error::Error, sync::Arc};

use claude_agent_sdk::{SdkMcpServer, ToolDefinition, ToolHandlerFn};
use serde_json::json;

#[path = "support/real_cli.rs"]
mod real_cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if !real_cli::live_enabled() {
        return real_cli::require_live("in_process_tool");
    }

    let dice_roller = ToolDefinition {
        name: "roll_dice".into(),
        description: "Rolls an n-sided die and returns the result.".into(),
        input_schema: json!({
            "type": "object",
            "properties": {"sides": {"type": "integer", "minimum": 2}},
            "required": ["sides"],
        }),
        handler: Arc::new(ToolHandlerFn(|args: serde_json::Value| async move {
            let sides = args.get("sides").and_then(serde_json::Value::as_u64).unwrap_or(6);
            // A fixed roll keeps this example deterministic; swap in real
            // randomness for actual use.
            Ok(json!({"sides": sides, "result": sides / 2 + 1}))
        })),
    };

    let server = SdkMcpServer::new("dice", "1.0.0").with_tool(dice_roller);
    let options = real_cli::builder().sdk_mcp_server(server).build();

    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await?;

    let result = client.run_query("Roll a 20-sided die using the roll_dice tool.").await?;
    println!("{result:?}");

    client.close().await?;
    Ok(())
}
