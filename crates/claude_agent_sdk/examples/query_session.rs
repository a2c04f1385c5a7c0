//! Demonstrates a minimal query/response turn over a persistent session
//! (real CLI only).
//!
//! Usage:
//! - `CLAUDE_EXAMPLE_LIVE=1 cargo run -p claude_agent_sdk --example query_session -- "Hello"`

use std::{env, error::Error};

#[path = "support/real_cli.rs"]
mod real_cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if !real_cli::live_enabled() {
        return real_cli::require_live("query_session");
    }

    let prompt = env::args().nth(1).unwrap_or_else(|| "Say hello in five words or fewer.".into());

    let options = real_cli::builder().build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);
    client.connect().await?;

    let result = client.run_query(prompt).await?;
    println!("session: {:?}", client.session_id().await);
    println!("{result:?}");

    client.close().await?;
    Ok(())
}
