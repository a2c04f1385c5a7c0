//! Demonstrates the one-shot administrative surface (`claude doctor`) via
//! `ClaudeAgentClient::admin` (real CLI only).
//!
//! Usage:
//! - `CLAUDE_EXAMPLE_LIVE=1 cargo run -p claude_agent_sdk --example admin_doctor`

use std::error::Error;

#[path = "support/real_cli.rs"]
mod real_cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if !real_cli::live_enabled() {
        return real_cli::require_live("admin_doctor");
    }

    let options = real_cli::builder().build();
    let client = claude_agent_sdk::ClaudeAgentClient::new(options);

    let admin = client.admin()?;
    let out = admin.doctor().await?;
    println!("exit: {}", out.status);
    print!("{}", String::from_utf8_lossy(&out.stdout));
    eprint!("{}", String::from_utf8_lossy(&out.stderr));

    Ok(())
}
