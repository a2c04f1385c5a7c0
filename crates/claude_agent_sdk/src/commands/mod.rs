//! One-shot administrative passthroughs to `claude` subcommands unrelated to
//! a conversational session: `doctor`, `update`, `mcp add/remove/get/list`,
//! `plugin list/install/uninstall`. Each reuses the Locator and the
//! [`crate::process`] spawn/wait machinery the streaming session uses, but
//! runs to completion and returns a [`CommandOutput`] rather than staying
//! attached.

pub mod admin;
pub mod command;
pub mod doctor;
pub mod mcp;
pub mod update;

pub use admin::AdminClient;
pub use command::ClaudeCommandRequest;
pub use doctor::ClaudeDoctorRequest;
pub use mcp::{McpAddJsonRequest, McpAddRequest, McpGetRequest, McpRemoveRequest, McpScope, McpTransport};
pub use update::ClaudeUpdateRequest;
