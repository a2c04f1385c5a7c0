//! Hook matcher registry and chain execution.
//!
//! A hook fires when an event name matches one of the matcher's patterns (or
//! the matcher has no pattern, meaning "always"). Each matching hook in the
//! chain runs in registration order; the chain stops early the moment a hook
//! returns `continue: false`, and the chain's overall output is whichever
//! hook output was non-nil most recently (later non-nil replaces earlier).

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClaudeAgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
    Stop,
    SubagentStop,
    PreCompact,
}

/// Input a hook callback receives: the event name, a tool-call-scoped id when
/// relevant, and the event's free-form payload.
#[derive(Debug, Clone)]
pub struct HookInput {
    pub event: HookEvent,
    pub tool_name: Option<String>,
    pub payload: Value,
}

/// What a hook callback may return. `None` means "no opinion"; the chain
/// keeps walking and an earlier non-nil output stays in effect.
#[derive(Debug, Clone, Default)]
pub struct HookOutput {
    pub decision: Option<Value>,
    pub system_message: Option<String>,
    pub continue_chain: bool,
}

impl HookOutput {
    pub fn nil() -> Option<Self> {
        None
    }

    pub fn stop(decision: Value) -> Option<Self> {
        Some(Self {
            decision: Some(decision),
            system_message: None,
            continue_chain: false,
        })
    }
}

#[async_trait]
pub trait HookCallback: Send + Sync {
    async fn call(&self, input: HookInput) -> Result<Option<HookOutput>, ClaudeAgentError>;
}

/// Adapts a plain async closure into a [`HookCallback`] without requiring
/// callers to hand-write a struct for every hook.
pub struct HookFn<F>(pub F);

#[async_trait]
impl<F, Fut> HookCallback for HookFn<F>
where
    F: Fn(HookInput) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Option<HookOutput>, ClaudeAgentError>> + Send,
{
    async fn call(&self, input: HookInput) -> Result<Option<HookOutput>, ClaudeAgentError> {
        (self.0)(input).await
    }
}

/// A pattern gating which tool names (or other event-specific discriminants)
/// a hook applies to, paired with the callback itself.
#[derive(Clone)]
pub struct HookMatcher {
    pub matcher: Option<String>,
    pub callback: Arc<dyn HookCallback>,
}

impl fmt::Debug for HookMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookMatcher")
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

impl HookMatcher {
    pub fn new(callback: Arc<dyn HookCallback>) -> Self {
        Self {
            matcher: None,
            callback,
        }
    }

    pub fn matching(pattern: impl Into<String>, callback: Arc<dyn HookCallback>) -> Self {
        Self {
            matcher: Some(pattern.into()),
            callback,
        }
    }

    fn applies_to(&self, tool_name: Option<&str>) -> bool {
        match (&self.matcher, tool_name) {
            (None, _) => true,
            (Some(pattern), Some(name)) => pattern == name,
            (Some(_), None) => false,
        }
    }
}

/// Runs every matcher registered for `input.event` in order, short-circuiting
/// on `continue_chain: false` and keeping the most recent non-nil output.
pub async fn run_chain(
    matchers: &[HookMatcher],
    input: HookInput,
) -> Result<Option<HookOutput>, ClaudeAgentError> {
    let mut effective: Option<HookOutput> = None;
    for matcher in matchers {
        if !matcher.applies_to(input.tool_name.as_deref()) {
            continue;
        }
        let Some(output) = matcher.callback.call(input.clone()).await? else {
            continue;
        };
        let stop = !output.continue_chain;
        effective = Some(output);
        if stop {
            break;
        }
    }
    Ok(effective)
}
