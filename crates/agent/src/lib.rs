//! The reasoning loop: the heart of Cinder.
//!
//! One inbound message runs through a bounded **call model → dispatch tools
//! → append results** cycle:
//!
//! 1. **Build context**: workspace system prompt + session metadata + history
//! 2. **Call the model** with the registry's tool schemas
//! 3. **Parse calls**: structured `tool_calls` first, JSON in the text second
//! 4. **No calls**: the reply is the model's text (`Done`)
//! 5. **Calls**: dispatch them, append each result as a tool turn, repeat
//!
//! The loop stops after `max_iterations` model calls (`Exhausted`) and
//! appends a notice to the last text it saw.
//!
//! `spawn_subagent` lets the model start a background turn of the same loop
//! under its own session.

pub mod dispatch;
pub mod loop_runner;
pub mod parse;
pub mod subagent;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatch::ToolDispatcher;
pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS, TRUNCATION_NOTICE, TurnOutcome, TurnStatus};
pub use parse::{CallSource, ParsedCalls, RejectedCall, parse_tool_calls};
pub use subagent::{SUBAGENT_CHANNEL, SpawnSubagentTool, register_subagent_tool};
