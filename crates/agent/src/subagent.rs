//! `spawn_subagent`: hand a task to a background turn of the same loop.
//!
//! The sub-turn runs on the `subagent` channel under a fresh session key, so
//! it neither sees nor pollutes the caller's history. The tool returns as
//! soon as the turn is spawned; the reply only goes to the log.

use async_trait::async_trait;
use cinder_core::error::{ToolError, ValidationError};
use cinder_core::handler::{InboundMessage, MessageHandler};
use cinder_core::tool::{Tool, ToolContext, ToolRegistry};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{error, info};

/// Channel background sub-turns arrive on.
pub const SUBAGENT_CHANNEL: &str = "subagent";

/// Register `spawn_subagent` against the handler that will run sub-turns.
///
/// The tool keeps a `Weak` handle because the handler owns the registry the
/// tool lives in.
pub fn register_subagent_tool(
    registry: &ToolRegistry,
    handler: &Arc<dyn MessageHandler>,
) -> Result<(), ValidationError> {
    registry.register(Arc::new(SpawnSubagentTool::new(Arc::downgrade(handler))))
}

pub struct SpawnSubagentTool {
    handler: Weak<dyn MessageHandler>,
}

impl SpawnSubagentTool {
    pub fn new(handler: Weak<dyn MessageHandler>) -> Self {
        Self { handler }
    }
}

fn subagent_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..12].to_string()
}

#[async_trait]
impl Tool for SpawnSubagentTool {
    fn name(&self) -> &str {
        "spawn_subagent"
    }

    fn description(&self) -> &str {
        "Spawn a sub-agent to perform a specific task in the background."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task description for the sub-agent to perform"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let task = arguments["task"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?
            .to_string();
        let handler = self
            .handler
            .upgrade()
            .ok_or_else(|| ToolError::ExecutionFailed("Agent is shutting down".into()))?;

        let inbound = InboundMessage::new(SUBAGENT_CHANNEL, subagent_id());
        let session = inbound.session_key();
        info!(session = %session, task = %task, "Spawning sub-agent");

        let reply = format!("Sub-agent spawned for task: \"{task}\" (session {session}). It will run in the background.");
        tokio::spawn(async move {
            match handler.process_message(&task, &inbound).await {
                Ok(_) => info!(session = %inbound.session_key(), "Sub-agent task completed"),
                Err(e) => error!(session = %inbound.session_key(), error = %e, "Sub-agent task failed"),
            }
        });

        Ok(reply)
    }
}
