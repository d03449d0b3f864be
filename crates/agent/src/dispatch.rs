//! Tool dispatch: turn model-proposed calls into registry executions.
//!
//! Dispatch never fails. Unknown tools, handler errors, and handler panics
//! all come back as text, so the loop always has something to hand the
//! model.

use cinder_core::tool::{ToolCall, ToolContext, ToolOutcome, ToolRegistry};
use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one tool by name and return its text result.
    pub async fn execute_one(&self, name: &str, args: Value, ctx: &ToolContext) -> String {
        let Some(tool) = self.registry.get(name) else {
            warn!(tool = %name, "Model requested unknown tool");
            return format!("Unknown tool: {name}");
        };

        let start = Instant::now();
        let result = AssertUnwindSafe(tool.execute(args, ctx)).catch_unwind().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                debug!(tool = %name, duration_ms, bytes = output.len(), "Tool executed");
                output
            }
            Ok(Err(e)) => {
                warn!(tool = %name, duration_ms, error = %e, "Tool execution failed");
                format!("Tool '{name}' failed: {e}")
            }
            Err(_) => {
                warn!(tool = %name, duration_ms, "Tool panicked");
                format!("Tool '{name}' failed: handler panicked")
            }
        }
    }

    /// Execute one call, keeping its id and arguments alongside the result.
    pub async fn execute_call(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let result = self
            .execute_one(&call.name, call.arguments.clone(), ctx)
            .await;
        ToolOutcome {
            id: call.id.clone(),
            tool: call.name.clone(),
            args: call.arguments.clone(),
            result,
        }
    }

    /// Run all calls concurrently and wait for every one.
    ///
    /// Results come back in input order whatever order they finish in.
    /// Calls in one batch are assumed independent of each other.
    pub async fn execute_many(&self, calls: &[ToolCall], ctx: &ToolContext) -> Vec<ToolOutcome> {
        debug!(count = calls.len(), "Dispatching tool batch");
        join_all(calls.iter().map(|call| self.execute_call(call, ctx))).await
    }
}
