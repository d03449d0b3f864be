//! Tool trait and registry.
//!
//! Tools are what give the agent the ability to act in the world: read and
//! write workspace files, run commands, call HTTP APIs, manage cron jobs.
//! The registry is a process-wide table shared behind an `Arc`; it is
//! read-mostly and only changes through [`ToolRegistry::register`] and
//! [`ToolRegistry::unregister`]. Execution belongs to the dispatcher in
//! `cinder-agent`, not the registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use crate::error::{ToolError, ValidationError};
use crate::provider::ToolDefinition;

/// Shared execution context handed to every tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Root directory that file tools are confined to
    pub workspace_root: PathBuf,

    /// Session key of the turn that requested the call
    pub session_key: String,

    /// Channel the inbound message arrived on
    pub channel: String,

    /// Participant identifier on that channel
    pub from: String,
}

impl ToolContext {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Self::default()
        }
    }
}

/// A request to execute a tool, as proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

/// The textual outcome of one dispatched call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The call ID this result is for
    pub id: String,

    /// Tool name as requested
    pub tool: String,

    /// Arguments as requested
    pub args: Value,

    /// Output text, or a failure description
    pub result: String,
}

/// The core Tool trait.
///
/// Failures are returned as [`ToolError`]; the dispatcher converts them into
/// text so the model always gets something to read.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str {
        ""
    }

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value {
        Value::Null
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> std::result::Result<String, ToolError>;
}

/// Boxed future returned by [`FnTool`] handlers.
pub type ToolFuture = Pin<Box<dyn Future<Output = std::result::Result<String, ToolError>> + Send>>;

type Handler = Arc<dyn Fn(Value, ToolContext) -> ToolFuture + Send + Sync>;

/// A tool backed by a closure, for registering handlers without a new type.
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: Handler,
}

impl FnTool {
    pub fn builder(name: impl Into<String>) -> FnToolBuilder {
        FnToolBuilder {
            name: name.into(),
            description: String::new(),
            schema: Value::Null,
            handler: None,
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> std::result::Result<String, ToolError> {
        (self.handler)(arguments, ctx.clone()).await
    }
}

pub struct FnToolBuilder {
    name: String,
    description: String,
    schema: Value,
    handler: Option<Handler>,
}

impl FnToolBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parameters(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |args, ctx| Box::pin(f(args, ctx))));
        self
    }

    pub fn build(self) -> std::result::Result<FnTool, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingToolName);
        }
        let handler = self
            .handler
            .ok_or_else(|| ValidationError::MissingHandler(self.name.clone()))?;
        Ok(FnTool {
            name: self.name,
            description: self.description,
            schema: self.schema,
            handler,
        })
    }
}

struct Registered {
    tool: Arc<dyn Tool>,
    definition: ToolDefinition,
}

/// The process-wide table of invocable tools.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Registered>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool, replacing any existing tool with the same name.
    ///
    /// An empty description defaults to the tool name and a missing schema
    /// defaults to an empty object schema.
    pub fn register(&self, tool: Arc<dyn Tool>) -> std::result::Result<(), ValidationError> {
        let definition = normalize_definition(tool.as_ref())?;
        let name = definition.name.clone();
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if tools.insert(name.clone(), Registered { tool, definition }).is_some() {
            tracing::debug!(tool = %name, "Replaced existing tool");
        }
        Ok(())
    }

    /// Remove a tool. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.tools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|r| Arc::clone(&r.tool))
    }

    /// Schemas for presentation to the model, sorted by name.
    pub fn list_schemas(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut defs: Vec<ToolDefinition> = tools.values().map(|r| r.definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_definition(tool: &dyn Tool) -> std::result::Result<ToolDefinition, ValidationError> {
    let name = tool.name().trim();
    if name.is_empty() {
        return Err(ValidationError::MissingToolName);
    }

    let description = match tool.description().trim() {
        "" => name.to_string(),
        d => d.to_string(),
    };

    let parameters = match tool.parameters_schema() {
        Value::Null => serde_json::json!({ "type": "object", "properties": {} }),
        schema @ Value::Object(_) => schema,
        other => {
            return Err(ValidationError::InvalidSchema {
                tool: name.to_string(),
                reason: format!("expected a JSON object, got {other}"),
            });
        }
    };

    Ok(ToolDefinition {
        name: name.to_string(),
        description,
        parameters,
    })
}
