//! Todo tool: a small task list the agent keeps for itself.
//!
//! Stored as JSON at `<workspace>/memory/todo.json`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinder_core::error::ToolError;
use cinder_core::tool::{Tool, ToolContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: u64,
    pub task: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct TodoTool {
    write_lock: Mutex<()>,
}

impl TodoTool {
    pub fn new() -> Self {
        Self {
            write_lock: Mutex::new(()),
        }
    }

    fn todo_path(root: &Path) -> PathBuf {
        root.join("memory").join("todo.json")
    }

    async fn load(path: &Path) -> Vec<TodoItem> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Corrupt todo file, starting empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    async fn save(path: &Path, todos: &[TodoItem]) -> Result<(), ToolError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(todos)
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to serialize todos: {e}")))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

impl Default for TodoTool {
    fn default() -> Self {
        Self::new()
    }
}

fn required_id(arguments: &Value, action: &str) -> Result<u64, ToolError> {
    arguments["id"]
        .as_u64()
        .ok_or_else(|| ToolError::InvalidArguments(format!("'id' is required for {action}")))
}

#[async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "Manage a todo list for breaking down and tracking lengthy tasks."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "list", "complete", "remove", "clear"],
                    "description": "Action to perform on the todo list"
                },
                "task": {
                    "type": "string",
                    "description": "The task description (required for 'add')"
                },
                "id": {
                    "type": "integer",
                    "description": "The task ID (required for 'complete' and 'remove')"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let action = arguments["action"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'action' argument".into()))?;

        let _guard = self.write_lock.lock().await;
        let path = Self::todo_path(&ctx.workspace_root);
        let mut todos = Self::load(&path).await;

        match action {
            "add" => {
                let task = arguments["task"]
                    .as_str()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| ToolError::InvalidArguments("'task' is required for add".into()))?;
                let id = todos.iter().map(|t| t.id).max().unwrap_or(0) + 1;
                todos.push(TodoItem {
                    id,
                    task: task.to_string(),
                    completed: false,
                    created_at: Utc::now(),
                    completed_at: None,
                });
                Self::save(&path, &todos).await?;
                Ok(format!("Added todo: [{id}] {task}"))
            }
            "list" => {
                if todos.is_empty() {
                    return Ok("Todo list is empty.".into());
                }
                Ok(todos
                    .iter()
                    .map(|t| format!("[{}] [{}] {}", if t.completed { "x" } else { " " }, t.id, t.task))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            "complete" => {
                let id = required_id(&arguments, "complete")?;
                let item = todos
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or_else(|| ToolError::ExecutionFailed(format!("Todo with ID {id} not found")))?;
                item.completed = true;
                item.completed_at = Some(Utc::now());
                let msg = format!("Completed todo: [{id}] {}", item.task);
                Self::save(&path, &todos).await?;
                Ok(msg)
            }
            "remove" => {
                let id = required_id(&arguments, "remove")?;
                let before = todos.len();
                todos.retain(|t| t.id != id);
                if todos.len() == before {
                    return Err(ToolError::ExecutionFailed(format!("Todo with ID {id} not found")));
                }
                Self::save(&path, &todos).await?;
                Ok(format!("Removed todo with ID {id}"))
            }
            "clear" => {
                Self::save(&path, &[]).await?;
                Ok("Cleared all todos.".into())
            }
            other => Err(ToolError::InvalidArguments(format!("Unknown action: {other}"))),
        }
    }
}
