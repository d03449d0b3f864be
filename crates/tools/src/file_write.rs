//! Mutating file tools: `write_file`, `append_file`, `delete_file`.

use async_trait::async_trait;
use cinder_core::error::ToolError;
use cinder_core::tool::{Tool, ToolContext};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::path::resolve_in_workspace;

fn path_and_content(arguments: &Value) -> Result<(&str, &str), ToolError> {
    let path = arguments["path"]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
    let content = arguments["content"]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
    Ok((path, content))
}

fn write_schema(verb: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "File path relative to the workspace"
            },
            "content": {
                "type": "string",
                "description": format!("Text to {verb}")
            }
        },
        "required": ["path", "content"]
    })
}

async fn ensure_parent(path: &std::path::Path) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Create or overwrite a workspace file.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file in the workspace, replacing any existing content. Creates parent directories."
    }

    fn parameters_schema(&self) -> Value {
        write_schema("write")
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let (path, content) = path_and_content(&arguments)?;
        let full = resolve_in_workspace(&ctx.workspace_root, path)?;
        ensure_parent(&full).await?;
        tokio::fs::write(&full, content).await?;
        debug!(path = %full.display(), bytes = content.len(), "File written");
        Ok(format!("Wrote {} bytes to '{path}'", content.len()))
    }
}

/// Append to a workspace file, creating it if needed.
pub struct AppendFileTool;

#[async_trait]
impl Tool for AppendFileTool {
    fn name(&self) -> &str {
        "append_file"
    }

    fn description(&self) -> &str {
        "Append text to the end of a file in the workspace. Creates the file if it does not exist."
    }

    fn parameters_schema(&self) -> Value {
        write_schema("append")
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let (path, content) = path_and_content(&arguments)?;
        let full = resolve_in_workspace(&ctx.workspace_root, path)?;
        ensure_parent(&full).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(format!("Appended to '{path}'"))
    }
}

/// Delete a workspace file. Directories are refused.
pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file from the workspace."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let full = resolve_in_workspace(&ctx.workspace_root, path)?;

        match tokio::fs::metadata(&full).await {
            Ok(m) if m.is_dir() => Err(ToolError::ExecutionFailed(format!("'{path}' is a directory"))),
            Ok(_) => {
                tokio::fs::remove_file(&full).await?;
                Ok(format!("Deleted file '{path}'"))
            }
            Err(_) => Err(ToolError::ExecutionFailed(format!("File does not exist: {path}"))),
        }
    }
}
