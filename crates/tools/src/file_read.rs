//! Read-only file tools: `read_file` and `read_dir`.

use async_trait::async_trait;
use cinder_core::error::ToolError;
use cinder_core::tool::{Tool, ToolContext};
use serde_json::Value;

use crate::path::resolve_in_workspace;
use crate::truncate_output;

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Read a workspace file as text.
pub struct ReadFileTool {
    max_chars: usize,
}

impl ReadFileTool {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace."
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
        let path = required_str(&arguments, "path")?;
        let full = resolve_in_workspace(&ctx.workspace_root, path)?;

        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(truncate_output(content, self.max_chars)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ToolError::ExecutionFailed(format!("File does not exist: {path}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// List a workspace directory. Subdirectories carry a trailing `/`.
pub struct ReadDirTool;

#[async_trait]
impl Tool for ReadDirTool {
    fn name(&self) -> &str {
        "read_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory in the workspace."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the workspace (default: workspace root)"
                }
            }
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let full = resolve_in_workspace(&ctx.workspace_root, path)?;

        let metadata = tokio::fs::metadata(&full)
            .await
            .map_err(|_| ToolError::ExecutionFailed(format!("Directory does not exist: {path}")))?;
        if !metadata.is_dir() {
            return Err(ToolError::ExecutionFailed(format!("Not a directory: {path}")));
        }

        let mut entries = Vec::new();
        let mut rd = tokio::fs::read_dir(&full).await?;
        while let Some(entry) = rd.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(format!("'{path}' is empty"));
        }
        Ok(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext::new(dir)
    }

    #[test]
    fn tool_definition() {
        let tool = ReadFileTool::new(5000);
        assert_eq!(tool.name(), "read_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
        assert!(schema["properties"]["path"].is_object());
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let out = ReadFileTool::new(5000)
            .execute(serde_json::json!({"path": "notes.txt"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFileTool::new(5000)
            .execute(serde_json::json!({"path": "nope.txt"}), &ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn read_outside_workspace_denied() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFileTool::new(5000)
            .execute(serde_json::json!({"path": "../secret"}), &ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFileTool::new(5000)
            .execute(serde_json::json!({}), &ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn read_dir_lists_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let out = ReadDirTool
            .execute(serde_json::json!({}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out, "a.txt\nb.txt\nsub/");
    }

    #[tokio::test]
    async fn read_dir_on_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let err = ReadDirTool
            .execute(serde_json::json!({"path": "a.txt"}), &ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not a directory"));
    }
}
