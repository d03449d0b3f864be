//! Built-in tool implementations for Cinder.
//!
//! Tools give the agent the ability to interact with the world:
//! read and write workspace files, run shell commands, call HTTP APIs,
//! and keep a todo list. Cron management tools live in `cinder-workflow`
//! because they need the scheduler.

pub mod file_read;
pub mod file_write;
pub mod http_request;
pub mod path;
pub mod terminal;
pub mod todo;

use cinder_config::ToolsConfig;
use cinder_core::error::ValidationError;
use cinder_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use path::resolve_in_workspace;

/// Truncate tool output to `max_chars` characters, marking the cut.
pub fn truncate_output(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n... (truncated)", &text[..idx]),
        None => text,
    }
}

/// Register every built-in tool into `registry`.
///
/// `terminal_exec` is skipped when disabled in config. A tool that cannot
/// be constructed (the HTTP client) is logged and left out.
pub fn register_builtin(registry: &ToolRegistry, config: &ToolsConfig) -> Result<(), ValidationError> {
    let max = config.max_response_chars;

    registry.register(Arc::new(file_read::ReadFileTool::new(max)))?;
    registry.register(Arc::new(file_read::ReadDirTool))?;
    registry.register(Arc::new(file_write::WriteFileTool))?;
    registry.register(Arc::new(file_write::AppendFileTool))?;
    registry.register(Arc::new(file_write::DeleteFileTool))?;
    registry.register(Arc::new(todo::TodoTool::new()))?;

    if config.terminal_enabled {
        registry.register(Arc::new(terminal::TerminalTool::new(
            config.blocked_commands.clone(),
            Duration::from_secs(config.terminal_timeout_secs),
            max,
        )))?;
    }

    match http_request::HttpRequestTool::new(Duration::from_secs(config.http_timeout_secs), max) {
        Ok(tool) => registry.register(Arc::new(tool))?,
        Err(e) => tracing::warn!(error = %e, "http_request tool unavailable"),
    }

    Ok(())
}
