//! Terminal tool: run a shell command inside the workspace.
//!
//! Commands containing a blocklisted fragment are refused before anything is
//! spawned. This is a tripwire against obviously destructive commands, not a
//! sandbox.

use async_trait::async_trait;
use cinder_core::error::ToolError;
use cinder_core::tool::{Tool, ToolContext};
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::path::resolve_in_workspace;
use crate::truncate_output;

/// Fragments refused in any command.
pub const RISKY_COMMANDS: &[&str] = &[
    "rm -rf",
    "mkfs",
    "dd if=",
    "> /dev/",
    "chmod -R 777 /",
    "chown -R",
    ":(){",
    "format c:",
    "shutdown",
    "reboot",
];

/// Execute shell commands with a blocklist and a timeout.
pub struct TerminalTool {
    blocked: Vec<String>,
    timeout: Duration,
    max_output: usize,
}

impl TerminalTool {
    /// `extra_blocked` is added to [`RISKY_COMMANDS`].
    pub fn new(extra_blocked: Vec<String>, timeout: Duration, max_output: usize) -> Self {
        let mut blocked: Vec<String> = RISKY_COMMANDS.iter().map(|s| s.to_string()).collect();
        blocked.extend(extra_blocked.into_iter().filter(|s| !s.trim().is_empty()));
        Self {
            blocked,
            timeout,
            max_output,
        }
    }

    fn blocked_fragment(&self, command: &str) -> Option<&str> {
        let lower = command.to_lowercase();
        self.blocked
            .iter()
            .find(|b| lower.contains(&b.to_lowercase()))
            .map(|b| b.as_str())
    }
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &str {
        "terminal_exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Runs in the workspace directory unless cwd is given."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory relative to the workspace"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if let Some(fragment) = self.blocked_fragment(command) {
            warn!(command = %command, fragment = %fragment, "Blocked risky command");
            return Err(ToolError::PermissionDenied(format!(
                "command contains restricted pattern '{fragment}'"
            )));
        }

        let cwd = match arguments["cwd"].as_str() {
            Some(dir) => resolve_in_workspace(&ctx.workspace_root, dir)?,
            None => ctx.workspace_root.clone(),
        };

        debug!(command = %command, cwd = %cwd.display(), "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(&cwd).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ToolError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let text = if output.status.success() {
            match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
                (true, true) => "Command executed successfully (no output)".to_string(),
                (false, true) => stdout,
                (true, false) => stderr,
                (false, false) => format!("{stdout}\n[stderr]: {stderr}"),
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            format!("[exit code: {code}]\n{stdout}\n{stderr}")
        };

        Ok(truncate_output(text.trim().to_string(), self.max_output))
    }
}
