//! Tools that let the model manage its own scheduled jobs.
//!
//! The tools hold a `Weak` handle: the scheduler owns the message handler,
//! the handler owns the tool registry, and the registry owns these tools.

use crate::error::SchedulerError;
use crate::scheduler::CronScheduler;
use crate::store::{JobUpdate, NewJob, Schedule};
use async_trait::async_trait;
use cinder_core::error::{ToolError, ValidationError};
use cinder_core::tool::{Tool, ToolContext, ToolRegistry};
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Register `get_cron_jobs`, `add_cron_job`, `update_cron_job` and
/// `delete_cron_job` against a scheduler.
pub fn register_cron_tools(registry: &ToolRegistry, scheduler: &Arc<CronScheduler>) -> Result<(), ValidationError> {
    let weak = Arc::downgrade(scheduler);
    registry.register(Arc::new(GetCronJobsTool(weak.clone())))?;
    registry.register(Arc::new(AddCronJobTool(weak.clone())))?;
    registry.register(Arc::new(UpdateCronJobTool(weak.clone())))?;
    registry.register(Arc::new(DeleteCronJobTool(weak)))?;
    Ok(())
}

fn upgrade(scheduler: &Weak<CronScheduler>) -> Result<Arc<CronScheduler>, ToolError> {
    scheduler
        .upgrade()
        .ok_or_else(|| ToolError::ExecutionFailed("Scheduler is not running".into()))
}

fn to_tool_error(e: SchedulerError) -> ToolError {
    match e {
        SchedulerError::Validation(v) => ToolError::InvalidArguments(v.to_string()),
        other => ToolError::ExecutionFailed(other.to_string()),
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Accepts `{expr, tz?}` or a bare expression string.
fn schedule_arg(value: &Value) -> Result<Schedule, ToolError> {
    match value {
        Value::String(expr) => Ok(Schedule::cron(expr.as_str(), None)),
        Value::Object(obj) => {
            let expr = obj
                .get("expr")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidArguments("schedule.expr is required".into()))?;
            let tz = obj.get("tz").and_then(Value::as_str).map(String::from);
            Ok(Schedule::cron(expr, tz))
        }
        _ => Err(ToolError::InvalidArguments(
            "schedule must be an object with 'expr'".into(),
        )),
    }
}

fn schedule_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "expr": { "type": "string", "description": "Cron expression (e.g. '0 9 * * *')" },
            "tz": { "type": "string", "description": "IANA timezone (e.g. 'Asia/Dhaka'), default UTC" }
        },
        "required": ["expr"]
    })
}

pub struct GetCronJobsTool(Weak<CronScheduler>);

#[async_trait]
impl Tool for GetCronJobsTool {
    fn name(&self) -> &str {
        "get_cron_jobs"
    }

    fn description(&self) -> &str {
        "List all scheduled cron jobs."
    }

    async fn execute(&self, _arguments: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let jobs = upgrade(&self.0)?.list_jobs().await;
        serde_json::to_string_pretty(&jobs).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

pub struct AddCronJobTool(Weak<CronScheduler>);

#[async_trait]
impl Tool for AddCronJobTool {
    fn name(&self) -> &str {
        "add_cron_job"
    }

    fn description(&self) -> &str {
        "Add a new scheduled cron job. The message is sent to you when the job fires."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Name of the job" },
                "schedule": schedule_schema(),
                "message": { "type": "string", "description": "Message to process when the job runs" }
            },
            "required": ["name", "schedule", "message"]
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let name = required_str(&arguments, "name")?;
        let message = required_str(&arguments, "message")?;
        let schedule = schedule_arg(&arguments["schedule"])?;

        let job = upgrade(&self.0)?
            .add_job(NewJob::agent_turn(name, schedule, message))
            .await
            .map_err(to_tool_error)?;
        Ok(format!("Job added successfully with ID: {}", job.id))
    }
}

pub struct UpdateCronJobTool(Weak<CronScheduler>);

#[async_trait]
impl Tool for UpdateCronJobTool {
    fn name(&self) -> &str {
        "update_cron_job"
    }

    fn description(&self) -> &str {
        "Change a scheduled cron job's name, schedule, message, or enabled flag."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The ID of the job to update" },
                "name": { "type": "string" },
                "enabled": { "type": "boolean" },
                "schedule": schedule_schema(),
                "message": { "type": "string" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let id = required_str(&arguments, "id")?;
        let schedule = match arguments.get("schedule") {
            None | Some(Value::Null) => None,
            Some(v) => Some(schedule_arg(v)?),
        };
        let update = JobUpdate {
            name: arguments["name"].as_str().map(String::from),
            enabled: arguments["enabled"].as_bool(),
            schedule,
            message: arguments["message"].as_str().map(String::from),
        };

        let job = upgrade(&self.0)?
            .update_job(id, update)
            .await
            .map_err(to_tool_error)?;
        let state = if job.enabled { "enabled" } else { "disabled" };
        Ok(format!("Job {} updated ({state}, schedule '{}').", job.id, job.schedule.expr))
    }
}

pub struct DeleteCronJobTool(Weak<CronScheduler>);

#[async_trait]
impl Tool for DeleteCronJobTool {
    fn name(&self) -> &str {
        "delete_cron_job"
    }

    fn description(&self) -> &str {
        "Delete a scheduled cron job by ID."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The ID of the job to delete" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let id = required_str(&arguments, "id")?;
        upgrade(&self.0)?.delete_job(id).await.map_err(to_tool_error)?;
        Ok(format!("Job {id} deleted successfully."))
    }
}
