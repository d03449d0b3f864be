//! `cinder jobs`: manage scheduled jobs.
//!
//! These edit the store file directly. A running daemon picks the changes
//! up on its next start.

use chrono::{DateTime, Utc};
use cinder_config::AppConfig;
use cinder_workflow::{Job, JobStore, JobUpdate, NewJob, RunStatus, Schedule, SchedulerError};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum JobsAction {
    /// List all jobs
    List {
        /// Print the raw JSON records
        #[arg(long)]
        json: bool,
    },

    /// Add a job that sends MESSAGE to the agent on SCHEDULE
    Add {
        name: String,
        /// Cron expression, e.g. "0 9 * * 1-5"
        schedule: String,
        message: String,
        /// IANA timezone, e.g. "Europe/Berlin" (default UTC)
        #[arg(long)]
        tz: Option<String>,
        /// Create the job disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a job by id
    Remove { id: String },

    /// Enable a job by id
    Enable { id: String },

    /// Disable a job by id
    Disable { id: String },
}

pub async fn run(action: JobsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = JobStore::new(config.cron_store_path());

    match action {
        JobsAction::List { json } => list(&store, json).await?,
        JobsAction::Add {
            name,
            schedule,
            message,
            tz,
            disabled,
        } => {
            let mut new = NewJob::agent_turn(name, Schedule::cron(schedule, tz), message);
            if disabled {
                new = new.disabled();
            }
            match store.add(new).await {
                Ok(job) => println!("Job '{}' added with id {}", job.name, job.id),
                Err(SchedulerError::Validation(e)) => {
                    println!("Invalid job: {e}");
                    println!("   Example: \"*/30 * * * *\" = every 30 minutes");
                }
                Err(e) => return Err(e.into()),
            }
        }
        JobsAction::Remove { id } => match store.remove(&id).await {
            Ok(job) => println!("Job '{}' removed.", job.name),
            Err(SchedulerError::NotFound(_)) => println!("Job '{id}' not found."),
            Err(e) => return Err(e.into()),
        },
        JobsAction::Enable { id } => set_enabled(&store, &id, true).await?,
        JobsAction::Disable { id } => set_enabled(&store, &id, false).await?,
    }

    Ok(())
}

async fn list(store: &JobStore, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = store.list().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No jobs scheduled.");
        println!();
        println!("   Add one with:");
        println!("   cinder jobs add \"daily_check\" \"0 9 * * *\" \"Summarize my pending tasks\"");
        return Ok(());
    }

    println!("Jobs ({}):", jobs.len());
    println!("{:-<78}", "");
    for job in &jobs {
        println!("{}", format_job(job));
    }
    Ok(())
}

async fn set_enabled(store: &JobStore, id: &str, enabled: bool) -> Result<(), Box<dyn std::error::Error>> {
    match store.update(id, JobUpdate::enabled(enabled)).await {
        Ok(job) => {
            let verb = if enabled { "enabled" } else { "disabled" };
            println!("Job '{}' {verb}.", job.name);
        }
        Err(SchedulerError::NotFound(_)) => println!("Job '{id}' not found."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn format_job(job: &Job) -> String {
    let status = if job.enabled { "on " } else { "off" };
    let tz = job.schedule.tz.as_deref().unwrap_or("UTC");
    let last = match (job.state.last_status, job.state.last_run_at_ms) {
        (Some(status), Some(ms)) => {
            let when = DateTime::<Utc>::from_timestamp_millis(ms)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| ms.to_string());
            let label = match status {
                RunStatus::Ok => "ok",
                RunStatus::Error => "error",
            };
            format!("{label} at {when}")
        }
        _ => "never run".into(),
    };

    let mut line = format!(
        "  [{status}] {:<20} {:<16} {tz:<14} {last}\n        id: {}",
        job.name, job.schedule.expr, job.id
    );
    if let Some(err) = &job.state.last_error {
        line.push_str(&format!("\n        last error: {err}"));
    }
    line
}
