//! File-backed job store.
//!
//! The whole store lives in one JSON file:
//!
//! ```json
//! { "version": 1, "jobs": [ { "id": "...", "name": "...", ... } ] }
//! ```
//!
//! Every mutation is a read-entire-file, mutate, write-entire-file cycle run
//! under a single async lock, so two in-process writers never interleave.
//! Edits made to the file by other processes are last-writer-wins.

use crate::cron::{CronExpr, parse_timezone};
use crate::error::{SchedulerError, StoreError};
use chrono::Utc;
use chrono_tz::Tz;
use cinder_core::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const STORE_VERSION: u32 = 1;

/// Payload kind that runs the message through the reasoning loop.
pub const AGENT_TURN: &str = "agentTurn";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default = "default_schedule_kind")]
    pub kind: String,
    pub expr: String,
    /// IANA zone name; UTC when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
}

fn default_schedule_kind() -> String {
    "cron".into()
}

impl Schedule {
    pub fn cron(expr: impl Into<String>, tz: Option<String>) -> Self {
        Self {
            kind: default_schedule_kind(),
            expr: expr.into(),
            tz,
        }
    }

    /// Parse the expression and zone, failing on either.
    pub fn validate(&self) -> Result<(CronExpr, Tz), ValidationError> {
        let expr = CronExpr::parse(&self.expr)?;
        let tz = parse_timezone(self.tz.as_deref())?;
        Ok((expr, tz))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default = "default_payload_kind")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

fn default_payload_kind() -> String {
    AGENT_TURN.into()
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            kind: default_payload_kind(),
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

/// Outcome of the most recent run. All fields absent means never run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A scheduled job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub schedule: Schedule,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub state: JobState,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
    /// Fields this version does not know about, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Input for creating a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub schedule: Schedule,
    pub message: String,
    pub enabled: bool,
}

impl NewJob {
    /// An enabled job that runs `message` through the agent.
    pub fn agent_turn(name: impl Into<String>, schedule: Schedule, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule,
            message: message.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidJob("name is required".into()));
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::InvalidJob("message is required".into()));
        }
        self.schedule.validate()?;
        Ok(())
    }
}

/// A partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub schedule: Option<Schedule>,
    pub message: Option<String>,
}

impl JobUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Whether applying this update requires re-arming the job's timer.
    pub fn affects_timer(&self) -> bool {
        self.enabled.is_some() || self.schedule.is_some()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ValidationError::InvalidJob("name cannot be empty".into()));
        }
        if self.message.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ValidationError::InvalidJob("message cannot be empty".into()));
        }
        if let Some(schedule) = &self.schedule {
            schedule.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JobFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    jobs: Vec<Job>,
}

fn default_version() -> u32 {
    STORE_VERSION
}

impl Default for JobFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            jobs: Vec::new(),
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct JobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All jobs in file order.
    pub async fn list(&self) -> Vec<Job> {
        let _guard = self.lock.lock().await;
        self.read_file().await.jobs
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.list().await.into_iter().find(|j| j.id == id)
    }

    /// Validate and append a new job. Invalid input never touches the file.
    pub async fn add(&self, new: NewJob) -> Result<Job, SchedulerError> {
        new.validate()?;

        let now = now_ms();
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            enabled: new.enabled,
            schedule: new.schedule,
            payload: Payload {
                kind: AGENT_TURN.into(),
                message: new.message,
            },
            state: JobState::default(),
            created_at_ms: now,
            updated_at_ms: now,
            extra: Map::new(),
        };

        let created = job.clone();
        self.mutate(move |jobs| {
            jobs.push(job);
            Ok(())
        })
        .await?;
        info!(job_id = %created.id, name = %created.name, expr = %created.schedule.expr, "Job added");
        Ok(created)
    }

    /// Apply a partial update and return the resulting record.
    pub async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, SchedulerError> {
        update.validate()?;

        self.mutate(|jobs| {
            let job = jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
            if let Some(name) = update.name {
                job.name = name.trim().to_string();
            }
            if let Some(enabled) = update.enabled {
                job.enabled = enabled;
            }
            if let Some(schedule) = update.schedule {
                job.schedule = schedule;
            }
            if let Some(message) = update.message {
                job.payload.message = message;
            }
            job.updated_at_ms = now_ms();
            Ok(job.clone())
        })
        .await
    }

    /// Remove a job and return the removed record.
    pub async fn remove(&self, id: &str) -> Result<Job, SchedulerError> {
        self.mutate(|jobs| {
            let idx = jobs
                .iter()
                .position(|j| j.id == id)
                .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
            Ok(jobs.remove(idx))
        })
        .await
    }

    /// Record a run outcome. Returns `false` if the job no longer exists.
    pub async fn record_run(&self, id: &str, outcome: Result<(), String>) -> Result<bool, SchedulerError> {
        self.mutate(|jobs| {
            let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
                return Ok(false);
            };
            job.state.last_run_at_ms = Some(now_ms());
            match outcome {
                Ok(()) => {
                    job.state.last_status = Some(RunStatus::Ok);
                    job.state.last_error = None;
                }
                Err(e) => {
                    job.state.last_status = Some(RunStatus::Error);
                    job.state.last_error = Some(e);
                }
            }
            Ok(true)
        })
        .await
    }

    /// The single-writer section: load, mutate, persist.
    ///
    /// If `f` fails nothing is written.
    async fn mutate<T, F>(&self, f: F) -> Result<T, SchedulerError>
    where
        F: FnOnce(&mut Vec<Job>) -> Result<T, SchedulerError>,
    {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file().await;
        let out = f(&mut file.jobs)?;
        file.version = STORE_VERSION;
        self.write_file(&file).await?;
        Ok(out)
    }

    /// Read the store, creating an empty one if absent. A corrupt file is
    /// logged and treated as empty.
    async fn read_file(&self) -> JobFile {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str::<JobFile>(&raw) {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Job store is corrupt, treating as empty");
                    JobFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = JobFile::default();
                match self.write_file(&empty).await {
                    Ok(()) => debug!(path = %self.path.display(), "Created empty job store"),
                    Err(e) => warn!(error = %e, "Could not create job store"),
                }
                empty
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Job store unreadable, treating as empty");
                JobFile::default()
            }
        }
    }

    /// Write via a sibling temp file and rename so readers never see a
    /// half-written store.
    async fn write_file(&self, file: &JobFile) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
