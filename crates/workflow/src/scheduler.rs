//! The cron scheduler: one live timer per enabled job.
//!
//! Timers are an owned side table keyed by job id. Every store mutation that
//! touches `enabled` or `schedule` cancels the job's timer and, if the job is
//! still enabled, arms a fresh one. A firing timer spawns the run as its own
//! task, so cancelling or re-arming a timer never interrupts a run that is
//! already in flight.

use crate::cron::CronExpr;
use crate::error::SchedulerError;
use crate::store::{AGENT_TURN, Job, JobStore, JobUpdate, NewJob};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cinder_core::handler::{InboundMessage, MessageHandler};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Channel name job runs arrive on.
pub const CRON_CHANNEL: &str = "cron";

/// Counters for timer churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub armed: usize,
    pub cancelled: usize,
}

/// What one job run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRun {
    Completed(String),
    Failed(String),
}

pub struct CronScheduler {
    store: JobStore,
    handler: Arc<dyn MessageHandler>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    armed: AtomicUsize,
    cancelled: AtomicUsize,
    this: Weak<CronScheduler>,
}

impl CronScheduler {
    pub fn new(store: JobStore, handler: Arc<dyn MessageHandler>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            handler,
            timers: Mutex::new(HashMap::new()),
            armed: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            this: this.clone(),
        })
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Load the store and arm every enabled job. Any timers already running
    /// are cancelled first, so calling this again is a full reload.
    pub async fn start(&self) -> usize {
        self.stop();

        let jobs = self.store.list().await;
        let mut count = 0;
        for job in jobs.iter().filter(|j| j.enabled) {
            if self.arm(job) {
                count += 1;
            }
        }
        info!(path = %self.store.path().display(), jobs = jobs.len(), armed = count, "Cron scheduler started");
        count
    }

    /// Cancel every live timer. Safe to call repeatedly.
    pub fn stop(&self) {
        let drained: Vec<(String, JoinHandle<()>)> = self.lock_timers().drain().collect();
        if drained.is_empty() {
            return;
        }
        for (id, handle) in drained {
            handle.abort();
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %id, "Timer cancelled");
        }
        info!("Cron scheduler stopped");
    }

    pub async fn list_jobs(&self) -> Vec<Job> {
        self.store.list().await
    }

    pub async fn add_job(&self, new: NewJob) -> Result<Job, SchedulerError> {
        let job = self.store.add(new).await?;
        if job.enabled {
            self.arm(&job);
        }
        Ok(job)
    }

    pub async fn update_job(&self, id: &str, update: JobUpdate) -> Result<Job, SchedulerError> {
        let rearm = update.affects_timer();
        let job = self.store.update(id, update).await?;
        if rearm {
            self.cancel(id);
            if job.enabled {
                self.arm(&job);
            }
        }
        Ok(job)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<Job, SchedulerError> {
        self.update_job(id, JobUpdate::enabled(enabled)).await
    }

    /// Remove a job, then its timer. A failed store write leaves both.
    pub async fn delete_job(&self, id: &str) -> Result<Job, SchedulerError> {
        let job = self.store.remove(id).await?;
        self.cancel(id);
        info!(job_id = %id, name = %job.name, "Job deleted");
        Ok(job)
    }

    /// Ids of jobs with a live timer, sorted.
    pub fn live_timers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_timers().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn timer_stats(&self) -> TimerStats {
        TimerStats {
            armed: self.armed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Run a job now and record the outcome in the store.
    ///
    /// The job is re-read at run time so edits to its message apply without
    /// re-arming its timer.
    pub async fn run_job(&self, id: &str) -> Result<JobRun, SchedulerError> {
        let job = self
            .store
            .get(id)
            .await
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;

        info!(job_id = %job.id, name = %job.name, "Executing job");
        let run = if job.payload.kind == AGENT_TURN {
            let inbound = InboundMessage::new(CRON_CHANNEL, job.id.clone());
            match self.handler.process_message(&job.payload.message, &inbound).await {
                Ok(reply) => JobRun::Completed(reply),
                Err(e) => JobRun::Failed(e.to_string()),
            }
        } else {
            JobRun::Failed(format!("Unsupported payload kind: {}", job.payload.kind))
        };

        let outcome = match &run {
            JobRun::Completed(_) => Ok(()),
            JobRun::Failed(e) => {
                error!(job_id = %job.id, name = %job.name, error = %e, "Job failed");
                Err(e.clone())
            }
        };
        if !self.store.record_run(&job.id, outcome).await? {
            debug!(job_id = %job.id, "Job removed while running, state not recorded");
        }
        Ok(run)
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel(&self, id: &str) -> bool {
        match self.lock_timers().remove(id) {
            Some(handle) => {
                handle.abort();
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(job_id = %id, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Arm (or re-arm) the timer for one job. Jobs whose stored schedule no
    /// longer parses are skipped with a warning.
    fn arm(&self, job: &Job) -> bool {
        let (expr, tz) = match job.schedule.validate() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Invalid schedule, job not armed");
                return false;
            }
        };

        let handle = tokio::spawn(timer_loop(self.this.clone(), job.id.clone(), expr, tz));
        if let Some(previous) = self.lock_timers().insert(job.id.clone(), handle) {
            previous.abort();
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        self.armed.fetch_add(1, Ordering::Relaxed);
        debug!(job_id = %job.id, name = %job.name, expr = %job.schedule.expr, "Timer armed");
        true
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.lock_timers().drain() {
            handle.abort();
        }
    }
}

async fn timer_loop(scheduler: Weak<CronScheduler>, job_id: String, expr: CronExpr, tz: Tz) {
    let mut last_fired: Option<DateTime<Utc>> = None;
    loop {
        let now = Utc::now();
        let from = last_fired.map_or(now, |fired| fired.max(now));
        let Some(next) = expr.next_after(from, tz) else {
            warn!(job_id = %job_id, "Schedule has no future occurrence, timer idle");
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        last_fired = Some(next);

        let Some(this) = scheduler.upgrade() else {
            return;
        };
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run_job(&id).await {
                error!(job_id = %id, error = %e, "Job run could not be recorded");
            }
        });
    }
}
