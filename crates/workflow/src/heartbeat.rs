//! Heartbeat: a periodic, content-gated check-in.
//!
//! Every interval the service reads `HEARTBEAT.md`. If it holds nothing but
//! headings, comments, and empty checklist markers, the tick is skipped
//! without calling the model. Otherwise the agent is asked to work through
//! the file and reply `HEARTBEAT_OK` when nothing needs attention.

use cinder_config::HeartbeatConfig;
use cinder_core::error::AgentError;
use cinder_core::handler::{InboundMessage, MessageHandler};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const HEARTBEAT_OK: &str = "HEARTBEAT_OK";

pub const HEARTBEAT_PROMPT: &str = "Read HEARTBEAT.md in your workspace. Follow any instructions or tasks listed there. If nothing needs attention, reply with: HEARTBEAT_OK";

pub const HEARTBEAT_CHANNEL: &str = "heartbeat";

/// True when the artifact has no actionable line.
pub fn is_heartbeat_empty(content: &str) -> bool {
    content.lines().map(str::trim).all(|line| {
        line.is_empty()
            || line.starts_with('#')
            || line.starts_with("<!--")
            || matches!(line, "- [ ]" | "- [x]" | "* [ ]" | "* [x]")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Nothing to do; the model was not called.
    Skipped,
    /// The model replied with the sentinel.
    Idle,
    /// The model did something; this is its reply.
    Acted(String),
}

pub struct HeartbeatService {
    artifact: PathBuf,
    handler: Arc<dyn MessageHandler>,
    interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatService {
    pub fn new(artifact: impl Into<PathBuf>, handler: Arc<dyn MessageHandler>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            artifact: artifact.into(),
            handler,
            interval: interval.max(Duration::from_millis(1)),
            timer: Mutex::new(None),
        })
    }

    pub fn from_config(
        config: &HeartbeatConfig,
        artifact: impl Into<PathBuf>,
        handler: Arc<dyn MessageHandler>,
    ) -> Arc<Self> {
        let minutes = u64::from(config.interval_minutes.max(1));
        Self::new(artifact, handler, Duration::from_secs(minutes * 60))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one heartbeat check.
    pub async fn tick(&self) -> Result<HeartbeatOutcome, AgentError> {
        let content = match tokio::fs::read_to_string(&self.artifact).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.artifact.display(), error = %e, "Could not read heartbeat file");
                }
                String::new()
            }
        };

        if is_heartbeat_empty(&content) {
            debug!("Heartbeat: no tasks");
            return Ok(HeartbeatOutcome::Skipped);
        }

        info!("Heartbeat: checking for tasks");
        let reply = self.trigger_now().await?;
        if reply.to_uppercase().contains(HEARTBEAT_OK) {
            info!("Heartbeat: OK (no action needed)");
            Ok(HeartbeatOutcome::Idle)
        } else {
            info!("Heartbeat: completed task");
            Ok(HeartbeatOutcome::Acted(reply))
        }
    }

    /// Ask the agent to work through the heartbeat file, skipping the
    /// emptiness check.
    pub async fn trigger_now(&self) -> Result<String, AgentError> {
        let inbound = InboundMessage::new(HEARTBEAT_CHANNEL, "system");
        self.handler.process_message(HEARTBEAT_PROMPT, &inbound).await
    }

    /// Start the periodic timer. Returns `false` if it was already running.
    ///
    /// The first tick fires one full interval after starting.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut timer = self.lock_timer();
        if timer.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let weak = Arc::downgrade(self);
        *timer = Some(tokio::spawn(heartbeat_loop(weak, self.interval)));
        info!(interval_secs = self.interval.as_secs(), "Heartbeat started");
        true
    }

    /// Stop the timer. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        match self.lock_timer().take() {
            Some(handle) => {
                handle.abort();
                info!("Heartbeat stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_timer().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for HeartbeatService {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_timer().take() {
            handle.abort();
        }
    }
}

async fn heartbeat_loop(service: Weak<HeartbeatService>, period: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(this) = service.upgrade() else {
            return;
        };
        // A detached task: stopping the timer must not cut a turn short.
        let run = tokio::spawn(async move { this.tick().await });
        match run.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "Heartbeat execution failed"),
            Err(e) => error!(error = %e, "Heartbeat task panicked"),
        }
    }
}
