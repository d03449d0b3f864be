//! Background triggers: cron jobs and the heartbeat.
//!
//! Both re-enter the reasoning loop through
//! [`MessageHandler`](cinder_core::handler::MessageHandler), each under its
//! own session key (`cron:<job id>`, `heartbeat:system`), so their history
//! never mixes with a user's conversation.

pub mod cron;
pub mod error;
pub mod heartbeat;
pub mod scheduler;
pub mod store;
pub mod tools;

pub use cron::{CronExpr, parse_timezone};
pub use error::{SchedulerError, StoreError};
pub use heartbeat::{HEARTBEAT_OK, HEARTBEAT_PROMPT, HeartbeatOutcome, HeartbeatService, is_heartbeat_empty};
pub use scheduler::{CRON_CHANNEL, CronScheduler, JobRun, TimerStats};
pub use store::{AGENT_TURN, Job, JobState, JobStore, JobUpdate, NewJob, Payload, RunStatus, STORE_VERSION, Schedule};
pub use tools::register_cron_tools;
