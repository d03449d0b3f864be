//! Wiring shared by every command that talks to the model.

use cinder_agent::AgentLoop;
use cinder_config::AppConfig;
use cinder_core::handler::MessageHandler;
use cinder_core::tool::ToolRegistry;
use cinder_core::workspace::{FileWorkspace, WorkspaceContext};
use cinder_memory::{HistoryLog, InMemorySessionStore};
use cinder_workflow::{CronScheduler, HeartbeatService, JobStore};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Runtime {
    pub config: AppConfig,
    pub workspace: Arc<FileWorkspace>,
    pub registry: Arc<ToolRegistry>,
    pub agent: Arc<AgentLoop>,
    pub scheduler: Arc<CronScheduler>,
    pub heartbeat: Arc<HeartbeatService>,
}

impl Runtime {
    /// Load config and assemble provider, tools, agent, scheduler, and
    /// heartbeat around one shared tool registry and session store.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        Self::build(config)
    }

    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let workspace = Arc::new(FileWorkspace::new(config.workspace_dir()));
        let created = workspace.ensure_defaults()?;
        if !created.is_empty() {
            debug!(count = created.len(), "Created default workspace files");
        }

        if !config.has_api_key() {
            warn!("No API key configured; only keyless endpoints such as a local Ollama will work");
        }
        let provider = Arc::new(cinder_providers::from_config(&config)?);

        let registry = Arc::new(ToolRegistry::new());
        cinder_tools::register_builtin(&registry, &config.tools)?;

        let sessions = Arc::new(InMemorySessionStore::with_capacity(config.agent.max_history));
        let history_log = Arc::new(HistoryLog::for_workspace(workspace.root()));
        let max_iterations = u32::try_from(config.agent.max_iterations).unwrap_or(u32::MAX);

        let agent = Arc::new(
            AgentLoop::new(
                provider,
                config.default_model.clone(),
                registry.clone(),
                sessions,
                workspace.clone(),
            )
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(max_iterations)
            .with_history_log(history_log),
        );

        let handler: Arc<dyn MessageHandler> = agent.clone();
        cinder_agent::register_subagent_tool(&registry, &handler)?;

        let scheduler = CronScheduler::new(JobStore::new(config.cron_store_path()), agent.clone());
        cinder_workflow::register_cron_tools(&registry, &scheduler)?;

        let heartbeat = HeartbeatService::from_config(&config.heartbeat, workspace.heartbeat_path(), agent.clone());

        Ok(Self {
            config,
            workspace,
            registry,
            agent,
            scheduler,
            heartbeat,
        })
    }
}
