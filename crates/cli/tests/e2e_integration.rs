//! End-to-end tests for the Cinder runtime.
//!
//! These wire the real tools, session store, workspace, scheduler, and
//! heartbeat around a scripted model and drive them the way the CLI does.

use std::sync::{Arc, Mutex};

use cinder_agent::{AgentLoop, TRUNCATION_NOTICE, TurnStatus};
use cinder_config::ToolsConfig;
use cinder_core::error::ProviderError;
use cinder_core::handler::{InboundMessage, MessageHandler};
use cinder_core::message::{Message, MessageToolCall, Role};
use cinder_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use cinder_core::session::{MAX_HISTORY, SessionStore};
use cinder_core::tool::ToolRegistry;
use cinder_core::workspace::FileWorkspace;
use cinder_memory::{HistoryLog, InMemorySessionStore};
use cinder_workflow::{CronScheduler, HeartbeatOutcome, HeartbeatService, JobRun, JobStore, RunStatus};
use serde_json::json;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted responses in sequence and keeps every request.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> ProviderRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted at call #{call}");
        }
        Ok(responses.remove(0))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

fn tool_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant("").with_tool_calls(calls),
        ..text_response("")
    }
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Stack {
    _tmp: tempfile::TempDir,
    workspace: Arc<FileWorkspace>,
    provider: Arc<ScriptedProvider>,
    sessions: Arc<InMemorySessionStore>,
    agent: Arc<AgentLoop>,
    scheduler: Arc<CronScheduler>,
}

fn stack(responses: Vec<ProviderResponse>) -> Stack {
    let tmp = tempfile::tempdir().unwrap();
    let workspace = Arc::new(FileWorkspace::new(tmp.path().join("workspace")));
    workspace.ensure_defaults().unwrap();

    let provider = ScriptedProvider::new(responses);
    let registry = Arc::new(ToolRegistry::new());
    cinder_tools::register_builtin(&registry, &ToolsConfig::default()).unwrap();

    let sessions = Arc::new(InMemorySessionStore::new());
    let agent = Arc::new(
        AgentLoop::new(
            provider.clone(),
            "mock-model",
            registry.clone(),
            sessions.clone(),
            workspace.clone(),
        )
        .with_history_log(Arc::new(HistoryLog::for_workspace(&tmp.path().join("workspace")))),
    );

    let scheduler = CronScheduler::new(JobStore::new(tmp.path().join("cron/jobs.json")), agent.clone());
    cinder_workflow::register_cron_tools(&registry, &scheduler).unwrap();

    Stack {
        _tmp: tmp,
        workspace,
        provider,
        sessions,
        agent,
        scheduler,
    }
}

fn owner() -> InboundMessage {
    InboundMessage::new("cli", "me").owner()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plain_question() {
    let s = stack(vec![text_response("4")]);

    let reply = s.agent.process_message("what's 2+2", &owner()).await.unwrap();
    assert_eq!(reply, "4");
    assert_eq!(s.provider.calls(), 1);
    assert_eq!(s.sessions.get("cli:me").await.len(), 2);

    // Workspace prompt and every tool schema reach the model.
    let request = s.provider.last_request();
    assert!(request.messages[0].content.contains("Cinder"));
    let names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
    for expected in ["read_file", "write_file", "todo", "add_cron_job", "get_cron_jobs"] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

#[tokio::test]
async fn e2e_write_then_read_file() {
    let s = stack(vec![
        tool_response(vec![tool_call("w1", "write_file", json!({"path": "notes.txt", "content": "hello"}))]),
        tool_response(vec![tool_call("r1", "read_file", json!({"path": "notes.txt"}))]),
        text_response("Your note says hello."),
    ]);

    let outcome = s.agent.run_turn("save and read a note", &owner()).await.unwrap();
    assert_eq!(outcome.reply, "Your note says hello.");
    assert_eq!(outcome.iterations, 3);

    let on_disk = std::fs::read_to_string(s.workspace.heartbeat_path().with_file_name("notes.txt")).unwrap();
    assert_eq!(on_disk, "hello");

    let history = s.sessions.get("cli:me").await;
    let read_result = history
        .iter()
        .find(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some("r1"))
        .unwrap();
    assert_eq!(read_result.content, "hello");
}

#[tokio::test]
async fn e2e_escape_attempt_is_reported_to_model() {
    let s = stack(vec![
        tool_response(vec![tool_call("r1", "read_file", json!({"path": "../../etc/passwd"}))]),
        text_response("I can't read that."),
    ]);

    let reply = s.agent.process_message("read /etc/passwd", &owner()).await.unwrap();
    assert_eq!(reply, "I can't read that.");

    let history = s.sessions.get("cli:me").await;
    let tool_turn = history.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_turn.content.starts_with("Tool 'read_file' failed:"), "{}", tool_turn.content);
}

#[tokio::test]
async fn e2e_model_schedules_job_and_job_runs() {
    let s = stack(vec![
        tool_response(vec![tool_call(
            "c1",
            "add_cron_job",
            json!({"name": "Water plants", "schedule": {"expr": "0 8 * * *", "tz": "Europe/Berlin"}, "message": "Remind me to water the plants"}),
        )]),
        text_response("Scheduled."),
        text_response("Time to water the plants!"),
    ]);

    let reply = s.agent.process_message("remind me every morning", &owner()).await.unwrap();
    assert_eq!(reply, "Scheduled.");

    let jobs = s.scheduler.list_jobs().await;
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.schedule.tz.as_deref(), Some("Europe/Berlin"));
    assert_eq!(s.scheduler.live_timers(), vec![job.id.clone()]);

    let run = s.scheduler.run_job(&job.id).await.unwrap();
    assert_eq!(run, JobRun::Completed("Time to water the plants!".into()));

    let job_history = s.sessions.get(&format!("cron:{}", job.id)).await;
    assert_eq!(job_history.len(), 2);
    assert_eq!(job_history[0].content, "Remind me to water the plants");

    let state = s.scheduler.store().get(&job.id).await.unwrap().state;
    assert_eq!(state.last_status, Some(RunStatus::Ok));
    s.scheduler.stop();
}

#[tokio::test]
async fn e2e_invalid_schedule_from_model_changes_nothing() {
    let s = stack(vec![
        tool_response(vec![tool_call(
            "c1",
            "add_cron_job",
            json!({"name": "Bad", "schedule": {"expr": "every morning"}, "message": "x"}),
        )]),
        text_response("That schedule was invalid."),
    ]);

    s.agent.process_message("schedule something", &owner()).await.unwrap();
    assert!(s.scheduler.list_jobs().await.is_empty());
    assert!(s.scheduler.live_timers().is_empty());

    let history = s.sessions.get("cli:me").await;
    let tool_turn = history.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_turn.content.contains("invalid cron expression"));
}

#[tokio::test]
async fn e2e_heartbeat_gated_on_tasks() {
    let s = stack(vec![text_response("HEARTBEAT_OK")]);
    let heartbeat = HeartbeatService::new(
        s.workspace.heartbeat_path(),
        s.agent.clone(),
        std::time::Duration::from_secs(1800),
    );

    // Default HEARTBEAT.md holds only headings, comments, and an empty box.
    assert_eq!(heartbeat.tick().await.unwrap(), HeartbeatOutcome::Skipped);
    assert_eq!(s.provider.calls(), 0);

    std::fs::write(s.workspace.heartbeat_path(), "# Tasks\n- [ ] call mom\n").unwrap();
    assert_eq!(heartbeat.tick().await.unwrap(), HeartbeatOutcome::Idle);
    assert_eq!(s.provider.calls(), 1);
    assert_eq!(s.sessions.get("heartbeat:system").await.len(), 2);
}

#[tokio::test]
async fn e2e_runaway_tool_loop_is_capped() {
    let looping: Vec<ProviderResponse> = (0..3)
        .map(|i| tool_response(vec![tool_call(&format!("t{i}"), "read_dir", json!({}))]))
        .collect();
    let s = stack(looping);
    let agent = AgentLoop::new(
        s.provider.clone(),
        "mock-model",
        Arc::new(ToolRegistry::new()),
        s.sessions.clone(),
        s.workspace.clone(),
    )
    .with_max_iterations(3);

    let outcome = agent.run_turn("list forever", &owner()).await.unwrap();
    assert_eq!(outcome.status, TurnStatus::Exhausted);
    assert!(outcome.reply.ends_with(TRUNCATION_NOTICE.trim_start()));
    assert_eq!(s.provider.calls(), 3);
}

#[tokio::test]
async fn e2e_history_stays_bounded() {
    let responses = (0..15).map(|i| text_response(&format!("reply {i}"))).collect();
    let s = stack(responses);

    for i in 0..15 {
        s.agent.process_message(&format!("message {i}"), &owner()).await.unwrap();
    }

    let history = s.sessions.get("cli:me").await;
    assert_eq!(history.len(), MAX_HISTORY);
    assert_eq!(history.last().unwrap().content, "reply 14");
    // 30 turns appended, the oldest 10 evicted.
    assert_eq!(history[0].content, "message 5");
}
