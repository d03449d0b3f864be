//! The agent reasoning loop implementation.

use crate::dispatch::ToolDispatcher;
use crate::parse::parse_tool_calls;
use async_trait::async_trait;
use cinder_core::error::AgentError;
use cinder_core::handler::{InboundMessage, MessageHandler};
use cinder_core::message::Message;
use cinder_core::provider::{Provider, ProviderRequest};
use cinder_core::session::SessionStore;
use cinder_core::tool::{ToolContext, ToolRegistry};
use cinder_core::workspace::WorkspaceContext;
use cinder_memory::HistoryLog;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Model calls allowed per inbound message unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Appended to the last visible text when the iteration cap is hit.
pub const TRUNCATION_NOTICE: &str = "\n\n[Reached maximum reasoning steps.]";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model answered without requesting tools.
    Done,
    /// The iteration cap was reached first.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    /// Number of model calls made.
    pub iterations: u32,
    pub status: TurnStatus,
}

/// The core agent loop that orchestrates LLM calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool dispatch over the shared registry
    dispatcher: ToolDispatcher,

    /// Bounded per-session history
    sessions: Arc<dyn SessionStore>,

    /// Source of the system prompt and the tool sandbox root
    workspace: Arc<dyn WorkspaceContext>,

    /// Optional append-only audit log
    history_log: Option<Arc<HistoryLog>>,

    /// Maximum model calls per turn
    max_iterations: u32,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionStore>,
        workspace: Arc<dyn WorkspaceContext>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            dispatcher: ToolDispatcher::new(tools),
            sessions,
            workspace,
            history_log: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of model calls per turn (at least one).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Mirror every inbound message and visible reply into an audit log.
    pub fn with_history_log(mut self, log: Arc<HistoryLog>) -> Self {
        self.history_log = Some(log);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Clear one session's history, or every session's when `key` is `None`.
    pub async fn clear_history(&self, key: Option<&str>) {
        match key {
            Some(key) => self.sessions.clear(key).await,
            None => self.sessions.clear_all().await,
        }
    }

    /// Run one inbound message to completion.
    ///
    /// Each iteration rebuilds the prompt from the workspace and the session
    /// history, so tool results appended in one iteration are visible in the
    /// next. A model failure ends the turn immediately; nothing is retried.
    pub async fn run_turn(&self, text: &str, inbound: &InboundMessage) -> Result<TurnOutcome, AgentError> {
        let session_key = inbound.session_key();
        info!(
            session = %session_key,
            channel = %inbound.channel,
            "Processing message"
        );

        self.log_history(&inbound.channel, &inbound.from, text).await;
        self.sessions.append(&session_key, Message::user(text)).await;

        let tools = self.dispatcher.registry().list_schemas();
        let ctx = ToolContext {
            workspace_root: self.workspace.root().to_path_buf(),
            session_key: session_key.clone(),
            channel: inbound.channel.clone(),
            from: inbound.from.clone(),
        };

        let mut last_text = String::new();

        for iteration in 1..=self.max_iterations {
            debug!(session = %session_key, iteration, "Agent loop iteration");

            let mut messages = vec![Message::system(self.system_context(inbound).await)];
            messages.extend(self.sessions.get(&session_key).await);

            let request = ProviderRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tools.clone(),
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(session = %session_key, iteration, error = %e, "Model call failed, aborting turn");
                    return Err(AgentError::ModelCall {
                        source: e,
                        partial: (!last_text.is_empty()).then_some(last_text),
                    });
                }
            };

            let message = response.message;
            let parsed = parse_tool_calls(&message);
            let visible = message.content.trim().to_string();
            self.sessions.append(&session_key, message).await;

            if !visible.is_empty() {
                self.log_history(&inbound.channel, &format!("agent -> {}", inbound.from), &visible)
                    .await;
                last_text = visible;
            }

            if parsed.is_empty() {
                info!(
                    session = %session_key,
                    iterations = iteration,
                    reply = %preview(&last_text),
                    "Turn complete"
                );
                return Ok(TurnOutcome {
                    reply: last_text,
                    iterations: iteration,
                    status: TurnStatus::Done,
                });
            }

            debug!(
                count = parsed.calls.len(),
                rejected = parsed.rejected.len(),
                source = ?parsed.source,
                "Executing tool calls"
            );
            let outcomes = match parsed.calls.as_slice() {
                [] => Vec::new(),
                [call] => vec![self.dispatcher.execute_call(call, &ctx).await],
                calls => self.dispatcher.execute_many(calls, &ctx).await,
            };

            // Every call id the model issued gets exactly one tool turn.
            let results = outcomes
                .into_iter()
                .map(|o| (o.id, o.result))
                .chain(parsed.rejected.iter().map(|r| (r.id.clone(), r.result_text())));
            for (id, result) in results {
                self.sessions.append(&session_key, Message::tool_result(id, result)).await;
            }
        }

        warn!(
            session = %session_key,
            iterations = self.max_iterations,
            "Max reasoning iterations reached"
        );
        let reply = if last_text.is_empty() {
            TRUNCATION_NOTICE.trim_start().to_string()
        } else {
            format!("{last_text}{TRUNCATION_NOTICE}")
        };
        Ok(TurnOutcome {
            reply,
            iterations: self.max_iterations,
            status: TurnStatus::Exhausted,
        })
    }

    /// Workspace prompt plus the session metadata as plain text.
    ///
    /// Workspace files are read with blocking IO, so the prompt is built on
    /// the blocking pool.
    async fn system_context(&self, inbound: &InboundMessage) -> String {
        let workspace = self.workspace.clone();
        let prompt = match tokio::task::spawn_blocking(move || workspace.system_prompt()).await {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Building the workspace prompt failed");
                String::new()
            }
        };
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        format!(
            "{}\n\n## Session\nChannel: {}\nFrom: {}\nGroup chat: {}\nOwner: {}",
            prompt,
            inbound.channel,
            inbound.from,
            yes_no(inbound.is_group),
            yes_no(inbound.is_owner),
        )
    }

    async fn log_history(&self, channel: &str, speaker: &str, text: &str) {
        let Some(log) = &self.history_log else {
            return;
        };
        if let Err(e) = log.record(channel, speaker, text).await {
            warn!(path = %log.path().display(), error = %e, "Failed to write history log");
        }
    }
}

#[async_trait]
impl MessageHandler for AgentLoop {
    async fn process_message(&self, text: &str, inbound: &InboundMessage) -> Result<String, AgentError> {
        self.run_turn(text, inbound).await.map(|outcome| outcome.reply)
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use cinder_core::error::ProviderError;
    use cinder_core::message::{MessageToolCall, Role};
    use cinder_core::tool::FnTool;
    use cinder_memory::InMemorySessionStore;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    struct Harness {
        provider: Arc<ScriptedProvider>,
        sessions: Arc<InMemorySessionStore>,
        agent: AgentLoop,
    }

    fn harness(provider: ScriptedProvider, tools: Vec<FnTool>) -> Harness {
        let provider = Arc::new(provider);
        let registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            registry.register(Arc::new(tool)).unwrap();
        }
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = AgentLoop::new(
            provider.clone(),
            "mock-model",
            registry,
            sessions.clone(),
            Arc::new(StaticWorkspace::new("You are a test agent.")),
        );
        Harness {
            provider,
            sessions,
            agent,
        }
    }

    fn read_file_tool() -> FnTool {
        FnTool::builder("read_file")
            .description("Read a file")
            .handler(|args: Value, _| async move {
                assert_eq!(args["path"], "notes.txt");
                Ok("hello".to_string())
            })
            .build()
            .unwrap()
    }

    fn cli() -> InboundMessage {
        InboundMessage::new("cli", "me").owner()
    }

    #[tokio::test]
    async fn plain_answer_takes_one_call() {
        let h = harness(ScriptedProvider::responses(vec![text_response("4")]), vec![]);

        let outcome = h.agent.run_turn("what's 2+2", &cli()).await.unwrap();
        assert_eq!(outcome.reply, "4");
        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(h.provider.call_count(), 1);

        let history = h.sessions.get("cli:me").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn tool_result_lands_in_history() {
        let h = harness(
            ScriptedProvider::responses(vec![
                tool_call_response(vec![tool_call("call_1", "read_file", json!({"path": "notes.txt"}))], ""),
                text_response("The file says hello."),
            ]),
            vec![read_file_tool()],
        );

        let reply = h.agent.process_message("read my notes", &cli()).await.unwrap();
        assert_eq!(reply, "The file says hello.");
        assert_eq!(h.provider.call_count(), 2);

        let history = h.sessions.get("cli:me").await;
        let tool_turn = history.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_turn.content, "hello");
        assert_eq!(tool_turn.tool_call_id.as_deref(), Some("call_1"));
        // user, assistant (call), tool, assistant (answer)
        assert_eq!(history.len(), 4);

        // The second request carries the tool result.
        let second = &h.provider.requests()[1];
        assert!(second.messages.iter().any(|m| m.role == Role::Tool && m.content == "hello"));
    }

    #[tokio::test]
    async fn request_carries_context_and_schemas() {
        let h = harness(
            ScriptedProvider::responses(vec![text_response("ok")]),
            vec![read_file_tool()],
        );
        h.agent
            .run_turn("hi", &InboundMessage::new("telegram", "42").group())
            .await
            .unwrap();

        let request = &h.provider.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        let system = &request.messages[0].content;
        assert!(system.starts_with("You are a test agent."));
        assert!(system.contains("Channel: telegram"));
        assert!(system.contains("From: 42"));
        assert!(system.contains("Group chat: yes"));
        assert!(system.contains("Owner: no"));
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, "read_file");
    }

    #[tokio::test]
    async fn always_calling_tools_exhausts() {
        let looping = tool_call_response(
            vec![tool_call("call_x", "read_file", json!({"path": "notes.txt"}))],
            "Let me check again.",
        );
        let h = harness(ScriptedProvider::repeating(looping), vec![read_file_tool()]);
        let agent = h.agent.with_max_iterations(3);

        let outcome = agent.run_turn("loop forever", &cli()).await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Exhausted);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(h.provider.call_count(), 3);
        assert_eq!(outcome.reply, format!("Let me check again.{TRUNCATION_NOTICE}"));
    }

    #[tokio::test]
    async fn exhaustion_without_text_still_has_notice() {
        let looping = tool_call_response(vec![tool_call("c", "read_file", json!({"path": "notes.txt"}))], "");
        let h = harness(ScriptedProvider::repeating(looping), vec![read_file_tool()]);
        let agent = h.agent.with_max_iterations(1);

        let reply = agent.process_message("go", &cli()).await.unwrap();
        assert_eq!(reply, "[Reached maximum reasoning steps.]");
    }

    #[tokio::test]
    async fn default_cap_bounds_model_calls() {
        let looping = tool_call_response(vec![tool_call("c", "missing_tool", json!({}))], "");
        let h = harness(ScriptedProvider::repeating(looping), vec![]);

        let outcome = h.agent.run_turn("go", &cli()).await.unwrap();
        assert_eq!(h.provider.call_count(), DEFAULT_MAX_ITERATIONS as usize);
        assert_eq!(outcome.status, TurnStatus::Exhausted);

        // Unknown tools are fed back as text, not raised.
        let history = h.sessions.get("cli:me").await;
        assert!(history.iter().any(|m| m.role == Role::Tool && m.content.contains("Unknown tool")));
    }

    #[tokio::test]
    async fn model_error_aborts_with_partial_text() {
        let h = harness(
            ScriptedProvider::new(vec![
                Ok(tool_call_response(
                    vec![tool_call("call_1", "read_file", json!({"path": "notes.txt"}))],
                    "Looking at your notes.",
                )),
                Err(ProviderError::Network("connection reset".into())),
            ]),
            vec![read_file_tool()],
        );

        let err = h.agent.run_turn("read my notes", &cli()).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelCall { .. }));
        assert_eq!(err.partial(), Some("Looking at your notes."));
        assert_eq!(h.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn model_error_on_first_call_has_no_partial() {
        let h = harness(
            ScriptedProvider::new(vec![Err(ProviderError::Timeout("30s".into()))]),
            vec![],
        );
        let err = h.agent.process_message("hi", &cli()).await.unwrap_err();
        assert!(err.partial().is_none());
        // The user turn is kept even though the model never answered.
        assert_eq!(h.sessions.get("cli:me").await.len(), 1);
    }

    #[tokio::test]
    async fn json_in_text_is_dispatched() {
        let h = harness(
            ScriptedProvider::responses(vec![
                text_response("```json\n{\"tool\": \"read_file\", \"args\": {\"path\": \"notes.txt\"}}\n```"),
                text_response("Done reading."),
            ]),
            vec![read_file_tool()],
        );

        let outcome = h.agent.run_turn("read notes", &cli()).await.unwrap();
        assert_eq!(outcome.reply, "Done reading.");
        assert_eq!(outcome.iterations, 2);
        let history = h.sessions.get("cli:me").await;
        let tool_turn = history.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_turn.tool_call_id.as_deref().unwrap().starts_with("call_"));
    }

    #[tokio::test]
    async fn batch_results_appended_in_call_order() {
        let echo = FnTool::builder("echo")
            .handler(|args: Value, _| async move {
                let ms = args["delay"].as_u64().unwrap_or(0);
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                Ok(args["text"].as_str().unwrap_or_default().to_string())
            })
            .build()
            .unwrap();
        let h = harness(
            ScriptedProvider::responses(vec![
                tool_call_response(
                    vec![
                        tool_call("a", "echo", json!({"text": "first", "delay": 50})),
                        tool_call("b", "echo", json!({"text": "second", "delay": 0})),
                    ],
                    "",
                ),
                text_response("both done"),
            ]),
            vec![echo],
        );

        h.agent.run_turn("go", &cli()).await.unwrap();
        let tool_turns: Vec<(String, String)> = h
            .sessions
            .get("cli:me")
            .await
            .into_iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| (m.tool_call_id.unwrap_or_default(), m.content))
            .collect();
        assert_eq!(
            tool_turns,
            vec![("a".into(), "first".into()), ("b".into(), "second".into())]
        );
    }

    #[tokio::test]
    async fn malformed_arguments_are_answered_and_loop_continues() {
        let bad = MessageToolCall {
            id: "call_bad".into(),
            name: "read_file".into(),
            arguments: r#"{"path": "#.into(),
        };
        let h = harness(
            ScriptedProvider::responses(vec![
                tool_call_response(vec![bad], ""),
                tool_call_response(
                    vec![
                        tool_call("call_ok", "read_file", json!({"path": "notes.txt"})),
                        MessageToolCall {
                            id: "call_bad2".into(),
                            name: "read_file".into(),
                            arguments: "not json".into(),
                        },
                    ],
                    "",
                ),
                text_response("Sorry, fixed it."),
            ]),
            vec![read_file_tool()],
        );

        let outcome = h.agent.run_turn("read my notes", &cli()).await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(outcome.reply, "Sorry, fixed it.");
        assert_eq!(h.provider.call_count(), 3);

        let history = h.sessions.get("cli:me").await;
        let issued: Vec<&str> = history
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|tc| tc.id.as_str()))
            .collect();
        assert_eq!(issued, ["call_bad", "call_ok", "call_bad2"]);
        for id in issued {
            let answers: Vec<&Message> = history
                .iter()
                .filter(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(id))
                .collect();
            assert_eq!(answers.len(), 1, "call {id} must be answered exactly once");
        }

        let bad_turn = history
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("call_bad"))
            .unwrap();
        assert!(bad_turn.content.starts_with("Tool 'read_file' failed: invalid arguments:"));
        let ok_turn = history
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("call_ok"))
            .unwrap();
        assert_eq!(ok_turn.content, "hello");
    }

    #[tokio::test]
    async fn workspace_prompt_is_read_off_the_runtime_thread() {
        struct ThreadRecorder(Mutex<Vec<std::thread::ThreadId>>);
        impl WorkspaceContext for ThreadRecorder {
            fn root(&self) -> &std::path::Path {
                std::path::Path::new(".")
            }
            fn system_prompt(&self) -> String {
                self.0.lock().unwrap().push(std::thread::current().id());
                "prompt".into()
            }
            fn skills(&self) -> Vec<cinder_core::workspace::Skill> {
                Vec::new()
            }
        }

        let workspace = Arc::new(ThreadRecorder(Mutex::new(Vec::new())));
        let agent = AgentLoop::new(
            Arc::new(ScriptedProvider::responses(vec![text_response("ok")])),
            "mock-model",
            Arc::new(ToolRegistry::new()),
            Arc::new(InMemorySessionStore::new()),
            workspace.clone(),
        );
        agent.run_turn("hi", &cli()).await.unwrap();

        let threads = workspace.0.lock().unwrap().clone();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn sessions_are_isolated_and_clearable() {
        let h = harness(
            ScriptedProvider::responses(vec![text_response("hi a"), text_response("hi b")]),
            vec![],
        );
        h.agent.run_turn("hello", &InboundMessage::new("cli", "a")).await.unwrap();
        h.agent.run_turn("hello", &InboundMessage::new("cli", "b")).await.unwrap();
        assert_eq!(h.sessions.get("cli:a").await.len(), 2);
        assert_eq!(h.sessions.get("cli:b").await.len(), 2);

        h.agent.clear_history(Some("cli:a")).await;
        assert!(h.sessions.get("cli:a").await.is_empty());
        assert_eq!(h.sessions.get("cli:b").await.len(), 2);

        h.agent.clear_history(None).await;
        assert!(h.sessions.keys().await.is_empty());
    }

    #[tokio::test]
    async fn history_log_records_inbound_and_reply() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Arc::new(HistoryLog::for_workspace(tmp.path()));
        let h = harness(ScriptedProvider::responses(vec![text_response("4")]), vec![]);
        let agent = h.agent.with_history_log(log.clone());

        agent.run_turn("what's 2+2", &cli()).await.unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("[cli] me: what's 2+2"));
        assert!(written.contains("[cli] agent -> me: 4"));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 203);
        assert_eq!(preview("short"), "short");
    }
}
