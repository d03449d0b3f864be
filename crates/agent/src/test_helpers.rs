//! Shared test helpers for loop tests.

use cinder_core::error::ProviderError;
use cinder_core::message::{Message, MessageToolCall};
use cinder_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use cinder_core::workspace::{Skill, WorkspaceContext};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A mock provider that plays back scripted results in order.
///
/// Once the script runs out it keeps returning the `repeat` response, or
/// panics if none was set.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    repeat: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responses(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    /// A provider that returns the same response forever.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(response) => Ok(response.clone()),
            None => panic!("ScriptedProvider: script exhausted"),
        }
    }
}

/// A workspace with a fixed prompt and no files.
pub struct StaticWorkspace {
    root: PathBuf,
    prompt: String,
}

impl StaticWorkspace {
    pub fn new(prompt: &str) -> Self {
        Self {
            root: std::env::temp_dir(),
            prompt: prompt.to_string(),
        }
    }
}

impl WorkspaceContext for StaticWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn system_prompt(&self) -> String {
        self.prompt.clone()
    }

    fn skills(&self) -> Vec<Skill> {
        Vec::new()
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
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

pub fn tool_call_response(calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(thought).with_tool_calls(calls),
        ..text_response(thought)
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
