//! Tool-call extraction from a model response.
//!
//! Structured `tool_calls` on the message always win. Only when the model
//! returned none do we look at the text itself, and there a JSON object (or
//! array of objects) carrying a `tool` field is the only thing accepted.
//! Anything else is prose, never an error.
//!
//! A structured call whose `arguments` are not valid JSON is still a call:
//! the model gave it an id, so it is kept as [`RejectedCall`] and answered
//! with a failure result rather than dropped.

use cinder_core::message::Message;
use cinder_core::tool::ToolCall;
use serde_json::Value;
use tracing::{debug, warn};

/// Where a batch of calls came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSource {
    None,
    Structured,
    Text,
}

/// A structured call that could not be executed as sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCall {
    pub id: String,
    pub name: String,
    pub reason: String,
}

impl RejectedCall {
    /// The text fed back to the model under this call's id.
    pub fn result_text(&self) -> String {
        format!("Tool '{}' failed: invalid arguments: {}", self.name, self.reason)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedCalls {
    pub calls: Vec<ToolCall>,
    pub rejected: Vec<RejectedCall>,
    pub source: CallSource,
}

impl ParsedCalls {
    fn none() -> Self {
        Self {
            calls: Vec::new(),
            rejected: Vec::new(),
            source: CallSource::None,
        }
    }

    /// True when the response asked for nothing, valid or not.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.rejected.is_empty()
    }
}

/// Extract the tool calls a response is asking for.
pub fn parse_tool_calls(message: &Message) -> ParsedCalls {
    if !message.tool_calls.is_empty() {
        let mut calls = Vec::new();
        let mut rejected = Vec::new();
        for tc in &message.tool_calls {
            let raw = tc.arguments.trim();
            let parsed = if raw.is_empty() {
                Ok(Value::Object(Default::default()))
            } else {
                serde_json::from_str::<Value>(raw)
            };
            match parsed {
                Ok(arguments) => calls.push(ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                }),
                Err(e) => {
                    warn!(tool = %tc.name, id = %tc.id, error = %e, "Tool call has malformed arguments");
                    rejected.push(RejectedCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        return ParsedCalls {
            calls,
            rejected,
            source: CallSource::Structured,
        };
    }

    let calls = parse_text_calls(&message.content);
    if calls.is_empty() {
        return ParsedCalls::none();
    }
    debug!(count = calls.len(), "Recovered tool calls from response text");
    ParsedCalls {
        calls,
        rejected: Vec::new(),
        source: CallSource::Text,
    }
}

/// Fallback path: the whole response text must be JSON naming a tool.
fn parse_text_calls(content: &str) -> Vec<ToolCall> {
    let stripped = content.replace("```json", "").replace("```", "");
    let stripped = stripped.trim();
    if !(stripped.starts_with('{') || stripped.starts_with('[')) {
        return Vec::new();
    }

    let Ok(value) = serde_json::from_str::<Value>(stripped) else {
        return Vec::new();
    };

    match value {
        Value::Object(_) => text_call(&value).into_iter().collect(),
        // Every element naming a tool is kept, not just the first.
        Value::Array(items) => items.iter().filter_map(text_call).collect(),
        _ => Vec::new(),
    }
}

fn text_call(value: &Value) -> Option<ToolCall> {
    let name = value.get("tool")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let arguments = value
        .get("args")
        .or_else(|| value.get("arguments"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Some(ToolCall {
        id: fallback_call_id(),
        name: name.to_string(),
        arguments,
    })
}

fn fallback_call_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("call_{}", &hex[..8])
}
