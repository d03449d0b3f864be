//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing
//! `/chat/completions` with function calling.

use async_trait::async_trait;
use cinder_core::error::ProviderError;
use cinder_core::message::{Message, MessageToolCall, Role};
use cinder_core::provider::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Wire form of the conversation.
    ///
    /// A tool turn is only valid on the wire right after the assistant turn
    /// that requested it. Tool turns answering calls that were parsed out of
    /// free text, or whose request was evicted from history, are sent as
    /// user text instead.
    fn wire_messages(messages: &[Message]) -> Vec<WireMessage> {
        let mut pending: HashSet<&str> = HashSet::new();
        let mut out = Vec::with_capacity(messages.len());

        for m in messages {
            if m.role == Role::Tool {
                let id = m.tool_call_id.as_deref().unwrap_or_default();
                out.push(if pending.remove(id) {
                    WireMessage::tool(id, &m.content)
                } else {
                    WireMessage::text("user", format!("[Tool result {id}]\n{}", m.content))
                });
                continue;
            }

            pending = m.tool_calls.iter().map(|tc| tc.id.as_str()).collect();
            let mut wire = WireMessage::text(role_name(m.role), m.content.clone());
            if !m.tool_calls.is_empty() {
                wire.tool_calls = Some(m.tool_calls.iter().map(WireCall::from).collect());
            }
            out.push(wire);
        }
        out
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::wire_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            let tools: Vec<WireTool> = request.tools.iter().map(WireTool::from).collect();
            body["tools"] = serde_json::json!(tools);
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }

    fn parse_response(wire: WireResponse) -> Result<ProviderResponse, ProviderError> {
        let Some(choice) = wire.choices.into_iter().next() else {
            return Err(ProviderError::InvalidResponse("No choices in response".into()));
        };

        let calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| MessageToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let message = Message::assistant(choice.message.content.unwrap_or_default()).with_tool_calls(calls);

        Ok(ProviderResponse {
            message,
            usage: wire.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: wire.model.unwrap_or_default(),
        })
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Map a non-success HTTP status to the provider error taxonomy.
fn classify_status(status: StatusCode, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::AuthenticationFailed(format!("HTTP {}: check the configured API key", status.as_u16()))
        }
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message: body,
        },
    }
}

#[async_trait]
impl cinder_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status = status.as_u16(), body = %text, "Completion request rejected");
            return Err(classify_status(status, retry_after, text));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::parse_response(wire)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// Chat-completions wire format.

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool(id: &str, content: &str) -> Self {
        Self {
            tool_call_id: Some(id.to_string()),
            ..Self::text("tool", content.to_string())
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

impl From<&MessageToolCall> for WireCall {
    fn from(call: &MessageToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunction {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

fn function_kind() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireToolSpec,
}

impl From<&ToolDefinition> for WireTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: function_kind(),
            function: WireToolSpec {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolSpec {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_trimmed() {
        let provider =
            OpenAiCompatProvider::new("x", "https://api.example.com/v1/", "k", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.endpoint("models"), "https://api.example.com/v1/models");
    }

    #[test]
    fn roles_map_to_wire_names() {
        let wire = OpenAiCompatProvider::wire_messages(&[
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
        ]);
        let roles: Vec<&str> = wire.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
        assert!(wire.iter().all(|m| m.tool_calls.is_none()));
    }

    #[test]
    fn answered_tool_calls_stay_tool_turns() {
        let call = Message::assistant("").with_tool_calls(vec![MessageToolCall {
            id: "call_1".into(),
            name: "read_file".into(),
            arguments: r#"{"path":"notes.txt"}"#.into(),
        }]);
        let result = Message::tool_result("call_1", "hello");
        let wire = OpenAiCompatProvider::wire_messages(&[call, result]);

        let calls = wire[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "read_file");
        assert_eq!(calls[0].kind, "function");
        assert_eq!(wire[1].role, "tool");
        assert_eq!(wire[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn orphan_tool_turns_become_user_text() {
        let prose_call = Message::assistant(r#"{"tool":"read_file","args":{"path":"a"}}"#);
        let result = Message::tool_result("call_ab12cd34", "contents");
        let wire = OpenAiCompatProvider::wire_messages(&[prose_call, result]);

        assert_eq!(wire[1].role, "user");
        assert!(wire[1].tool_call_id.is_none());
        assert!(wire[1].content.as_deref().unwrap().contains("contents"));
    }

    #[test]
    fn body_includes_tool_choice_only_with_tools() {
        let mut request = ProviderRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.2,
            max_tokens: Some(64),
            tools: vec![],
        };
        let body = OpenAiCompatProvider::build_body(&request);
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["max_tokens"], 64);

        request.tools.push(ToolDefinition {
            name: "t".into(),
            description: "t".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        });
        let body = OpenAiCompatProvider::build_body(&request);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "t");
    }

    #[test]
    fn parse_response_with_tool_calls() {
        let raw = serde_json::json!({
            "model": "qwen3:0.6b",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": { "name": "read_file", "arguments": "{\"path\":\"x\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        let wire: WireResponse = serde_json::from_value(raw).unwrap();
        let response = OpenAiCompatProvider::parse_response(wire).unwrap();
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "");
        assert_eq!(response.message.tool_calls[0].id, "call_9");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(response.model, "qwen3:0.6b");
    }

    #[test]
    fn parse_response_without_choices_is_error() {
        let wire: WireResponse = serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            OpenAiCompatProvider::parse_response(wire),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(12), String::new()),
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, None, String::new()),
            ProviderError::RateLimited { retry_after_secs: 5 }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        match classify_status(StatusCode::BAD_GATEWAY, None, "upstream down".into()) {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
