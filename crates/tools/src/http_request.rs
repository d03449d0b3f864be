//! HTTP request tool: call external APIs and webhooks.

use async_trait::async_trait;
use cinder_core::error::ToolError;
use cinder_core::tool::{Tool, ToolContext};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::truncate_output;

pub struct HttpRequestTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl HttpRequestTool {
    pub fn new(timeout: Duration, max_chars: usize) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, max_chars })
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to fetch data from external APIs or websites. \
         Use for API calls, webhooks, or fetching remote data."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to request"
                },
                "method": {
                    "type": "string",
                    "enum": ["get", "post", "put", "delete", "patch"],
                    "description": "HTTP method (default: get)"
                },
                "data": {
                    "type": "object",
                    "description": "JSON request body (for POST/PUT/PATCH)"
                },
                "headers": {
                    "type": "object",
                    "description": "HTTP headers to send",
                    "additionalProperties": { "type": "string" }
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let method = arguments["method"].as_str().unwrap_or("get").to_uppercase();
        let method = match method.as_str() {
            "GET" => reqwest::Method::GET,
            "POST" => reqwest::Method::POST,
            "PUT" => reqwest::Method::PUT,
            "PATCH" => reqwest::Method::PATCH,
            "DELETE" => reqwest::Method::DELETE,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "Invalid HTTP method: {other}"
                )));
            }
        };

        let mut request = self.client.request(method.clone(), url);
        if let Some(headers) = arguments["headers"].as_object() {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), v);
                }
            }
        }
        if let Some(data) = arguments.get("data").filter(|d| !d.is_null()) {
            request = request.json(data);
        }

        debug!(method = %method, url = %url, "Sending HTTP request");

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(ToolError::ExecutionFailed(format!(
                "Request failed: Status {}: {snippet}",
                status.as_u16()
            )));
        }

        // Pretty-print JSON bodies so the model reads them easily
        let text = match serde_json::from_str::<Value>(&body) {
            Ok(json) if json.is_object() || json.is_array() => {
                serde_json::to_string_pretty(&json).unwrap_or(body)
            }
            _ => body,
        };

        Ok(truncate_output(text, self.max_chars))
    }
}
