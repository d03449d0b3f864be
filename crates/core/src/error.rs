//! Error types for the Cinder domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; tool failures never leave
//! the dispatcher, model failures abort a turn, and validation failures are
//! raised before any state is touched.

use thiserror::Error;

/// The top-level error type for all Cinder operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Validation ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Agent turn ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the model-calling collaborator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Failures raised by tool handlers. The dispatcher turns every one of
/// these into a textual result for the model.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    ExecutionFailed(String),

    #[error("timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Rejected input. Always raised before any state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tool must have a name")]
    MissingToolName,

    #[error("tool '{0}' must have a handler")]
    MissingHandler(String),

    #[error("tool '{tool}' has an invalid parameter schema: {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("invalid job: {0}")]
    InvalidJob(String),
}

/// Failure of one reasoning-loop turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model call failed. `partial` carries whatever text the turn had
    /// produced before the failure.
    #[error("model call failed: {source}")]
    ModelCall {
        #[source]
        source: ProviderError,
        partial: Option<String>,
    },

    #[error("agent unavailable: {0}")]
    Unavailable(String),
}

impl AgentError {
    /// Text produced before the failure, if any.
    pub fn partial(&self) -> Option<&str> {
        match self {
            Self::ModelCall { partial, .. } => partial.as_deref(),
            Self::Unavailable(_) => None,
        }
    }
}
