//! # Cinder Core
//!
//! Domain types, traits, and error definitions for the Cinder agent runtime.
//! This crate has **no runtime dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Layout
//!
//! Each collaborator of the reasoning loop is a trait here, implemented in
//! its own crate:
//! - [`Provider`]: the model-calling collaborator (`cinder-providers`)
//! - [`SessionStore`]: bounded per-session history (`cinder-memory`)
//! - [`Tool`] / [`ToolRegistry`]: invocable capabilities (`cinder-tools`)
//! - [`WorkspaceContext`]: system prompt and installed skills
//! - [`MessageHandler`]: the "process one inbound message" entry point
//!   (`cinder-agent`), driven by channels, cron jobs, and the heartbeat

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod session;
pub mod handler;
pub mod workspace;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ProviderError, Result, ToolError, ValidationError};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{FnTool, Tool, ToolCall, ToolContext, ToolOutcome, ToolRegistry};
pub use session::{MAX_HISTORY, SessionStore};
pub use handler::{InboundMessage, MessageHandler};
pub use workspace::{FileWorkspace, Skill, WorkspaceContext};
