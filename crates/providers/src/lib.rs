//! LLM provider implementations for Cinder.
//!
//! Providers implement the `cinder_core::Provider` trait. Any backend that
//! speaks the OpenAI chat-completions protocol (OpenAI, OpenRouter, Ollama,
//! vLLM, llama.cpp server) is reached through [`OpenAiCompatProvider`].

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use cinder_config::AppConfig;
use cinder_core::error::ProviderError;

/// Build the provider described by the loaded configuration.
pub fn from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    OpenAiCompatProvider::new(
        "openai",
        &config.api_url,
        config.api_key.clone().unwrap_or_else(|| "dummy".into()),
        std::time::Duration::from_secs(config.request_timeout_secs),
    )
}
