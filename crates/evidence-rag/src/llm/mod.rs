//! LLM Module - the completion seam used for evidence-model extraction,
//! answer drafting and gate-driven repairs.
//!
//! The engine never talks to a model directly; callers inject a
//! [`CompletionProvider`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A chat message with role and content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Generation parameters passed through to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerationParams {
    /// Low-temperature settings for structured JSON extraction.
    pub fn extraction() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1536,
            temperature: 0.2,
        }
    }
}

/// Core trait for completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a chat conversation and return the assistant text.
    async fn complete(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String>;
}

/// Call `provider` with a deadline. Timeouts become errors like any other
/// provider failure.
pub async fn complete_with_timeout(
    provider: &dyn CompletionProvider,
    messages: &[ChatMessage],
    params: &GenerationParams,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, provider.complete(messages, params)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "completion timed out after {}ms",
            timeout.as_millis()
        )),
    }
}
