//! Generation backend abstraction.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A single chat completion call: one system message, one user message.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Black-box chat completion backend.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;
}
