//! Chat completion client for Groq's OpenAI-compatible API.
//!
//! `POST {base_url}/chat/completions` with a bearer `GROQ_API_KEY`. Any
//! OpenAI-compatible endpoint works by pointing `[generation].base_url`
//! at it.

use anyhow::Result;
use async_trait::async_trait;

use marks_rag_core::generation::{GenerationRequest, Generator};

use crate::config::GenerationConfig;
use crate::http;

pub struct GroqClient {
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl GroqClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: http::secret("GROQ_API_KEY")?,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

fn request_body(request: &GenerationRequest) -> serde_json::Value {
    serde_json::json!({
        "model": request.model,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.user_prompt},
        ],
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}

#[async_trait]
impl Generator for GroqClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let body = request_body(request);
        let json = http::post_json("Groq API", self.max_retries, || {
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        parse_completion(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = request_body(&GenerationRequest {
            system_prompt: "be a tutor".into(),
            user_prompt: "what is cohesion?".into(),
            model: "llama-3.1-8b-instant".into(),
            temperature: 0.3,
            max_tokens: 750,
        });
        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "what is cohesion?");
        assert_eq!(body["max_tokens"], 750);
    }

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "  Cohesion is...\n"}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Cohesion is...");
    }

    #[test]
    fn test_parse_completion_missing_content() {
        assert!(parse_completion(&serde_json::json!({"choices": []})).is_err());
    }
}
