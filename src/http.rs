//! Shared JSON-over-HTTP call with retry and backoff.
//!
//! Every remote backend (embedding APIs, the vector index, the chat model)
//! goes through [`post_json`] so they share one retry policy:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use reqwest::RequestBuilder;
use std::time::Duration;

/// Send the request built by `build` up to `max_retries + 1` times and
/// return the decoded JSON body of the first successful response.
///
/// `build` is called once per attempt since a [`RequestBuilder`] is
/// consumed by `send`. `label` names the backend in error messages.
pub async fn post_json<F>(label: &str, max_retries: u32, build: F) -> Result<serde_json::Value>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(backend = label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!("{} error {}: {}", label, status, body_text));
                    continue;
                }

                bail!("{} error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} connection error: {}", label, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", label)))
}

/// Client with the given request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read a required secret from the environment.
pub fn secret(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(marks_rag_core::error::RagError::Configuration(format!(
            "{} environment variable not set",
            var
        ))
        .into()),
    }
}
