//! Pinecone vector index client.
//!
//! Talks to one serverless index over the REST API. The data-plane host is
//! taken from `[index].host` when set; otherwise it is resolved once at
//! connect time through the control plane (`GET {control_url}/indexes/{name}`),
//! which also reports the index dimension.
//!
//! Requires `PINECONE_API_KEY` in the environment.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use marks_rag_core::index::{QueryResponse, VectorIndex};

use crate::config::IndexConfig;
use crate::http;

const API_VERSION: &str = "2024-07";

/// Stats calls are retried this many times on 429/5xx.
const STATS_RETRIES: u32 = 2;

/// Queries are not retried here; retrieval and model benchmarking own
/// their retry policies.
const QUERY_RETRIES: u32 = 0;

pub struct PineconeIndex {
    name: String,
    host: String,
    api_key: String,
    described_dimension: Option<usize>,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

impl PineconeIndex {
    /// Open the index named in `config`.
    ///
    /// Fails with a configuration error when the API key is missing, and
    /// with a plain error when the control plane cannot describe the index.
    pub async fn connect(config: &IndexConfig) -> Result<Self> {
        let api_key = http::secret("PINECONE_API_KEY")?;
        let client = http::client(config.timeout_secs)?;

        let (host, described_dimension) = match &config.host {
            Some(host) => (host.clone(), None),
            None => {
                let url = format!(
                    "{}/indexes/{}",
                    config.control_url.trim_end_matches('/'),
                    config.name
                );
                let response = client
                    .get(&url)
                    .header("Api-Key", &api_key)
                    .header("X-Pinecone-API-Version", API_VERSION)
                    .send()
                    .await
                    .with_context(|| format!("Failed to reach Pinecone control plane at {}", url))?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    anyhow::bail!("Failed to describe index '{}': {} {}", config.name, status, body);
                }
                let json: serde_json::Value = response.json().await?;
                parse_description(&json)?
            }
        };

        tracing::info!(index = %config.name, host = %host, "connected to Pinecone index");

        let mut index = Self::with_host(&config.name, &host, api_key, client);
        index.described_dimension = described_dimension;
        Ok(index)
    }

    /// Index at a known data-plane `host`, skipping the control plane.
    pub fn with_host(name: &str, host: &str, api_key: String, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            host: normalize_host(host),
            api_key,
            described_dimension: None,
            client,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }
}

/// Host and dimension from a control-plane index description.
fn parse_description(json: &serde_json::Value) -> Result<(String, Option<usize>)> {
    let host = json
        .get("host")
        .and_then(|h| h.as_str())
        .ok_or_else(|| anyhow::anyhow!("Index description has no host"))?;
    let dimension = json
        .get("dimension")
        .and_then(|d| d.as_u64())
        .map(|d| d as usize);
    Ok((host.to_string(), dimension))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<QueryResponse> {
        let body = QueryBody {
            vector,
            top_k,
            include_metadata,
            include_values: false,
        };
        let json = http::post_json("Pinecone", QUERY_RETRIES, || self.post("/query").json(&body)).await?;
        serde_json::from_value(json).context("Invalid Pinecone query response")
    }

    async fn describe_index_stats(&self) -> Result<serde_json::Value> {
        http::post_json("Pinecone", STATS_RETRIES, || {
            self.post("/describe_index_stats").json(&serde_json::json!({}))
        })
        .await
    }

    async fn describe_dimension(&self) -> Result<Option<usize>> {
        if self.described_dimension.is_some() {
            return Ok(self.described_dimension);
        }
        let stats = self.describe_index_stats().await?;
        Ok(stats
            .get("dimension")
            .and_then(|d| d.as_u64())
            .map(|d| d as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::StatusCode, routing::post, Router};

    #[tokio::test]
    async fn test_query_failure_is_not_retried_by_client() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/query",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let index = PineconeIndex::with_host("notes", &format!("http://{}", addr), "key".into(), client);
        let err = index.query(&[0.1, 0.2], 3, true).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_description() {
        let json = serde_json::json!({
            "name": "acadmate-gemini",
            "dimension": 768,
            "metric": "cosine",
            "host": "acadmate-gemini-abc123.svc.aped-4627-b74a.pinecone.io"
        });
        let (host, dim) = parse_description(&json).unwrap();
        assert_eq!(host, "acadmate-gemini-abc123.svc.aped-4627-b74a.pinecone.io");
        assert_eq!(dim, Some(768));
    }

    #[test]
    fn test_parse_description_requires_host() {
        assert!(parse_description(&serde_json::json!({"dimension": 384})).is_err());
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("idx.pinecone.io"), "https://idx.pinecone.io");
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[test]
    fn test_query_body_is_camel_case() {
        let v = [0.1f32, 0.2];
        let body = serde_json::to_value(QueryBody {
            vector: &v,
            top_k: 5,
            include_metadata: true,
            include_values: false,
        })
        .unwrap();
        assert_eq!(body["topK"], 5);
        assert_eq!(body["includeMetadata"], true);
        assert_eq!(body["includeValues"], false);
    }

    #[test]
    fn test_query_response_shape() {
        let json = serde_json::json!({
            "matches": [
                {"id": "c1", "score": 0.82, "metadata": {"text": "Coupling is..."}},
                {"id": "c2", "score": 0.41}
            ],
            "namespace": ""
        });
        let parsed: QueryResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.matches.len(), 2);
        assert!(parsed.matches[1].metadata.is_empty());
    }
}
