//! Query embedding and index search with bounded retries.

use std::time::Duration;

use anyhow::Result;

use marks_rag_core::embedding::Embedder;
use marks_rag_core::error::RagError;
use marks_rag_core::extract::collect_documents;
use marks_rag_core::index::VectorIndex;
use marks_rag_core::models::RetrievedDocument;

use crate::config::RetrievalConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub top_k: usize,
    /// Matches scoring below this are dropped. `0.0` keeps everything.
    pub min_score: f32,
    /// Total attempts before giving up.
    pub max_retries: u32,
}

impl From<&RetrievalConfig> for RetrievalOptions {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
            max_retries: config.max_retries,
        }
    }
}

/// Pause before retry `attempt + 1`: 0.5s, 1.0s, 1.5s, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * u64::from(attempt + 1))
}

/// Embed `query`, search the index and return the documents that carry text.
///
/// A blank query is rejected with [`RagError::Validation`] before anything
/// is embedded. Embedding or search failures are retried with a linear
/// backoff; once attempts run out the last failure is reported as
/// [`RagError::Retrieval`]. An empty result is a success.
pub async fn retrieve(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    query: &str,
    options: RetrievalOptions,
) -> Result<Vec<RetrievedDocument>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(RagError::Validation("query must not be empty".to_string()).into());
    }

    let attempts = options.max_retries.max(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(backoff(attempt - 1)).await;
        }

        let result = async {
            let vector = embedder.embed(query).await?;
            index.query(&vector, options.top_k, true).await
        }
        .await;

        match result {
            Ok(response) => {
                let documents = collect_documents(response.matches, options.min_score);
                tracing::debug!(
                    attempt = attempt + 1,
                    documents = documents.len(),
                    min_score = options.min_score,
                    "retrieval complete"
                );
                return Ok(documents);
            }
            Err(e) => {
                tracing::warn!(attempt = attempt + 1, error = %e, "retrieval attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(RagError::Retrieval {
        attempts,
        reason: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string()),
    }
    .into())
}
