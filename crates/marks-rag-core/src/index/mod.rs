//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only view the pipeline has of the
//! nearest-neighbour service: a top-k query with metadata, a stats call,
//! and an optional way of reporting the index dimension. The Pinecone
//! client in the app crate and [`memory::InMemoryIndex`] implement it.
//!
//! # Dimension Discovery
//!
//! [`discover_dimension`] resolves the index dimension in three tiers and
//! reports which tier answered:
//!
//! 1. [`DimensionSource::Described`]: the index reports it.
//! 2. [`DimensionSource::Probed`]: a dummy query at each of
//!    [`PROBE_DIMENSIONS`] is issued; the first accepted size wins.
//! 3. [`DimensionSource::Default`]: [`DEFAULT_DIMENSION`].

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Dimensions tried, in order, when the index does not describe itself.
pub const PROBE_DIMENSIONS: [usize; 5] = [384, 768, 1024, 1536, 3072];

/// Dimension assumed when discovery fails entirely.
pub const DEFAULT_DIMENSION: usize = 768;

/// Component value of the dummy vectors used for probing.
const PROBE_VALUE: f32 = 0.1;

/// Metadata attached to a stored vector.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One nearest-neighbour hit, in the shape the index returns it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Response of a top-k query. Matches are in the index's rank order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<IndexMatch>,
}

/// Nearest-neighbour search over stored vectors with attached metadata.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Index name, used in diagnostics and user-facing hints.
    fn name(&self) -> &str;

    /// Top-k search. Errors when the vector's length does not match the
    /// index dimension or the backend is unreachable.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<QueryResponse>;

    /// Backend-specific statistics (vector counts, namespaces, ...).
    async fn describe_index_stats(&self) -> Result<serde_json::Value>;

    /// The index dimension, when the backend can report it.
    async fn describe_dimension(&self) -> Result<Option<usize>> {
        Ok(None)
    }
}

/// Which tier of [`discover_dimension`] produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionSource {
    /// Set explicitly by the caller; no discovery ran.
    Configured,
    Described,
    Probed,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionDiscovery {
    pub dimension: usize,
    pub source: DimensionSource,
}

/// Resolve the index dimension: reported → probed → default.
///
/// Never fails; backend errors only push discovery to the next tier.
pub async fn discover_dimension(index: &dyn VectorIndex) -> DimensionDiscovery {
    if let Ok(Some(dimension)) = index.describe_dimension().await {
        if dimension > 0 {
            return DimensionDiscovery {
                dimension,
                source: DimensionSource::Described,
            };
        }
    }

    for dimension in PROBE_DIMENSIONS {
        let dummy = vec![PROBE_VALUE; dimension];
        if index.query(&dummy, 1, false).await.is_ok() {
            return DimensionDiscovery {
                dimension,
                source: DimensionSource::Probed,
            };
        }
    }

    DimensionDiscovery {
        dimension: DEFAULT_DIMENSION,
        source: DimensionSource::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryIndex;
    use super::*;

    #[tokio::test]
    async fn test_discover_described() {
        let index = InMemoryIndex::new("docs", 1024);
        let d = discover_dimension(&index).await;
        assert_eq!(d.dimension, 1024);
        assert_eq!(d.source, DimensionSource::Described);
    }

    #[tokio::test]
    async fn test_discover_probed_when_hidden() {
        let index = InMemoryIndex::new("docs", 1536).with_hidden_dimension();
        let d = discover_dimension(&index).await;
        assert_eq!(d.dimension, 1536);
        assert_eq!(d.source, DimensionSource::Probed);
    }

    #[tokio::test]
    async fn test_discover_default_when_nothing_matches() {
        let index = InMemoryIndex::new("docs", 512).with_hidden_dimension();
        let d = discover_dimension(&index).await;
        assert_eq!(d.dimension, DEFAULT_DIMENSION);
        assert_eq!(d.source, DimensionSource::Default);
    }

    #[test]
    fn test_query_response_tolerates_missing_fields() {
        let json = r#"{"matches":[{"id":"a","score":0.5},{"id":"b","metadata":{"text":"x"}}],"namespace":""}"#;
        let resp: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.matches.len(), 2);
        assert!(resp.matches[0].metadata.is_empty());
        assert_eq!(resp.matches[1].score, 0.0);
    }
}
