//! In-memory [`VectorIndex`] for tests and offline runs.
//!
//! Vectors live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity; queries whose length differs from the
//! index dimension are rejected the way a hosted index rejects them.

use std::sync::{PoisonError, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{IndexMatch, Metadata, QueryResponse, VectorIndex};
use crate::embedding::cosine_similarity;

struct StoredVector {
    id: String,
    vector: Vec<f32>,
    metadata: Metadata,
}

pub struct InMemoryIndex {
    name: String,
    dimension: usize,
    report_dimension: bool,
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            report_dimension: true,
            vectors: RwLock::new(Vec::new()),
        }
    }

    /// Stop answering [`VectorIndex::describe_dimension`], forcing callers
    /// to probe.
    pub fn with_hidden_dimension(mut self) -> Self {
        self.report_dimension = false;
        self
    }

    /// Insert or replace a vector by id.
    pub fn upsert(&self, id: &str, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        if vector.len() != self.dimension {
            bail!(
                "Vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            );
        }
        let mut vectors = self.vectors.write().unwrap_or_else(PoisonError::into_inner);
        vectors.retain(|v| v.id != id);
        vectors.push(StoredVector {
            id: id.to_string(),
            vector,
            metadata,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<QueryResponse> {
        if vector.len() != self.dimension {
            bail!(
                "Vector dimension {} does not match the dimension of the index {}",
                vector.len(),
                self.dimension
            );
        }

        let vectors = self.vectors.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<IndexMatch> = vectors
            .iter()
            .map(|sv| IndexMatch {
                id: sv.id.clone(),
                score: cosine_similarity(vector, &sv.vector),
                metadata: if include_metadata {
                    sv.metadata.clone()
                } else {
                    Metadata::new()
                },
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(QueryResponse { matches })
    }

    async fn describe_index_stats(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "dimension": self.dimension,
            "total_vector_count": self.len(),
            "namespaces": {},
        }))
    }

    async fn describe_dimension(&self) -> Result<Option<usize>> {
        Ok(self.report_dimension.then_some(self.dimension))
    }
}
