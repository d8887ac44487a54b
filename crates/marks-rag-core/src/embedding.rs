//! Embedding traits and vector utilities.
//!
//! Defines the [`Embedder`] trait that every loaded embedding model
//! implements and the [`EmbeddingLoader`] trait that turns a catalog
//! entry into an [`Embedder`]. Concrete backends (fastembed, OpenAI,
//! Ollama) and the model cache live in the `marks-rag` app crate.
//!
//! Also provides [`HashEmbedder`], a deterministic feature-hashing
//! embedder with no model weights. It is useful for offline runs and
//! exercises the pipeline end to end without network access.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::EmbeddingModelDescriptor;

/// A loaded embedding model: `text -> fixed-length vector`.
///
/// Implementations must be deterministic per model and always return
/// vectors of [`dims`](Embedder::dims) length.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-base-en-v1.5"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Loads an [`Embedder`] for a catalog entry.
///
/// Loading may be expensive (weight downloads, credential checks), so
/// callers are expected to cache the result by identifier.
#[async_trait]
pub trait EmbeddingLoader: Send + Sync {
    async fn load(&self, model: &EmbeddingModelDescriptor) -> Result<Arc<dyn Embedder>>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Number of buckets each token is spread over.
const HASH_FANOUT: u64 = 8;

/// Deterministic bag-of-words embedder based on feature hashing.
///
/// Each lowercase alphanumeric token contributes `±1` to a handful of
/// buckets chosen by FNV-1a over `(seed, token, slot)`; the sum is
/// L2-normalised. Two embedders with the same seed agree exactly, so
/// texts sharing vocabulary land close together. Different seeds give
/// unrelated vector spaces.
pub struct HashEmbedder {
    name: String,
    dims: usize,
    seed: u64,
}

impl HashEmbedder {
    pub fn new(name: impl Into<String>, dims: usize, seed: u64) -> Self {
        Self {
            name: name.into(),
            dims,
            seed,
        }
    }

    /// Synchronous form of [`Embedder::embed`].
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        if self.dims == 0 {
            return vec;
        }

        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            for slot in 0..HASH_FANOUT {
                let h = fnv1a(self.seed, token.as_bytes(), slot);
                let bucket = (h % self.dims as u64) as usize;
                let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
                vec[bucket] += sign;
            }
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

fn fnv1a(seed: u64, bytes: &[u8], slot: u64) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = OFFSET;
    for b in seed
        .to_le_bytes()
        .iter()
        .chain(bytes)
        .chain(slot.to_le_bytes().iter())
    {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    // Final avalanche so the sign bit is well mixed.
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51_afd7_ed55_8ccd);
    hash ^= hash >> 33;
    hash
}
