//! Offline stand-ins for the embedding loader and the generation backend.
//!
//! [`HashLoader`] builds a [`HashEmbedder`] for any catalog entry. Each
//! identifier gets its own seed unless one is pinned with
//! [`HashLoader::seeded`], which lets a test decide which model "matches"
//! an index populated with that seed. [`ScriptedGenerator`] returns a
//! canned answer and records every request it receives.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::catalog::EmbeddingModelDescriptor;
use crate::embedding::{Embedder, EmbeddingLoader, HashEmbedder};
use crate::error::RagError;
use crate::generation::{GenerationRequest, Generator};

#[derive(Default)]
pub struct HashLoader {
    seeds: HashMap<String, u64>,
    failing: HashSet<String>,
    broken: HashSet<String>,
    loads: Mutex<HashMap<String, usize>>,
}

impl HashLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the seed used for `identifier`.
    pub fn seeded(mut self, identifier: &str, seed: u64) -> Self {
        self.seeds.insert(identifier.to_string(), seed);
        self
    }

    /// Loading `identifier` fails with a model-load error.
    pub fn failing(mut self, identifier: &str) -> Self {
        self.failing.insert(identifier.to_string());
        self
    }

    /// `identifier` loads, but every embed call errors.
    pub fn broken(mut self, identifier: &str) -> Self {
        self.broken.insert(identifier.to_string());
        self
    }

    /// Number of load attempts for `identifier`, successful or not.
    pub fn loads_of(&self, identifier: &str) -> usize {
        self.loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    /// Seed `identifier` would be embedded with.
    pub fn seed_for(&self, identifier: &str) -> u64 {
        self.seeds
            .get(identifier)
            .copied()
            .unwrap_or_else(|| default_seed(identifier))
    }
}

fn default_seed(identifier: &str) -> u64 {
    identifier
        .bytes()
        .fold(0x9e37_79b9_7f4a_7c15u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        })
}

#[async_trait]
impl EmbeddingLoader for HashLoader {
    async fn load(&self, model: &EmbeddingModelDescriptor) -> Result<Arc<dyn Embedder>> {
        *self
            .loads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(model.identifier.to_string())
            .or_insert(0) += 1;

        if self.failing.contains(model.identifier) {
            return Err(RagError::ModelLoad {
                model: model.identifier.to_string(),
                reason: "weights unavailable".to_string(),
            }
            .into());
        }
        if self.broken.contains(model.identifier) {
            return Ok(Arc::new(BrokenEmbedder {
                name: model.identifier.to_string(),
                dims: model.dimension,
            }));
        }
        Ok(Arc::new(HashEmbedder::new(
            model.identifier,
            model.dimension,
            self.seed_for(model.identifier),
        )))
    }
}

struct BrokenEmbedder {
    name: String,
    dims: usize,
}

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("{} cannot embed", self.name)
    }
}

/// Generator that answers every request with the same text, or fails.
pub struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            reply: Ok(answer.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err(message) => bail!("{}", message),
        }
    }
}
