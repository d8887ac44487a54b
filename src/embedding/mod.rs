//! Embedding backends and the loader that builds them from catalog entries.
//!
//! - **[`OpenAIEmbedder`]** calls `POST {openai_url}/embeddings`. Requires `OPENAI_API_KEY`.
//! - **[`OllamaEmbedder`]** calls `POST {ollama_url}/api/embed` on a local Ollama instance.
//! - **`LocalEmbedder`** runs the model in-process via fastembed (feature
//!   `local-embeddings`); weights are downloaded on first load and cached.
//!
//! [`BackendLoader`] dispatches on [`EmbeddingBackend`] and embeds a short
//! warm-up text after construction, so a model that cannot actually
//! produce vectors of its catalog dimension fails at load time rather
//! than on the first user query.

pub mod cache;

pub use cache::ModelCache;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use marks_rag_core::catalog::{EmbeddingBackend, EmbeddingModelDescriptor};
use marks_rag_core::embedding::{Embedder, EmbeddingLoader};
use marks_rag_core::error::RagError;

use crate::config::EmbeddingConfig;
use crate::http;

const WARMUP_TEXT: &str = "software engineering";

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(model: &EmbeddingModelDescriptor, config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: model.backend_model().to_string(),
            dims: model.dimension,
            url: config.openai_url.trim_end_matches('/').to_string(),
            api_key: http::secret("OPENAI_API_KEY")?,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = http::post_json("OpenAI API", self.max_retries, || {
            self.client
                .post(format!("{}/embeddings", self.url))
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        first_vector(parse_openai_response(&json)?)
    }
}

/// Extract `data[].embedding` arrays in order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            item.get("embedding")
                .and_then(|e| e.as_array())
                .map(|values| to_f32(values))
                .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))
        })
        .collect()
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    model: String,
    identifier: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(model: &EmbeddingModelDescriptor, config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: model.backend_model().to_string(),
            identifier: model.identifier.to_string(),
            dims: model.dimension,
            url: config.ollama_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.identifier
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = http::post_json("Ollama API", self.max_retries, || {
            self.client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
        })
        .await
        .map_err(|e| anyhow::anyhow!("{} (is Ollama running at {}?)", e, self.url))?;
        first_vector(parse_ollama_response(&json)?)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32(values))
                .ok_or_else(|| {
                    anyhow::anyhow!("Invalid Ollama response: embedding is not an array")
                })
        })
        .collect()
}

fn to_f32(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

fn first_vector(vectors: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use std::sync::{Mutex, PoisonError};

    /// In-process model. fastembed inference needs `&mut`, so calls
    /// serialize on the inner mutex and run on the blocking pool.
    pub struct LocalEmbedder {
        identifier: String,
        dims: usize,
        model: Arc<Mutex<fastembed::TextEmbedding>>,
    }

    impl LocalEmbedder {
        /// Download (if needed) and initialize the model weights.
        pub async fn load(descriptor: &EmbeddingModelDescriptor) -> Result<Self> {
            let variant = fastembed_model(descriptor.identifier)?;
            let model = tokio::task::spawn_blocking(move || {
                fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(variant).with_show_download_progress(true),
                )
                .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))
            })
            .await??;

            Ok(Self {
                identifier: descriptor.identifier.to_string(),
                dims: descriptor.dimension,
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.identifier
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let model = self.model.clone();
            let texts = vec![text.to_string()];
            let embeddings = tokio::task::spawn_blocking(move || {
                let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
                model
                    .embed(texts, None)
                    .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
            })
            .await??;
            first_vector(embeddings)
        }
    }

    fn fastembed_model(identifier: &str) -> Result<fastembed::EmbeddingModel> {
        use fastembed::EmbeddingModel as M;
        Ok(match identifier {
            "all-minilm-l12-v2" => M::AllMiniLML12V2,
            "all-minilm-l6-v2" => M::AllMiniLML6V2,
            "bge-small-en-v1.5" => M::BGESmallENV15,
            "paraphrase-multilingual-minilm-l12-v2" => M::ParaphraseMLMiniLML12V2,
            "multilingual-e5-small" => M::MultilingualE5Small,
            "bge-base-en-v1.5" => M::BGEBaseENV15,
            "nomic-embed-text-v1.5" => M::NomicEmbedTextV15,
            "nomic-embed-text-v1" => M::NomicEmbedTextV1,
            "paraphrase-multilingual-mpnet-base-v2" => M::ParaphraseMLMpnetBaseV2,
            "gte-base-en-v1.5" => M::GTEBaseENV15,
            "multilingual-e5-base" => M::MultilingualE5Base,
            "bge-large-en-v1.5" => M::BGELargeENV15,
            "mxbai-embed-large-v1" => M::MxbaiEmbedLargeV1,
            "multilingual-e5-large" => M::MultilingualE5Large,
            "gte-large-en-v1.5" => M::GTELargeENV15,
            other => bail!("No local weights available for '{}'", other),
        })
    }
}

// ============ Loader ============

/// Builds embedders for catalog entries using the configured endpoints.
pub struct BackendLoader {
    config: EmbeddingConfig,
}

impl BackendLoader {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    async fn construct(&self, model: &EmbeddingModelDescriptor) -> Result<Arc<dyn Embedder>> {
        let embedder: Arc<dyn Embedder> = match model.backend {
            EmbeddingBackend::OpenAI => Arc::new(OpenAIEmbedder::new(model, &self.config)?),
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(model, &self.config)?),
            #[cfg(feature = "local-embeddings")]
            EmbeddingBackend::Local => Arc::new(LocalEmbedder::load(model).await?),
            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingBackend::Local => {
                bail!("Local embedding models require the `local-embeddings` feature")
            }
        };
        Ok(embedder)
    }
}

#[async_trait]
impl EmbeddingLoader for BackendLoader {
    async fn load(&self, model: &EmbeddingModelDescriptor) -> Result<Arc<dyn Embedder>> {
        let load_err = |reason: String| RagError::ModelLoad {
            model: model.identifier.to_string(),
            reason,
        };

        let embedder = self
            .construct(model)
            .await
            .map_err(|e| load_err(e.to_string()))?;

        let probe = embedder
            .embed(WARMUP_TEXT)
            .await
            .map_err(|e| load_err(e.to_string()))?;
        check_dimension(model, probe.len()).map_err(|e| load_err(e.to_string()))?;

        tracing::info!(
            model = model.identifier,
            dimension = model.dimension,
            "embedding model loaded"
        );
        Ok(embedder)
    }
}

fn check_dimension(model: &EmbeddingModelDescriptor, produced: usize) -> Result<()> {
    if produced != model.dimension {
        bail!(
            "produced {}-dimensional vectors, expected {}",
            produced,
            model.dimension
        );
    }
    Ok(())
}
