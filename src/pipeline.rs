//! Query orchestration: retrieval, synthesis, and statistics.
//!
//! A [`Pipeline`] owns everything a question needs: the index handle, the
//! discovered index dimension, the active embedding model, the generation
//! backend, and the process-wide statistics. It is built once at startup by
//! [`Pipeline::initialize`] and shared behind an `Arc` by the CLI and the
//! HTTP server.
//!
//! # Answering
//!
//! [`Pipeline::answer`] never fails. Blank questions, empty retrievals,
//! and backend errors all come back as a [`QueryResult`] with
//! `success == false` and the reason in `answer` and `error`.
//!
//! 1. Blank question → rejected without touching any backend.
//! 2. Retrieve with the caller's `min_score`; if nothing survives, retrieve
//!    again with no score filter.
//! 3. Still nothing → an explanatory answer naming the likely causes.
//! 4. Otherwise synthesize an answer and cite the retrieved sources.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use marks_rag_core::catalog::{self, EmbeddingBackend, EmbeddingModelDescriptor};
use marks_rag_core::embedding::{Embedder, EmbeddingLoader};
use marks_rag_core::error::RagError;
use marks_rag_core::generation::Generator;
use marks_rag_core::index::{discover_dimension, DimensionDiscovery, DimensionSource, VectorIndex};
use marks_rag_core::models::{QueryResult, RetrievedDocument, SourceRef};
use marks_rag_core::stats::{QueryStatistics, StatsTracker};

use crate::config::{Config, EmbeddingMode};
use crate::embedding::{BackendLoader, ModelCache};
use crate::groq::GroqClient;
use crate::pinecone::PineconeIndex;
use crate::retrieval::{retrieve, RetrievalOptions};
use crate::selector::{ModelSelector, SelectionSettings};
use crate::synthesize::Synthesizer;

/// How the startup embedding model is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelMode {
    /// Benchmark compatible models and keep the best.
    Auto,
    /// Default model for the index dimension, no benchmarking.
    Default,
    /// A named catalog model. Falls back to [`ModelMode::Auto`] if it
    /// cannot be loaded.
    Forced(String),
}

impl ModelMode {
    pub fn from_config(config: &Config) -> Self {
        match (config.embedding.mode, &config.embedding.model) {
            (EmbeddingMode::Forced, Some(model)) => ModelMode::Forced(model.clone()),
            (EmbeddingMode::Default, _) => ModelMode::Default,
            _ => ModelMode::Auto,
        }
    }
}

/// External collaborators a pipeline is assembled from.
pub struct PipelineParts {
    pub index: Arc<dyn VectorIndex>,
    pub loader: Arc<dyn EmbeddingLoader>,
    pub generator: Arc<dyn Generator>,
}

/// Per-question knobs.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueryOptions {
    #[serde(default = "default_marks")]
    pub marks: u32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub min_score: f32,
}

fn default_marks() -> u32 {
    5
}
fn default_top_k() -> usize {
    5
}
fn default_temperature() -> f32 {
    0.3
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            marks: default_marks(),
            top_k: default_top_k(),
            temperature: default_temperature(),
            min_score: 0.0,
        }
    }
}

/// The embedding model currently used for retrieval.
pub struct ActiveModel {
    pub descriptor: EmbeddingModelDescriptor,
    pub embedder: Arc<dyn Embedder>,
}

pub struct Pipeline {
    index: Arc<dyn VectorIndex>,
    dimension: DimensionDiscovery,
    selector: ModelSelector,
    active: RwLock<Arc<ActiveModel>>,
    synthesizer: Synthesizer,
    retrieval: RetrievalOptions,
    stats: StatsTracker,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub dimension: usize,
    pub dimension_source: DimensionSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingInfo {
    pub current: String,
    pub backend: EmbeddingBackend,
    pub dimension: usize,
    pub performance_scores: BTreeMap<String, f32>,
    pub model_cache_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    #[serde(flatten)]
    pub counters: QueryStatistics,
    /// Percentage, absent before the first query.
    pub success_rate: Option<f64>,
}

/// Which components are up.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SystemStatus {
    /// False when the dimension fell back to the default because the
    /// index could neither be described nor probed.
    pub index_connected: bool,
    pub generation_configured: bool,
    pub embedding_model_loaded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub index_info: IndexInfo,
    pub embedding_model: EmbeddingInfo,
    pub generation_model: String,
    pub query_statistics: StatisticsReport,
    pub system_status: SystemStatus,
}

impl Pipeline {
    /// Connect to the configured index and backends, then initialize.
    ///
    /// Missing API keys fail here with [`RagError::Configuration`].
    pub async fn from_config(config: &Config) -> Result<Self> {
        let index = Arc::new(PineconeIndex::connect(&config.index).await?);
        let generator = Arc::new(GroqClient::new(&config.generation)?);
        let loader = Arc::new(BackendLoader::new(config.embedding.clone()));
        let parts = PipelineParts {
            index,
            loader,
            generator,
        };
        Self::initialize(parts, config, ModelMode::from_config(config)).await
    }

    /// Discover the index dimension and bring up the startup model.
    pub async fn initialize(parts: PipelineParts, config: &Config, mode: ModelMode) -> Result<Self> {
        let dimension = match config.index.dimension {
            Some(dimension) => DimensionDiscovery {
                dimension,
                source: DimensionSource::Configured,
            },
            None => discover_dimension(parts.index.as_ref()).await,
        };
        tracing::info!(
            index = parts.index.name(),
            dimension = dimension.dimension,
            source = ?dimension.source,
            "index dimension"
        );

        let cache = Arc::new(ModelCache::new(parts.loader));
        let selector = ModelSelector::new(
            cache.clone(),
            parts.index.clone(),
            SelectionSettings::from(&config.selection),
        );

        let active = Self::startup_model(&selector, &cache, dimension.dimension, &mode).await?;
        tracing::info!(model = active.descriptor.identifier, "active embedding model");

        Ok(Self {
            index: parts.index,
            dimension,
            selector,
            active: RwLock::new(Arc::new(active)),
            synthesizer: Synthesizer::new(parts.generator, &config.generation),
            retrieval: RetrievalOptions::from(&config.retrieval),
            stats: StatsTracker::new(),
        })
    }

    async fn startup_model(
        selector: &ModelSelector,
        cache: &ModelCache,
        dimension: usize,
        mode: &ModelMode,
    ) -> Result<ActiveModel> {
        if let ModelMode::Forced(identifier) = mode {
            match load_named(cache, identifier).await {
                Ok(active) => {
                    if active.descriptor.dimension != dimension {
                        tracing::warn!(
                            model = active.descriptor.identifier,
                            model_dimension = active.descriptor.dimension,
                            index_dimension = dimension,
                            "forced model does not match index dimension"
                        );
                    }
                    return Ok(active);
                }
                Err(e) => {
                    tracing::error!(model = %identifier, error = %e, "failed to load forced model, falling back to auto-detection");
                }
            }
        }

        let descriptor = match mode {
            ModelMode::Default => catalog::default_for_dimension(dimension),
            _ => selector.select(dimension).await,
        };
        let embedder = cache.get_or_load(&descriptor).await?;
        Ok(ActiveModel {
            descriptor,
            embedder,
        })
    }

    pub fn active(&self) -> Arc<ActiveModel> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn dimension(&self) -> DimensionDiscovery {
        self.dimension
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    pub fn retrieval_options(&self) -> RetrievalOptions {
        self.retrieval
    }

    pub fn statistics(&self) -> QueryStatistics {
        self.stats.snapshot()
    }

    /// Answer `query`. Never returns an error; see the module docs.
    pub async fn answer(&self, query: &str, options: &QueryOptions) -> QueryResult {
        let started = Instant::now();
        let active = self.active();
        let trimmed = query.trim();

        let mut result = QueryResult {
            answer: String::new(),
            sources: Vec::new(),
            marks: options.marks,
            query: query.to_string(),
            relevance_score: 0.0,
            best_match_id: None,
            total_sources: 0,
            active_model: active.descriptor.identifier.to_string(),
            index_dimension: self.dimension.dimension,
            query_time: 0.0,
            success: false,
            error: None,
        };

        if trimmed.is_empty() {
            self.stats.record_failure();
            result.answer = "Please provide a valid question.".to_string();
            result.error = Some("Empty query".to_string());
            return result;
        }

        tracing::info!(query = trimmed, marks = options.marks, model = active.descriptor.identifier, "processing query");

        match self.retrieve_with_fallback(&active, trimmed, options).await {
            Ok(documents) if documents.is_empty() => {
                self.stats.record_failure();
                result.answer = self.no_documents_answer(trimmed, &active);
                result.error = Some("No relevant documents found".to_string());
            }
            Ok(documents) => {
                match self
                    .synthesizer
                    .synthesize(trimmed, &documents, options.marks, options.temperature)
                    .await
                {
                    Ok(answer) => {
                        let elapsed = started.elapsed().as_secs_f64();
                        self.stats.record_success(elapsed);
                        fill_sources(&mut result, &documents);
                        result.answer = answer;
                        result.success = true;
                    }
                    Err(e) => self.fail(&mut result, e.into()),
                }
            }
            Err(e) => self.fail(&mut result, e),
        }

        result.query_time = started.elapsed().as_secs_f64();
        result
    }

    async fn retrieve_with_fallback(
        &self,
        active: &ActiveModel,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Vec<RetrievedDocument>> {
        let mut retrieval = RetrievalOptions {
            top_k: options.top_k,
            min_score: options.min_score,
            max_retries: self.retrieval.max_retries,
        };
        let documents = retrieve(active.embedder.as_ref(), self.index.as_ref(), query, retrieval).await?;
        if !documents.is_empty() {
            return Ok(documents);
        }

        tracing::info!("no documents at initial threshold, retrying without one");
        retrieval.min_score = 0.0;
        retrieve(active.embedder.as_ref(), self.index.as_ref(), query, retrieval).await
    }

    fn fail(&self, result: &mut QueryResult, error: anyhow::Error) {
        tracing::error!(error = %error, "query failed");
        self.stats.record_failure();
        result.answer = format!(
            "System Error: An error occurred while processing your query: {}\n\n\
             Please try again or contact support if the issue persists.",
            error
        );
        result.error = Some(error.to_string());
    }

    fn no_documents_answer(&self, query: &str, active: &ActiveModel) -> String {
        let model = active.descriptor.identifier;
        format!(
            "No relevant documents found for your query: \"{query}\"

Possible Issues:
1. Embedding Model Mismatch: Current model ({model}) may not match the indexing model
2. Content Gap: The specific topic might not be in the knowledge base
3. Query Specificity: Try using more general or alternative terms

Suggestions:
- Rephrase with broader terminology
- Use synonyms or related concepts
- Check if the content exists in your document collection

System Information:
- Index: {index}
- Dimension: {dimension}
- Current Model: {model}",
            index = self.index.name(),
            dimension = self.dimension.dimension,
        )
    }

    /// Load `identifier`, optionally benchmark it, then make it active.
    ///
    /// The active model is replaced only after the new one has loaded, so
    /// concurrent queries see either the old model or the new one.
    pub async fn switch_model(
        &self,
        identifier: &str,
        test_performance: bool,
    ) -> Result<EmbeddingModelDescriptor> {
        tracing::info!(model = identifier, "switching embedding model");
        let active = load_named(self.selector.cache(), identifier).await?;

        if active.descriptor.dimension != self.dimension.dimension {
            tracing::warn!(
                model = identifier,
                model_dimension = active.descriptor.dimension,
                index_dimension = self.dimension.dimension,
                "model does not match index dimension"
            );
        }

        if test_performance {
            let score = self.selector.quick_score(&active.descriptor).await;
            tracing::info!(model = identifier, score, "new model performance");
        }

        let descriptor = active.descriptor;
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(active);
        tracing::info!(model = identifier, "switched embedding model");
        Ok(descriptor)
    }

    pub fn system_stats(&self) -> SystemStats {
        let active = self.active();
        let counters = self.stats.snapshot();
        SystemStats {
            index_info: IndexInfo {
                name: self.index.name().to_string(),
                dimension: self.dimension.dimension,
                dimension_source: self.dimension.source,
            },
            embedding_model: EmbeddingInfo {
                current: active.descriptor.identifier.to_string(),
                backend: active.descriptor.backend,
                dimension: active.descriptor.dimension,
                performance_scores: self.selector.scores(),
                model_cache_size: self.selector.cache().len(),
            },
            generation_model: self.synthesizer.model().to_string(),
            query_statistics: StatisticsReport {
                counters,
                success_rate: counters.success_rate(),
            },
            system_status: SystemStatus {
                index_connected: self.dimension.source != DimensionSource::Default,
                generation_configured: !self.synthesizer.model().is_empty(),
                embedding_model_loaded: self.selector.cache().contains(active.descriptor.identifier),
            },
        }
    }
}

async fn load_named(cache: &ModelCache, identifier: &str) -> Result<ActiveModel> {
    let descriptor = catalog::find(identifier).ok_or_else(|| RagError::ModelLoad {
        model: identifier.to_string(),
        reason: "not in the model catalog".to_string(),
    })?;
    let embedder = cache.get_or_load(&descriptor).await?;
    Ok(ActiveModel {
        descriptor,
        embedder,
    })
}

fn fill_sources(result: &mut QueryResult, documents: &[RetrievedDocument]) {
    result.sources = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| SourceRef::from_document(i + 1, doc))
        .collect();
    result.total_sources = documents.len();
    if let Some(best) = documents.first() {
        result.relevance_score = best.score;
        result.best_match_id = Some(best.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marks_rag_core::index::memory::InMemoryIndex;
    use marks_rag_core::index::QueryResponse;
    use marks_rag_core::testing::{HashLoader, ScriptedGenerator};

    struct UnreachableIndex;

    #[async_trait]
    impl VectorIndex for UnreachableIndex {
        fn name(&self) -> &str {
            "offline"
        }
        async fn query(&self, _: &[f32], _: usize, _: bool) -> Result<QueryResponse> {
            anyhow::bail!("connection refused")
        }
        async fn describe_index_stats(&self) -> Result<serde_json::Value> {
            anyhow::bail!("connection refused")
        }
        async fn describe_dimension(&self) -> Result<Option<usize>> {
            anyhow::bail!("connection refused")
        }
    }

    fn parts(index: InMemoryIndex, loader: HashLoader) -> PipelineParts {
        PipelineParts {
            index: Arc::new(index),
            loader: Arc::new(loader),
            generator: Arc::new(ScriptedGenerator::answering("answer")),
        }
    }

    #[test]
    fn test_mode_from_config() {
        let mut config = Config::default();
        assert_eq!(ModelMode::from_config(&config), ModelMode::Auto);
        config.embedding.mode = EmbeddingMode::Default;
        assert_eq!(ModelMode::from_config(&config), ModelMode::Default);
        config.embedding.mode = EmbeddingMode::Forced;
        config.embedding.model = Some("bge-small-en-v1.5".into());
        assert_eq!(
            ModelMode::from_config(&config),
            ModelMode::Forced("bge-small-en-v1.5".into())
        );
    }

    #[test]
    fn test_query_options_defaults_from_json() {
        let opts: QueryOptions = serde_json::from_str(r#"{"marks": 8}"#).unwrap();
        assert_eq!(opts.marks, 8);
        assert_eq!(opts.top_k, 5);
        assert!((opts.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(opts.min_score, 0.0);
    }

    #[tokio::test]
    async fn test_default_mode_skips_benchmark() {
        let loader = HashLoader::new();
        let pipeline = Pipeline::initialize(
            parts(InMemoryIndex::new("notes", 384), loader),
            &Config::default(),
            ModelMode::Default,
        )
        .await
        .unwrap();
        assert_eq!(pipeline.active().descriptor.identifier, "all-minilm-l12-v2");
        assert!(pipeline.selector().scores().is_empty());
        assert_eq!(pipeline.dimension().source, DimensionSource::Described);
    }

    #[tokio::test]
    async fn test_forced_model_failure_falls_back_to_auto() {
        let pipeline = Pipeline::initialize(
            parts(
                InMemoryIndex::new("notes", 1024),
                HashLoader::new().failing("mxbai-embed-large-v1"),
            ),
            &Config::default(),
            ModelMode::Forced("mxbai-embed-large-v1".into()),
        )
        .await
        .unwrap();
        // Empty index: every candidate scores zero, so auto lands on the default.
        assert_eq!(pipeline.active().descriptor.identifier, "bge-large-en-v1.5");
    }

    #[tokio::test]
    async fn test_configured_dimension_skips_discovery() {
        let mut config = Config::default();
        config.index.dimension = Some(384);
        let pipeline = Pipeline::initialize(
            parts(InMemoryIndex::new("notes", 384).with_hidden_dimension(), HashLoader::new()),
            &config,
            ModelMode::Default,
        )
        .await
        .unwrap();
        assert_eq!(pipeline.dimension().source, DimensionSource::Configured);
    }

    #[tokio::test]
    async fn test_switch_model_swaps_after_load() {
        let pipeline = Pipeline::initialize(
            parts(
                InMemoryIndex::new("notes", 768),
                HashLoader::new().failing("gte-base-en-v1.5"),
            ),
            &Config::default(),
            ModelMode::Default,
        )
        .await
        .unwrap();
        assert_eq!(pipeline.active().descriptor.identifier, "bge-base-en-v1.5");

        assert!(pipeline.switch_model("gte-base-en-v1.5", false).await.is_err());
        assert!(pipeline.switch_model("no-such-model", false).await.is_err());
        assert_eq!(pipeline.active().descriptor.identifier, "bge-base-en-v1.5");

        let switched = pipeline
            .switch_model("nomic-embed-text-v1.5", true)
            .await
            .unwrap();
        assert_eq!(switched.identifier, "nomic-embed-text-v1.5");
        assert_eq!(pipeline.active().descriptor.identifier, "nomic-embed-text-v1.5");
        assert!(pipeline
            .selector()
            .scores()
            .contains_key("nomic-embed-text-v1.5"));
    }

    #[tokio::test]
    async fn test_system_stats_shape() {
        let pipeline = Pipeline::initialize(
            parts(InMemoryIndex::new("notes", 768), HashLoader::new()),
            &Config::default(),
            ModelMode::Default,
        )
        .await
        .unwrap();
        pipeline.answer("", &QueryOptions::default()).await;

        let stats = serde_json::to_value(pipeline.system_stats()).unwrap();
        assert_eq!(stats["index_info"]["name"], "notes");
        assert_eq!(stats["index_info"]["dimension"], 768);
        assert_eq!(stats["index_info"]["dimension_source"], "described");
        assert_eq!(stats["embedding_model"]["current"], "bge-base-en-v1.5");
        assert_eq!(stats["embedding_model"]["model_cache_size"], 1);
        assert_eq!(stats["query_statistics"]["total_queries"], 1);
        assert_eq!(stats["query_statistics"]["failed_queries"], 1);
        assert_eq!(stats["query_statistics"]["success_rate"], 0.0);
        assert_eq!(stats["system_status"]["index_connected"], true);
        assert_eq!(stats["system_status"]["generation_configured"], true);
        assert_eq!(stats["system_status"]["embedding_model_loaded"], true);
    }

    #[tokio::test]
    async fn test_system_status_reports_unreachable_index() {
        let parts = PipelineParts {
            index: Arc::new(UnreachableIndex),
            loader: Arc::new(HashLoader::new()),
            generator: Arc::new(ScriptedGenerator::answering("answer")),
        };
        let pipeline = Pipeline::initialize(parts, &Config::default(), ModelMode::Default)
            .await
            .unwrap();

        let stats = pipeline.system_stats();
        assert_eq!(stats.index_info.dimension_source, DimensionSource::Default);
        assert!(!stats.system_status.index_connected);
        assert!(stats.system_status.generation_configured);
        assert!(stats.system_status.embedding_model_loaded);
    }
}
