//! Embedding model selection by live benchmarking.
//!
//! An index carries no record of which model produced its vectors, only
//! their dimension. [`ModelSelector::select`] narrows the catalog to that
//! dimension, benchmarks the candidates against the index with a fixed set
//! of probe queries, and keeps the one whose probes land closest to stored
//! vectors.
//!
//! # Scoring
//!
//! For each probe query the candidate embeds the text, runs a top-3 search
//! and keeps the best match score. The candidate's score is the mean of
//! those maxima over probes that returned at least one match. A probe that
//! errors is retried once after a short pause before it is counted as failed.
//!
//! Scores are memoized per identifier for the life of the selector, so a
//! second selection makes no network calls. A candidate that fails to load,
//! errors on every probe, or exceeds its time budget scores `0.0` without
//! affecting the others.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;

use marks_rag_core::catalog::{self, EmbeddingModelDescriptor};
use marks_rag_core::embedding::Embedder;
use marks_rag_core::index::VectorIndex;

use crate::config::SelectionConfig;
use crate::embedding::ModelCache;

/// Matches fetched per probe query.
const PROBE_TOP_K: usize = 3;

/// Pause between attempts of a failed probe.
const PROBE_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Shorter probe set used when checking a model on explicit switch.
pub const SWITCH_PROBES: [&str; 3] = ["software engineering", "testing", "databases"];

#[derive(Debug, Clone)]
pub struct SelectionSettings {
    pub max_candidates: usize,
    pub concurrency: usize,
    pub candidate_timeout: Duration,
    /// Best scores at or below this fall back to the dimension default.
    pub min_score: f32,
    /// Attempts per probe, including the first.
    pub probe_retries: u32,
    pub probe_queries: Vec<String>,
}

impl From<&SelectionConfig> for SelectionSettings {
    fn from(config: &SelectionConfig) -> Self {
        Self {
            max_candidates: config.max_candidates,
            concurrency: config.concurrency,
            candidate_timeout: config.candidate_timeout(),
            min_score: config.min_score,
            probe_retries: config.probe_retries,
            probe_queries: config.probe_queries.clone(),
        }
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self::from(&SelectionConfig::default())
    }
}

pub struct ModelSelector {
    cache: Arc<ModelCache>,
    index: Arc<dyn VectorIndex>,
    settings: SelectionSettings,
    scores: Mutex<HashMap<&'static str, Arc<OnceCell<f32>>>>,
}

impl ModelSelector {
    pub fn new(
        cache: Arc<ModelCache>,
        index: Arc<dyn VectorIndex>,
        settings: SelectionSettings,
    ) -> Self {
        Self {
            cache,
            index,
            settings,
            scores: Mutex::new(HashMap::new()),
        }
    }

    /// Compatible catalog entries for `dimension`, recommended first, capped
    /// at `max_candidates`.
    pub fn candidates(&self, dimension: usize) -> Vec<EmbeddingModelDescriptor> {
        let mut models = catalog::compatible_models(dimension);
        models.truncate(self.settings.max_candidates);
        models
    }

    /// Pick the best-scoring compatible model, or the dimension default when
    /// nothing is compatible or nothing scores above the threshold.
    pub async fn select(&self, dimension: usize) -> EmbeddingModelDescriptor {
        let candidates = self.candidates(dimension);
        if candidates.is_empty() {
            let fallback = catalog::default_for_dimension(dimension);
            tracing::warn!(
                dimension,
                model = fallback.identifier,
                "no catalog model matches index dimension, using default"
            );
            return fallback;
        }

        tracing::info!(
            dimension,
            candidates = candidates.len(),
            "benchmarking embedding models"
        );

        let scored: Vec<(EmbeddingModelDescriptor, f32)> = stream::iter(candidates)
            .map(|model| async move { (model, self.score(&model).await) })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut best: Option<(EmbeddingModelDescriptor, f32)> = None;
        for (model, score) in scored {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((model, score));
            }
        }

        match best {
            Some((model, score)) if score > self.settings.min_score => {
                tracing::info!(model = model.identifier, score, "selected embedding model");
                model
            }
            _ => {
                let fallback = catalog::default_for_dimension(dimension);
                tracing::warn!(
                    model = fallback.identifier,
                    threshold = self.settings.min_score,
                    "no candidate scored above threshold, using default"
                );
                fallback
            }
        }
    }

    /// Memoized benchmark score for `model` over the configured probes.
    ///
    /// Concurrent callers for the same identifier share one benchmark run.
    pub async fn score(&self, model: &EmbeddingModelDescriptor) -> f32 {
        self.memoized(model, &self.settings.probe_queries).await
    }

    /// Score over the short switch probe set, unless `model` already has a
    /// memoized score.
    pub async fn quick_score(&self, model: &EmbeddingModelDescriptor) -> f32 {
        let probes: Vec<String> = SWITCH_PROBES.iter().map(|s| s.to_string()).collect();
        self.memoized(model, &probes).await
    }

    async fn memoized(&self, model: &EmbeddingModelDescriptor, probes: &[String]) -> f32 {
        let cell = self
            .scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(model.identifier)
            .or_default()
            .clone();

        *cell
            .get_or_init(|| async {
                let budget = self.settings.candidate_timeout;
                let score = match tokio::time::timeout(budget, self.benchmark(model, probes)).await
                {
                    Ok(Ok(score)) => score,
                    Ok(Err(e)) => {
                        tracing::warn!(model = model.identifier, error = %e, "candidate failed");
                        0.0
                    }
                    Err(_) => {
                        tracing::warn!(model = model.identifier, ?budget, "candidate timed out");
                        0.0
                    }
                };
                tracing::info!(model = model.identifier, score, "benchmark score");
                score
            })
            .await
    }

    async fn benchmark(&self, model: &EmbeddingModelDescriptor, probes: &[String]) -> Result<f32> {
        let embedder = self.cache.get_or_load(model).await?;

        let mut total = 0.0f32;
        let mut counted = 0usize;
        for probe in probes {
            match self.probe(embedder.as_ref(), probe).await {
                Some(best) => {
                    total += best;
                    counted += 1;
                }
                None => {
                    tracing::debug!(model = model.identifier, probe = %probe, "probe returned nothing");
                }
            }
        }

        Ok(if counted == 0 {
            0.0
        } else {
            total / counted as f32
        })
    }

    /// Best match score for one probe, or `None` when it produced no
    /// matches or failed on every attempt.
    async fn probe(&self, embedder: &dyn Embedder, text: &str) -> Option<f32> {
        let attempts = self.settings.probe_retries.max(1);
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(PROBE_RETRY_PAUSE).await;
            }
            let result = async {
                let vector = embedder.embed(text).await?;
                self.index.query(&vector, PROBE_TOP_K, false).await
            }
            .await;

            match result {
                Ok(response) => {
                    return response
                        .matches
                        .iter()
                        .map(|m| m.score)
                        .fold(None, |best: Option<f32>, s| {
                            Some(best.map_or(s, |b| b.max(s)))
                        });
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "probe failed");
                }
            }
        }
        None
    }

    /// Scores computed so far, by identifier.
    pub fn scores(&self) -> BTreeMap<String, f32> {
        self.scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(id, cell)| cell.get().map(|s| (id.to_string(), *s)))
            .collect()
    }

    /// Highest memoized score, if any candidate has been benchmarked.
    pub fn best_score(&self) -> Option<f32> {
        self.scores().into_values().reduce(f32::max)
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }
}
