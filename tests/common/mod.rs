//! Offline fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use marks_rag::config::Config;
use marks_rag::pipeline::{ModelMode, Pipeline, PipelineParts};
use marks_rag_core::embedding::{EmbeddingLoader, HashEmbedder};
use marks_rag_core::generation::Generator;
use marks_rag_core::index::memory::InMemoryIndex;
use marks_rag_core::index::{Metadata, VectorIndex};

pub const CORPUS: [&str; 6] = [
    "software engineering principles guide large projects",
    "quality assurance and software quality metrics",
    "testing methodology unit integration and system testing",
    "design patterns in system design",
    "database management systems and normalisation",
    "algorithms and data structures for sorting",
];

/// Index named `notes` holding [`CORPUS`] embedded with `seed`.
pub fn corpus_index(dimension: usize, seed: u64) -> Arc<InMemoryIndex> {
    let index = InMemoryIndex::new("notes", dimension);
    let writer = HashEmbedder::new("writer", dimension, seed);
    for (i, text) in CORPUS.iter().enumerate() {
        let mut meta = Metadata::new();
        meta.insert("text".into(), serde_json::json!(text));
        meta.insert("source".into(), serde_json::json!("se-notes.pdf"));
        index
            .upsert(&format!("chunk-{}", i), writer.embed_text(text), meta)
            .unwrap();
    }
    Arc::new(index)
}

pub async fn pipeline(
    index: Arc<dyn VectorIndex>,
    loader: Arc<dyn EmbeddingLoader>,
    generator: Arc<dyn Generator>,
    mode: ModelMode,
) -> Pipeline {
    pipeline_with_config(index, loader, generator, &Config::default(), mode).await
}

pub async fn pipeline_with_config(
    index: Arc<dyn VectorIndex>,
    loader: Arc<dyn EmbeddingLoader>,
    generator: Arc<dyn Generator>,
    config: &Config,
    mode: ModelMode,
) -> Pipeline {
    Pipeline::initialize(
        PipelineParts {
            index,
            loader,
            generator,
        },
        config,
        mode,
    )
    .await
    .unwrap()
}
