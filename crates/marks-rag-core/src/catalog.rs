//! Static catalog of known embedding models.
//!
//! The index being queried was built with an embedding model we are not
//! told about; all we can learn is its vector dimension. The catalog lists
//! every model the loader knows how to obtain together with its output
//! dimension, so the selector can narrow the search to models that could
//! possibly have produced the index.
//!
//! Entries are listed in priority order. Within a dimension, the
//! [`recommended_for`] list is tried first.
//!
//! | Dimension | Recommended |
//! |-----------|-------------|
//! | 384  | `all-minilm-l12-v2`, `bge-small-en-v1.5` |
//! | 768  | `bge-base-en-v1.5`, `paraphrase-multilingual-mpnet-base-v2` |
//! | 1024 | `bge-large-en-v1.5` |
//! | 1536 | `text-embedding-3-small`, `text-embedding-ada-002` |
//! | 3072 | `text-embedding-3-large` |

use serde::Serialize;

/// Where an embedding model is obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// In-process ONNX inference (fastembed). Weights download on first use.
    Local,
    /// OpenAI `/v1/embeddings`.
    OpenAI,
    /// A local Ollama instance's `/api/embed`.
    Ollama,
}

/// A catalog entry. Identity is the `identifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EmbeddingModelDescriptor {
    pub identifier: &'static str,
    pub dimension: usize,
    pub backend: EmbeddingBackend,
}

impl EmbeddingModelDescriptor {
    const fn new(identifier: &'static str, dimension: usize, backend: EmbeddingBackend) -> Self {
        Self {
            identifier,
            dimension,
            backend,
        }
    }

    /// The model name the backend expects. Ollama entries carry an
    /// `ollama/` prefix in the catalog to keep identifiers unique.
    pub fn backend_model(&self) -> &'static str {
        self.identifier
            .strip_prefix("ollama/")
            .unwrap_or(self.identifier)
    }
}

use EmbeddingBackend::{Local, Ollama, OpenAI};

/// Every known model, in priority order.
pub static CATALOG: &[EmbeddingModelDescriptor] = &[
    // 384
    EmbeddingModelDescriptor::new("all-minilm-l12-v2", 384, Local),
    EmbeddingModelDescriptor::new("all-minilm-l6-v2", 384, Local),
    EmbeddingModelDescriptor::new("bge-small-en-v1.5", 384, Local),
    EmbeddingModelDescriptor::new("paraphrase-multilingual-minilm-l12-v2", 384, Local),
    EmbeddingModelDescriptor::new("multilingual-e5-small", 384, Local),
    EmbeddingModelDescriptor::new("ollama/all-minilm", 384, Ollama),
    // 768
    EmbeddingModelDescriptor::new("bge-base-en-v1.5", 768, Local),
    EmbeddingModelDescriptor::new("nomic-embed-text-v1.5", 768, Local),
    EmbeddingModelDescriptor::new("nomic-embed-text-v1", 768, Local),
    EmbeddingModelDescriptor::new("paraphrase-multilingual-mpnet-base-v2", 768, Local),
    EmbeddingModelDescriptor::new("gte-base-en-v1.5", 768, Local),
    EmbeddingModelDescriptor::new("multilingual-e5-base", 768, Local),
    EmbeddingModelDescriptor::new("ollama/nomic-embed-text", 768, Ollama),
    // 1024
    EmbeddingModelDescriptor::new("bge-large-en-v1.5", 1024, Local),
    EmbeddingModelDescriptor::new("mxbai-embed-large-v1", 1024, Local),
    EmbeddingModelDescriptor::new("multilingual-e5-large", 1024, Local),
    EmbeddingModelDescriptor::new("gte-large-en-v1.5", 1024, Local),
    EmbeddingModelDescriptor::new("ollama/mxbai-embed-large", 1024, Ollama),
    // 1536
    EmbeddingModelDescriptor::new("text-embedding-3-small", 1536, OpenAI),
    EmbeddingModelDescriptor::new("text-embedding-ada-002", 1536, OpenAI),
    // 3072
    EmbeddingModelDescriptor::new("text-embedding-3-large", 3072, OpenAI),
];

/// Recommended identifiers per dimension, best first.
pub fn recommended_for(dimension: usize) -> &'static [&'static str] {
    match dimension {
        384 => &["all-minilm-l12-v2", "bge-small-en-v1.5"],
        768 => &["bge-base-en-v1.5", "paraphrase-multilingual-mpnet-base-v2"],
        1024 => &["bge-large-en-v1.5"],
        1536 => &["text-embedding-3-small", "text-embedding-ada-002"],
        3072 => &["text-embedding-3-large"],
        _ => &[],
    }
}

const SMALL_DEFAULT: &str = "all-minilm-l12-v2";
const MEDIUM_DEFAULT: &str = "bge-base-en-v1.5";
const LARGE_DEFAULT: &str = "bge-large-en-v1.5";

/// Look up a model by identifier.
pub fn find(identifier: &str) -> Option<EmbeddingModelDescriptor> {
    CATALOG.iter().find(|m| m.identifier == identifier).copied()
}

/// Models whose dimension equals `dimension`: recommended ones first (in
/// recommended order), then the rest in catalog order.
pub fn compatible_models(dimension: usize) -> Vec<EmbeddingModelDescriptor> {
    let compatible: Vec<EmbeddingModelDescriptor> = CATALOG
        .iter()
        .filter(|m| m.dimension == dimension)
        .copied()
        .collect();

    let recommended = recommended_for(dimension);
    let mut ordered: Vec<EmbeddingModelDescriptor> = recommended
        .iter()
        .filter_map(|id| compatible.iter().find(|m| m.identifier == *id).copied())
        .collect();
    ordered.extend(
        compatible
            .into_iter()
            .filter(|m| !recommended.contains(&m.identifier)),
    );
    ordered
}

/// The model to use when benchmarking is skipped or inconclusive.
///
/// Picks the first recommended model for the exact dimension; otherwise
/// buckets by size (`<= 384` small, `<= 768` medium, larger → large).
/// The range default may not match `dimension` when the dimension is not
/// in the catalog at all.
pub fn default_for_dimension(dimension: usize) -> EmbeddingModelDescriptor {
    let id = recommended_for(dimension).first().copied().unwrap_or(
        if dimension <= 384 {
            SMALL_DEFAULT
        } else if dimension <= 768 {
            MEDIUM_DEFAULT
        } else {
            LARGE_DEFAULT
        },
    );
    // The defaults above are all catalog entries.
    find(id).unwrap_or(CATALOG[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.identifier, b.identifier);
            }
        }
    }

    #[test]
    fn test_recommended_entries_exist_with_matching_dimension() {
        for dim in [384, 768, 1024, 1536, 3072] {
            for id in recommended_for(dim) {
                let m = find(id).unwrap_or_else(|| panic!("{} missing from catalog", id));
                assert_eq!(m.dimension, dim);
            }
        }
    }

    #[test]
    fn test_compatible_models_recommended_first() {
        let models = compatible_models(768);
        let ids: Vec<&str> = models.iter().map(|m| m.identifier).collect();
        assert_eq!(ids[0], "bge-base-en-v1.5");
        assert_eq!(ids[1], "paraphrase-multilingual-mpnet-base-v2");
        assert_eq!(ids[2], "nomic-embed-text-v1.5");
        assert!(models.iter().all(|m| m.dimension == 768));
        assert_eq!(models.len(), 7);
    }

    #[test]
    fn test_compatible_models_unknown_dimension() {
        assert!(compatible_models(512).is_empty());
    }

    #[test]
    fn test_default_for_catalog_dimensions_matches() {
        for m in CATALOG {
            assert_eq!(default_for_dimension(m.dimension).dimension, m.dimension);
        }
    }

    #[test]
    fn test_default_for_absent_dimension_uses_range() {
        assert_eq!(default_for_dimension(128).identifier, SMALL_DEFAULT);
        assert_eq!(default_for_dimension(512).identifier, MEDIUM_DEFAULT);
        assert_eq!(default_for_dimension(2048).identifier, LARGE_DEFAULT);
    }

    #[test]
    fn test_backend_model_strips_ollama_prefix() {
        assert_eq!(find("ollama/nomic-embed-text").unwrap().backend_model(), "nomic-embed-text");
        assert_eq!(find("bge-base-en-v1.5").unwrap().backend_model(), "bge-base-en-v1.5");
    }
}
