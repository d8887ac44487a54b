//! Error taxonomy shared by every layer of the pipeline.
//!
//! Functions throughout the workspace return `anyhow::Result`; when a
//! failure belongs to one of the categories below it is raised as a
//! [`RagError`] so callers can recover the category with
//! `err.downcast_ref::<RagError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Missing credentials or identifiers at startup. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An embedding model could not be loaded.
    #[error("failed to load embedding model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    /// Search failed on every attempt.
    #[error("retrieval failed after {attempts} attempt(s): {reason}")]
    Retrieval { attempts: u32, reason: String },

    /// The generation backend failed while producing an answer.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Blank or otherwise unusable input. Never reaches a backend.
    #[error("invalid query: {0}")]
    Validation(String),
}

impl RagError {
    /// Short machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "configuration",
            RagError::ModelLoad { .. } => "model_load",
            RagError::Retrieval { .. } => "retrieval",
            RagError::Generation(_) => "generation",
            RagError::Validation(_) => "bad_request",
        }
    }
}
