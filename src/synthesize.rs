//! Marks-scaled answer generation over retrieved documents.

use std::sync::Arc;

use marks_rag_core::error::RagError;
use marks_rag_core::generation::{GenerationRequest, Generator};
use marks_rag_core::models::RetrievedDocument;
use marks_rag_core::prompt::{build_context, build_prompts, max_tokens_for};

use crate::config::GenerationConfig;

pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    model: String,
    max_tokens_cap: u32,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            model: config.model.clone(),
            max_tokens_cap: config.max_tokens_cap,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The request that [`synthesize`](Self::synthesize) would send.
    pub fn request(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
        marks: u32,
        temperature: f32,
    ) -> GenerationRequest {
        let context = build_context(documents);
        let prompts = build_prompts(query, &context, marks);
        GenerationRequest {
            system_prompt: prompts.system,
            user_prompt: prompts.user,
            model: self.model.clone(),
            temperature,
            max_tokens: max_tokens_for(marks, self.max_tokens_cap),
        }
    }

    /// Answer `query` at `marks` depth from `documents`.
    pub async fn synthesize(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
        marks: u32,
        temperature: f32,
    ) -> Result<String, RagError> {
        let request = self.request(query, documents, marks, temperature);
        tracing::debug!(
            model = %self.model,
            marks,
            max_tokens = request.max_tokens,
            documents = documents.len(),
            "generating answer"
        );
        self.generator
            .complete(&request)
            .await
            .map_err(|e| RagError::Generation(e.to_string()))
    }

    /// Send a minimal request to check the backend answers at all.
    pub async fn ping(&self) -> Result<String, RagError> {
        let request = GenerationRequest {
            system_prompt: "You are a helpful assistant.".to_string(),
            user_prompt: "Say 'Hello' in one word.".to_string(),
            model: self.model.clone(),
            temperature: 0.0,
            max_tokens: 10,
        };
        self.generator
            .complete(&request)
            .await
            .map_err(|e| RagError::Generation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marks_rag_core::index::Metadata;
    use marks_rag_core::prompt::NO_CONTEXT;
    use marks_rag_core::testing::ScriptedGenerator;

    fn doc(text: &str) -> RetrievedDocument {
        RetrievedDocument {
            id: "d1".into(),
            score: 0.8,
            text: text.into(),
            metadata: Metadata::new(),
            text_key: "text",
        }
    }

    #[tokio::test]
    async fn test_request_scaled_by_marks() {
        let generator = Arc::new(ScriptedGenerator::answering("Coupling is..."));
        let synth = Synthesizer::new(generator.clone(), &GenerationConfig::default());

        let answer = synth
            .synthesize("What is coupling?", &[doc("Coupling measures...")], 5, 0.3)
            .await
            .unwrap();
        assert_eq!(answer, "Coupling is...");

        let sent = &generator.requests()[0];
        assert_eq!(sent.max_tokens, 750);
        assert_eq!(sent.model, "llama-3.1-8b-instant");
        assert!((sent.temperature - 0.3).abs() < f32::EPSILON);
        assert!(sent.system_prompt.contains("FOR 5 MARKS"));
        assert!(sent.user_prompt.contains("[Source 1] (Relevance: 0.800)"));
    }

    #[tokio::test]
    async fn test_no_documents_uses_marker() {
        let generator = Arc::new(ScriptedGenerator::answering("ok"));
        let synth = Synthesizer::new(generator.clone(), &GenerationConfig::default());
        synth.synthesize("q", &[], 15, 0.1).await.unwrap();
        let sent = &generator.requests()[0];
        assert!(sent.user_prompt.contains(NO_CONTEXT));
        assert_eq!(sent.max_tokens, 2000);
    }

    #[tokio::test]
    async fn test_failure_is_typed() {
        let synth = Synthesizer::new(
            Arc::new(ScriptedGenerator::failing("rate limited")),
            &GenerationConfig::default(),
        );
        let err = synth.synthesize("q", &[], 2, 0.3).await.unwrap_err();
        assert!(matches!(err, RagError::Generation(ref m) if m.contains("rate limited")));
    }
}
