//! Data types that flow from retrieval through to the caller.

use serde::Serialize;

use crate::index::Metadata;

/// Characters of document text included in a source preview.
pub const PREVIEW_CHARS: usize = 300;

/// A match that survived text extraction and score filtering.
///
/// `score` and `text` are authoritative; `metadata` is the raw index
/// metadata, still including the key the text was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Metadata,
    /// Metadata key the text was extracted from.
    #[serde(skip)]
    pub text_key: &'static str,
}

impl RetrievedDocument {
    /// Metadata without the text field, for response payloads.
    pub fn display_metadata(&self) -> Metadata {
        self.metadata
            .iter()
            .filter(|(k, _)| k.as_str() != self.text_key)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A cited source in a [`QueryResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub id: String,
    /// 1-based rank in retrieval order.
    pub rank: usize,
    pub score: f32,
    pub preview: String,
    pub metadata: Metadata,
}

impl SourceRef {
    pub fn from_document(rank: usize, doc: &RetrievedDocument) -> Self {
        Self {
            id: doc.id.clone(),
            rank,
            score: doc.score,
            preview: truncate_chars(&doc.text, PREVIEW_CHARS),
            metadata: doc.display_metadata(),
        }
    }
}

/// Outcome of one question, successful or not.
///
/// Failures are reported here with `success == false` and an `error`
/// message rather than as a Rust error.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub marks: u32,
    pub query: String,
    pub relevance_score: f32,
    pub best_match_id: Option<String>,
    pub total_sources: usize,
    pub active_model: String,
    pub index_dimension: usize,
    /// Wall-clock seconds spent answering.
    pub query_time: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// First `max` characters of `text`, with `"..."` appended when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(text: &str, text_key: &'static str) -> RetrievedDocument {
        let mut metadata = Metadata::new();
        metadata.insert(text_key.into(), json!(text));
        metadata.insert("source".into(), json!("notes.pdf"));
        RetrievedDocument {
            id: "d1".into(),
            score: 0.8,
            text: text.into(),
            metadata,
            text_key,
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("héllo wörld", 4), "héll...");
    }

    #[test]
    fn test_display_metadata_strips_text_key() {
        let d = doc("body", "chunk_text");
        let meta = d.display_metadata();
        assert!(!meta.contains_key("chunk_text"));
        assert_eq!(meta["source"], "notes.pdf");
    }

    #[test]
    fn test_source_preview_truncated() {
        let long = "x".repeat(400);
        let s = SourceRef::from_document(1, &doc(&long, "text"));
        assert_eq!(s.preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(s.preview.ends_with("..."));
        assert_eq!(s.rank, 1);
    }
}
