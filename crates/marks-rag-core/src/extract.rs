//! Text extraction from heterogeneous index metadata.
//!
//! Different ingestion pipelines store the chunk text under different
//! metadata keys. [`TEXT_KEYS`] lists the keys probed, in priority order;
//! the first present, non-empty value wins. A match with no text under
//! any key is dropped regardless of its score.

use serde_json::Value;

use crate::index::{IndexMatch, Metadata};
use crate::models::RetrievedDocument;

/// Metadata keys that may hold chunk text, highest priority first.
pub const TEXT_KEYS: [&str; 7] = [
    "text",
    "chunk_text",
    "content",
    "document_text",
    "body",
    "description",
    "page_content",
];

/// Find the display text in `metadata`, returning the key it came from.
///
/// Strings are taken as-is; numbers and booleans are rendered; arrays
/// and objects are rendered as JSON. Whitespace-only strings and empty
/// arrays or objects count as absent.
pub fn extract_text(metadata: &Metadata) -> Option<(&'static str, String)> {
    TEXT_KEYS.iter().find_map(|key| {
        let text = match metadata.get(*key)? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(items) if items.is_empty() => return None,
            Value::Object(fields) if fields.is_empty() => return None,
            other => other.to_string(),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some((*key, text))
        }
    })
}

/// Turn raw index matches into documents.
///
/// Drops matches without text; when `min_score > 0`, also drops matches
/// scoring below it. A `min_score` of zero disables filtering since score
/// scales differ between embedding models. Rank order is preserved.
pub fn collect_documents(matches: Vec<IndexMatch>, min_score: f32) -> Vec<RetrievedDocument> {
    matches
        .into_iter()
        .filter_map(|m| {
            let (text_key, text) = extract_text(&m.metadata)?;
            if min_score > 0.0 && m.score < min_score {
                return None;
            }
            Some(RetrievedDocument {
                id: m.id,
                score: m.score,
                text,
                metadata: m.metadata,
                text_key,
            })
        })
        .collect()
}
