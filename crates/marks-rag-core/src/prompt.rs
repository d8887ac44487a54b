//! Marks-scaled prompt construction and context assembly.
//!
//! # Marks Table
//!
//! A caller asks for an answer worth some number of marks. The table maps
//! boundary values to formatting instructions of increasing depth. An exact
//! boundary wins; otherwise the largest boundary `<= marks` applies, so 4
//! marks gets the 3-mark instruction and anything above 15 gets the 15-mark
//! one. Zero marks falls back to the 2-mark instruction.
//!
//! | Marks | Depth |
//! |-------|-------|
//! | 1  | definition only |
//! | 2  | definition + example |
//! | 3  | definition, characteristics, example |
//! | 5  | definition, 5-7 points, application |
//! | 8  | 7-10 points, pros/cons, example |
//! | 10 | 10-12 points, pros/cons, applications, best practices |
//! | 15 | comprehensive, including pitfalls and future trends |

use crate::models::{truncate_chars, RetrievedDocument};

/// Boundary table, sorted ascending by marks.
pub const MARKS_TABLE: [(u32, &str); 7] = [
    (1, "Provide a concise definition in 2-3 lines only."),
    (
        2,
        "Provide: 1. Clear definition (2-3 lines) 2. One practical example with brief explanation.",
    ),
    (
        3,
        "Provide: 1. Definition 2. Key characteristics (3-4 points) 3. One example.",
    ),
    (
        5,
        "Provide: 1. Clear definition 2. 5-7 key bullet points explaining important aspects \
         3. Brief practical application.",
    ),
    (
        8,
        "Provide: 1. Comprehensive definition 2. Detailed explanation (7-10 points) \
         3. Advantages and disadvantages 4. Example application.",
    ),
    (
        10,
        "Provide: 1. Complete definition 2. Detailed explanation (10-12 points) \
         3. Advantages and disadvantages 4. Real-world applications 5. Best practices.",
    ),
    (
        15,
        "Provide a comprehensive answer including: 1. Clear definition \
         2. Detailed explanation (15+ points) 3. Advantages and disadvantages \
         4. Multiple real-world applications 5. Best practices \
         6. Common pitfalls and how to avoid them 7. Future trends or considerations",
    ),
];

/// Characters of each document included in the context block.
pub const CONTEXT_CHARS: usize = 1000;

/// Context used when retrieval produced nothing.
pub const NO_CONTEXT: &str = "No relevant context found.";

/// Generated tokens allowed per mark.
pub const TOKENS_PER_MARK: u32 = 150;

/// Instruction for `marks`: exact boundary, else largest boundary below.
pub fn marks_instruction(marks: u32) -> &'static str {
    MARKS_TABLE
        .iter()
        .rev()
        .find(|(boundary, _)| *boundary <= marks)
        .map(|(_, instruction)| *instruction)
        .unwrap_or(MARKS_TABLE[1].1)
}

/// Output budget for `marks`, capped at `cap`. At least one mark's worth.
pub fn max_tokens_for(marks: u32, cap: u32) -> u32 {
    marks.max(1).saturating_mul(TOKENS_PER_MARK).min(cap)
}

/// Assemble the labelled context block fed to the model.
///
/// Each document becomes `[Source i] (Relevance: s)` followed by its text
/// cut to [`CONTEXT_CHARS`]; blocks are separated by a rule of `=`.
pub fn build_context(documents: &[RetrievedDocument]) -> String {
    if documents.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let separator = format!("{}\n\n", "=".repeat(50));
    let blocks: Vec<String> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "[Source {}] (Relevance: {:.3})\n{}",
                i + 1,
                doc.score,
                truncate_chars(&doc.text, CONTEXT_CHARS)
            )
        })
        .collect();

    format!("\n\n{}", blocks.join(&separator))
}

/// System and user messages for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Compose the tutor prompt for `query` at `marks` depth over `context`.
pub fn build_prompts(query: &str, context: &str, marks: u32) -> PromptPair {
    let instruction = marks_instruction(marks);

    let system = format!(
        "You are an expert AI tutor specializing in software engineering and computer science.
Answer questions based on the provided context with academic precision.

FORMATTING REQUIREMENTS FOR {marks} MARKS:
{instruction}

IMPORTANT GUIDELINES:
- Use the provided context as your primary source of information
- Provide accurate, detailed explanations suitable for exam preparation
- Use appropriate technical terminology with clear explanations
- Structure your answer with clear headings and bullet points where appropriate
- Include specific examples when relevant
- Ensure content depth matches the mark allocation
- If context is insufficient, acknowledge this but provide what you can from the available information

STYLE:
- Academic but accessible
- Well-structured with clear organization
- Technical accuracy is paramount
- Include practical applications where relevant"
    );

    let user = format!(
        "Context Information:
{context}

Question: {query}

Please provide a comprehensive answer for {marks} marks following the formatting requirements above."
    );

    PromptPair { system, user }
}
