use serde::Serialize;

use crate::database::ScoredDocument;
use crate::documents::Document;

/// Context used when retrieval produced nothing or failed
pub const NO_CONTEXT_AVAILABLE: &str = "No specific context available. Using general F1 knowledge.";

const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

const SYSTEM_PROMPT_TEMPLATE: &str = "You are an expert Formula 1 assistant with comprehensive knowledge about F1 racing, including current and historical data about races, drivers, teams, circuits, regulations, and statistics.

Your role is to:
1. Answer questions about Formula 1 accurately and helpfully
2. Use the provided context to give informed, up-to-date responses
3. Cite your sources when providing specific facts or statistics
4. Acknowledge when you're not certain about something
5. Be conversational and engaging while maintaining accuracy

Guidelines:
- Always prioritize information from the provided context
- When discussing statistics, mention the source and date if available
- If the context doesn't contain enough information, say so and provide what general knowledge you can
- Format responses clearly with bullet points or numbered lists when appropriate
- For race results, standings, and statistics, be precise with numbers
- Explain F1 terminology when it might not be clear to casual fans

Current context from F1 knowledge base:
{context}

Remember: You're helping F1 fans and enthusiasts get accurate information about their favorite sport. Be enthusiastic but accurate!";

/// Render documents into one prompt-ready block with numbered source labels.
///
/// Documents are rendered in the order given; callers sort by relevance
/// first. Content is never truncated.
#[inline]
pub fn format_context<'a, I>(documents: I) -> String
where
    I: IntoIterator<Item = &'a Document>,
{
    let blocks: Vec<String> = documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| {
            format!(
                "[Source {}: {}]\n{}",
                index + 1,
                document.metadata.display_name(),
                document.content
            )
        })
        .collect();

    if blocks.is_empty() {
        return NO_CONTEXT_AVAILABLE.to_string();
    }

    blocks.join(SOURCE_SEPARATOR)
}

/// Instruction for the chat model with `context` embedded
#[inline]
pub fn build_system_prompt(context: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{context}", context)
}

/// Citation entry for a retrieved document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReference {
    pub title: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub relevance_score: f32,
}

impl From<&ScoredDocument> for SourceReference {
    #[inline]
    fn from(hit: &ScoredDocument) -> Self {
        let metadata = &hit.document.metadata;
        Self {
            title: metadata.display_name().to_string(),
            source: metadata.source.clone(),
            url: metadata.url.clone(),
            relevance_score: hit.score,
        }
    }
}
