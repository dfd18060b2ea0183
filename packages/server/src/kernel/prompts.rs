//! Centralized prompt management.
//!
//! All prompt text sent to the generation provider lives here: single
//! source of truth, easy to version and test. Answer generation and tag
//! extraction are collapsed into one model call, so the system prompt
//! carries the combined JSON output contract.

use openai_client::truncate_chars;

use crate::kernel::generation::ConversationTurn;
use crate::kernel::retrieval::RetrievedPassage;

/// Marker the model emits when the supplied context cannot answer the query.
pub const INSUFFICIENT_CONTEXT: &str = "INSUFFICIENT_CONTEXT";

/// Most recent conversation turns included in the prompt.
pub const MAX_HISTORY_TURNS: usize = 6;

/// Per-turn character budget when condensing history.
pub const MAX_TURN_CHARS: usize = 150;

/// System instruction for the combined answer + tags + confidence call.
pub const TRIAGE_SYSTEM_PROMPT: &str = r#"You are a helpful customer support assistant.

Your task is to answer user questions based ONLY on the provided context from the knowledge base.

RESPONSE FORMAT:
You MUST respond with valid JSON in this exact format:
{
  "answer": "your detailed answer here",
  "tags": ["tag1", "tag2", "tag3"],
  "confidence": "high"
}

IMPORTANT RULES:

1. ANSWER GENERATION:
   - If the context contains sufficient information: provide a helpful, detailed answer
   - If the context does NOT contain enough information: set answer to exactly "INSUFFICIENT_CONTEXT"
   - Do NOT make up information that is not in the context
   - Use polite language suitable for customer support

2. TAG EXTRACTION:
   - Extract 3-5 relevant tags that categorize the question/topic
   - Tags should be lowercase, hyphenated if multi-word (e.g., "password-reset")
   - Include urgency if apparent (e.g., "urgent")

3. CONFIDENCE LEVEL:
   - "high": context clearly answers the question with specific information
   - "medium": context provides relevant info but may lack some details
   - "low": context is tangentially related or insufficient
   - If setting answer to "INSUFFICIENT_CONTEXT", set confidence to "low""#;

/// Format retrieved passages as the context block of the prompt.
///
/// Passages with empty text are skipped; an empty passage set yields an
/// explicit "no context" block so the prompt stays well-formed.
pub fn format_context(passages: &[RetrievedPassage]) -> String {
    let chunks: Vec<String> = passages
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .enumerate()
        .map(|(idx, p)| format!("Document {}:\n{}", idx + 1, p.text))
        .collect();

    if chunks.is_empty() {
        "(no relevant documents found)".to_string()
    } else {
        chunks.join("\n\n")
    }
}

/// Condense conversation history into a bounded summary block.
///
/// Keeps at most the [`MAX_HISTORY_TURNS`] most recent turns, each truncated
/// to [`MAX_TURN_CHARS`] characters. Returns `None` when there is no history.
pub fn condense_history(history: &[ConversationTurn]) -> Option<String> {
    if history.is_empty() {
        return None;
    }

    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    let lines: Vec<String> = history[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role, truncate_chars(&turn.content, MAX_TURN_CHARS)))
        .collect();

    Some(lines.join("\n"))
}

/// Build the user prompt from context, optional condensed history, and query.
pub fn build_user_prompt(
    passages: &[RetrievedPassage],
    history: &[ConversationTurn],
    query: &str,
) -> String {
    let context = format_context(passages);

    let mut prompt = format!("Context from knowledge base:\n{}\n\n", context);

    if let Some(summary) = condense_history(history) {
        prompt.push_str(&format!("Recent conversation:\n{}\n\n", summary));
    }

    prompt.push_str(&format!(
        "User Question: {}\n\nRemember: respond ONLY with valid JSON containing answer, tags, and confidence.",
        query
    ));

    prompt
}
