//! Prompt templates for answer synthesis and knowledge extraction

use crate::types::{KnowledgePair, RawThread};

/// Separator between context entries and between thread messages
const ENTRY_SEPARATOR: &str = "\n\n---\n\n";

/// Prompt builder for synthesis and extraction
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context from retrieved knowledge pairs
    pub fn format_context(pairs: &[KnowledgePair]) -> String {
        pairs
            .iter()
            .map(|p| format!("Question: {}\nAnswer: {}", p.question, p.answer))
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR)
    }

    /// Build the grounded answer prompt
    pub fn synthesis_prompt(context: &str, question: &str) -> String {
        format!(
            r#"You are Inquiro, an expert AI assistant. Answer the user's question directly, using *only* the context below, which comes from a knowledge base of past client conversations.
- Do not use any outside knowledge.
- If the context does not contain the answer, say that you don't have enough information.
- Be concise and helpful.
- After answering, ask whether you can help with anything else.
- If the user says no, say goodbye.
- If the user says yes, ask what else you can help with.

CONTEXT:
{context}

USER'S QUESTION:
{question}"#,
            context = context,
            question = question,
        )
    }

    /// Render a raw thread the way the extraction model sees it
    pub fn format_thread(thread: &RawThread) -> String {
        thread
            .messages
            .iter()
            .map(|m| {
                format!(
                    "From: {}\nTo: {}\nDate: {}\nMessage ID: {}\n\n{}",
                    m.sender, m.recipient, m.date, m.id, m.content
                )
            })
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR)
    }

    /// Build the knowledge extraction prompt for one thread
    pub fn extraction_prompt(thread: &RawThread) -> String {
        format!(
            r#"You are an expert data analyst. Analyze the email thread below and extract structured knowledge.
Extract every distinct question/answer pair, and identify relationships between the pairs.
- The question should be a concise, well-phrased version of the client's query.
- The answer should be a clear, synthesized answer from the firm.
- The person who answers may not be the original recipient.
- One thread can contain several unrelated question/answer pairs.
- Note when one pair clarifies, expands on, or is a follow-up to another pair in the same thread.

Respond with a single valid JSON object with this structure:
{{
  "knowledgePairs": [
    {{ "id": "kp_1", "question": "...", "answer": "...", "source_message_ids": ["msg_id_1"] }}
  ],
  "knowledgeEdges": [
    {{ "sourcePairId": "kp_1", "targetPairId": "kp_2", "relationshipType": "CLARIFIES" }}
  ]
}}
relationshipType is one of CLARIFIES, EXPANDS_ON, IS_FOLLOW_UP_TO.

EMAIL THREAD:
{thread}"#,
            thread = Self::format_thread(thread),
        )
    }

    /// Text embedded for a stored pair
    pub fn embedding_text(pair: &KnowledgePair) -> String {
        format!("Question: {}\nAnswer: {}", pair.question, pair.answer)
    }
}
