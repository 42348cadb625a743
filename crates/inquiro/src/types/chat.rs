//! Chat request/response types for the search endpoint

use serde::{Deserialize, Serialize};

use super::knowledge::KnowledgePair;

/// Who sent a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_role")]
    pub role: Role,
    pub content: String,
}

fn default_role() -> Role {
    Role::User
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// POST /api/search body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub messages: Vec<ChatMessage>,
}

impl SearchRequest {
    /// Content of the most recent user turn
    ///
    /// Assistant turns are history only and never treated as the query.
    pub fn latest_query(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// A knowledge pair surfaced as evidence for a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub question: String,
    pub answer: String,
    pub id: String,
}

impl From<&KnowledgePair> for Source {
    fn from(pair: &KnowledgePair) -> Self {
        Self {
            question: pair.question.clone(),
            answer: pair.answer.clone(),
            id: pair.id.clone(),
        }
    }
}

/// POST /api/search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub text: String,
    pub sources: Vec<Source>,
}
