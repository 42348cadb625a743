//! Knowledge-base types: raw email input, LLM extraction output, stored rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message as it appears in the raw emails file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub date: String,
    pub content: String,
}

/// A thread as it appears in the raw emails file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawThread {
    pub id: String,
    pub subject: String,
    pub messages: Vec<RawMessage>,
}

impl RawThread {
    /// Every sender and recipient address in the thread
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .flat_map(|m| [m.sender.as_str(), m.recipient.as_str()])
    }
}

/// How one knowledge pair relates to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Clarifies,
    ExpandsOn,
    IsFollowUpTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clarifies => "CLARIFIES",
            Self::ExpandsOn => "EXPANDS_ON",
            Self::IsFollowUpTo => "IS_FOLLOW_UP_TO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLARIFIES" => Some(Self::Clarifies),
            "EXPANDS_ON" => Some(Self::ExpandsOn),
            "IS_FOLLOW_UP_TO" => Some(Self::IsFollowUpTo),
            _ => None,
        }
    }
}

/// A question/answer pair as returned by the extraction model
///
/// `id` is temporary (e.g. "kp_1") and only links edges within one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPair {
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub source_message_ids: Vec<String>,
}

/// A relationship between two extracted pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEdge {
    pub source_pair_id: String,
    pub target_pair_id: String,
    pub relationship_type: RelationshipType,
}

/// Structured knowledge extracted from one email thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(default)]
    pub knowledge_pairs: Vec<ExtractedPair>,
    #[serde(default)]
    pub knowledge_edges: Vec<ExtractedEdge>,
}

/// A stored user (email participant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// A stored email thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub subject: String,
}

/// A stored email message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub original_message_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub author_id: String,
    pub thread_id: String,
}

/// A stored message joined with its author's email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWithAuthor {
    #[serde(flatten)]
    pub message: Message,
    pub author_email: String,
}

/// A stored thread with all of its messages, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadWithMessages {
    pub thread: Thread,
    pub messages: Vec<MessageWithAuthor>,
}

/// A stored question/answer pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePair {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// A stored relationship between two pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub id: String,
    pub source_pair_id: String,
    pub target_pair_id: String,
    pub relationship_type: RelationshipType,
}
