//! Core types for Inquiro

pub mod chat;
pub mod knowledge;

pub use chat::{ChatMessage, Role, SearchRequest, SearchResponse, Source};
pub use knowledge::{
    ExtractedEdge, ExtractedPair, ExtractionResult, KnowledgeEdge, KnowledgePair, Message,
    MessageWithAuthor, RawMessage, RawThread, RelationshipType, Thread, ThreadWithMessages, User,
};
