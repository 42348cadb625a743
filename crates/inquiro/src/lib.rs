//! inquiro: question answering over a knowledge base extracted from email threads
//!
//! A seeding pipeline turns raw email threads into question/answer pairs with
//! a hosted language model, stores them in SQLite and indexes their
//! embeddings in a hosted vector index. The server answers chat messages from
//! the nearest pairs and attaches them as sources only when the user asked a
//! question and the reply actually answers it.

pub mod classifier;
pub mod config;
pub mod error;
pub mod generation;
pub mod providers;
pub mod seeding;
pub mod server;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_support;

pub use classifier::{
    is_non_answer, is_question, should_attach_sources, ClassificationResult, PhraseTable,
    ResponseGate,
};
pub use config::InquiroConfig;
pub use error::{Error, Result};
pub use seeding::{SeedReport, Seeder};
pub use server::InquiroServer;
pub use storage::KnowledgeDb;
pub use types::{KnowledgePair, SearchRequest, SearchResponse, Source};
