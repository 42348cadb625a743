//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for the knowledge base.

mod database;

pub use database::{KnowledgeDb, KnowledgeDbStats};
