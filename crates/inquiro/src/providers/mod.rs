//! Provider abstractions for embeddings, generation, and vector search
//!
//! Handlers and the seeding pipeline hold `Arc<dyn ...>` trait objects so the
//! hosted Gemini and Pinecone backends can be swapped for fakes in tests.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod pinecone;
pub mod vector_index;

pub use embedding::EmbeddingProvider;
pub use gemini::GeminiClient;
pub use llm::LlmProvider;
pub use pinecone::PineconeClient;
pub use vector_index::{
    IndexDescription, IndexSpec, VectorIndexProvider, VectorMatch, VectorRecord,
};
