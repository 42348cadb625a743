//! Vector index provider trait for storing and searching embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::VectorIndexConfig;
use crate::error::Result;

/// A vector to upsert, keyed by knowledge pair id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A nearest-neighbour match
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// Knowledge pair id
    pub id: String,
    /// Similarity score (higher is more similar)
    pub score: f32,
}

/// Current state of a hosted index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    /// Data-plane host for upsert/query
    pub host: String,
    pub ready: bool,
    /// Provider-specific state string (e.g. "Ready", "Initializing")
    pub state: String,
}

/// Parameters for creating a serverless index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub cloud: String,
    pub region: String,
}

impl From<&VectorIndexConfig> for IndexSpec {
    fn from(config: &VectorIndexConfig) -> Self {
        Self {
            name: config.index_name.clone(),
            dimension: config.dimension,
            metric: config.metric.clone(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
        }
    }
}

/// Trait for a hosted vector similarity index
///
/// Implementations:
/// - `PineconeClient`: Pinecone serverless index
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// Describe the index, or `None` if it does not exist
    async fn describe_index(&self) -> Result<Option<IndexDescription>>;

    /// Create the index
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Insert or replace vectors, returning how many were written
    async fn upsert(&self, vectors: &[VectorRecord]) -> Result<usize>;

    /// Find the `top_k` nearest neighbours of `vector`
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
