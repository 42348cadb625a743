//! Configuration for Inquiro
//!
//! Values come from built-in defaults, an optional TOML file, and finally
//! environment variables (which always win).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InquiroConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Gemini (embedding + generation) configuration
    pub gemini: GeminiConfig,
    /// Pinecone vector index configuration
    pub vector_index: VectorIndexConfig,
    /// Relational store configuration
    pub database: DatabaseConfig,
    /// Query-time retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Seeding pipeline configuration
    pub seed: SeedConfig,
    /// Response-gating classifier configuration
    pub classifier: ClassifierConfig,
}

impl InquiroConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Apply overrides from an environment-like lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.gemini.api_key = key;
        }
        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.vector_index.api_key = key;
        }
        if let Some(path) = lookup("INQUIRO_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(host) = lookup("INQUIRO_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("INQUIRO_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(flag) = lookup("SKIP_API_CALLS") {
            self.seed.skip_api_calls = flag == "true";
        }
        if let Some(flag) = lookup("SKIP_PINECONE") {
            self.seed.skip_vector_index = flag == "true";
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
        }
    }
}

/// Gemini configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key (usually from GOOGLE_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Generative Language API base URL
    pub base_url: String,
    /// Model used to synthesize chat answers
    pub synthesis_model: String,
    /// Model used to extract knowledge pairs during seeding
    pub extraction_model: String,
    /// Embedding model
    pub embedding_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            synthesis_model: "gemini-1.5-flash".to_string(),
            extraction_model: "gemini-1.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Pinecone configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    /// API key (usually from PINECONE_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Control plane URL
    pub control_plane_url: String,
    /// API version header value
    pub api_version: String,
    /// Index name
    pub index_name: String,
    /// Vector dimensions (768 for text-embedding-004)
    pub dimension: usize,
    /// Similarity metric
    pub metric: String,
    /// Serverless cloud
    pub cloud: String,
    /// Serverless region
    pub region: String,
    /// How many times to poll for readiness after create
    pub ready_poll_attempts: u32,
    /// Seconds between readiness polls
    pub ready_poll_interval_secs: u64,
    /// Vectors per upsert request
    pub upsert_batch_size: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            control_plane_url: "https://api.pinecone.io".to_string(),
            api_version: "2024-07".to_string(),
            index_name: "knowledge-base-index".to_string(),
            dimension: 768,
            metric: "cosine".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            ready_poll_attempts: 12,
            ready_poll_interval_secs: 10,
            upsert_batch_size: 100,
        }
    }
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("inquiro.db"),
        }
    }
}

/// Query-time retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest neighbours to fetch
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Seeding pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Raw email threads file
    pub emails_path: PathBuf,
    /// Threads sent to the extraction model (quota management)
    pub max_threads: usize,
    /// Delay between rate-limited API calls
    pub rate_limit_delay_ms: u64,
    /// Items processed per rate-limit batch
    pub batch_size: usize,
    /// Use built-in mock extractions instead of calling the LLM
    pub skip_api_calls: bool,
    /// Skip embedding and vector index population
    pub skip_vector_index: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            emails_path: PathBuf::from("data/emails.json"),
            max_threads: 5,
            // 15 requests per minute on the free tier
            rate_limit_delay_ms: 4000,
            batch_size: 1,
            skip_api_calls: false,
            skip_vector_index: false,
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierConfig {
    /// TOML phrase table replacing the built-in one
    pub phrase_table: Option<PathBuf>,
}
