//! Application state for the Inquiro server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::classifier::{PhraseTable, ResponseGate};
use crate::config::InquiroConfig;
use crate::error::Result;
use crate::providers::{
    EmbeddingProvider, GeminiClient, LlmProvider, PineconeClient, VectorIndexProvider,
};
use crate::storage::KnowledgeDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: InquiroConfig,
    db: KnowledgeDb,
    /// Query embeddings (text-embedding-004)
    embedder: Arc<dyn EmbeddingProvider>,
    /// Answer synthesis
    llm: Arc<dyn LlmProvider>,
    /// Nearest-neighbour search over knowledge pairs
    vector_index: Arc<dyn VectorIndexProvider>,
    /// Citation gating
    gate: ResponseGate,
    /// Outcome of the last provider health check
    ready: RwLock<bool>,
}

impl AppState {
    /// Build state with the hosted Gemini and Pinecone clients
    pub fn from_config(config: InquiroConfig) -> Result<Self> {
        tracing::info!("Initializing Inquiro application state...");

        let db = KnowledgeDb::new(&config.database.path)?;
        tracing::info!("Knowledge database opened at {}", config.database.path.display());

        let gemini = Arc::new(GeminiClient::for_synthesis(&config.gemini)?);
        let index = Arc::new(PineconeClient::new(&config.vector_index)?);
        tracing::info!(
            "Providers initialized (llm: {}, embeddings: {}, index: {})",
            config.gemini.synthesis_model,
            config.gemini.embedding_model,
            config.vector_index.index_name
        );

        Self::new(config, db, gemini.clone(), gemini, index)
    }

    /// Build state from explicit parts
    ///
    /// Loads the classifier phrase table named in the config, if any.
    pub fn new(
        config: InquiroConfig,
        db: KnowledgeDb,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        vector_index: Arc<dyn VectorIndexProvider>,
    ) -> Result<Self> {
        let gate = match &config.classifier.phrase_table {
            Some(path) => {
                let table = PhraseTable::from_file(path)?;
                tracing::info!(
                    "Loaded {} classifier rules from {}",
                    table.rules.len(),
                    path.display()
                );
                ResponseGate::new(&table)?
            }
            None => ResponseGate::default(),
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                embedder,
                llm,
                vector_index,
                gate,
                ready: RwLock::new(false),
            }),
        })
    }

    pub fn config(&self) -> &InquiroConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &KnowledgeDb {
        &self.inner.db
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    pub fn vector_index(&self) -> &Arc<dyn VectorIndexProvider> {
        &self.inner.vector_index
    }

    pub fn gate(&self) -> &ResponseGate {
        &self.inner.gate
    }

    /// Result of the last readiness check (false until one has run)
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Health-check every provider and record whether all of them passed
    pub async fn check_readiness(&self) -> bool {
        let (llm, embedder, index) = tokio::join!(
            self.inner.llm.health_check(),
            self.inner.embedder.health_check(),
            self.inner.vector_index.health_check(),
        );

        let mut ready = true;
        for (role, name, result) in [
            ("llm", self.inner.llm.name(), llm),
            ("embedder", self.inner.embedder.name(), embedder),
            ("vector index", self.inner.vector_index.name(), index),
        ] {
            match result {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("{} provider '{}' is not available", role, name);
                    ready = false;
                }
                Err(e) => {
                    tracing::warn!("{} provider '{}' health check failed: {}", role, name, e);
                    ready = false;
                }
            }
        }

        *self.inner.ready.write() = ready;
        ready
    }
}
