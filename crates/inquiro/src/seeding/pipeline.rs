//! Seeding pipeline: email threads → knowledge pairs → database + vector index

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{InquiroConfig, SeedConfig, VectorIndexConfig};
use crate::error::{Error, Result};
use crate::generation::{parse_extraction, PromptBuilder};
use crate::providers::{
    EmbeddingProvider, GeminiClient, IndexSpec, LlmProvider, PineconeClient,
    VectorIndexProvider, VectorRecord,
};
use crate::seeding::mock::mock_extractions;
use crate::seeding::rate_limit::RateLimiter;
use crate::storage::KnowledgeDb;
use crate::types::{ExtractionResult, KnowledgePair, RawThread};

/// Outcome of one seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub threads_read: usize,
    pub extractions: usize,
    pub threads_stored: usize,
    pub messages_stored: usize,
    pub users_stored: usize,
    pub pairs_stored: usize,
    pub source_links: usize,
    pub edges_stored: usize,
    pub edges_skipped: usize,
    pub index_created: bool,
    pub vectors_upserted: usize,
    pub embeddings_failed: usize,
}

/// Builds the knowledge base from a raw emails file
pub struct Seeder {
    db: KnowledgeDb,
    seed: SeedConfig,
    index_config: VectorIndexConfig,
    llm: Option<Arc<dyn LlmProvider>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndexProvider>>,
}

impl Seeder {
    pub fn new(db: KnowledgeDb, seed: SeedConfig, index_config: VectorIndexConfig) -> Self {
        Self {
            db,
            seed,
            index_config,
            llm: None,
            embedder: None,
            index: None,
        }
    }

    /// Wire hosted clients as the config requires
    ///
    /// No client is built for a stage the config skips, so mock runs need
    /// no API keys.
    pub fn from_config(config: &InquiroConfig) -> Result<Self> {
        let db = KnowledgeDb::new(&config.database.path)?;
        let mut seeder = Self::new(db, config.seed.clone(), config.vector_index.clone());

        if !config.seed.skip_api_calls {
            seeder = seeder.with_llm(Arc::new(GeminiClient::for_extraction(&config.gemini)?));
        }

        if !config.seed.skip_vector_index {
            let embedder = GeminiClient::for_synthesis(&config.gemini)?;
            seeder = seeder
                .with_embedder(Arc::new(embedder))
                .with_vector_index(Arc::new(PineconeClient::new(&config.vector_index)?));
        }

        Ok(seeder)
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndexProvider>) -> Self {
        self.index = Some(index);
        self
    }

    /// Read the raw threads file
    pub async fn read_threads(path: &Path) -> Result<Vec<RawThread>> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read emails file {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Run the full pipeline
    pub async fn run(&self) -> Result<SeedReport> {
        tracing::info!("Starting seeding from {}", self.seed.emails_path.display());
        let mut report = SeedReport::default();

        let threads = Self::read_threads(&self.seed.emails_path).await?;
        report.threads_read = threads.len();
        tracing::info!("Read {} threads", threads.len());

        let extractions = if self.seed.skip_api_calls {
            tracing::info!("Skipping API calls, using mock extractions");
            mock_extractions()
        } else {
            self.extract(&threads).await?
        };
        report.extractions = extractions.len();

        // Mock extractions only reference the first thread's messages
        let stored_threads = if self.seed.skip_api_calls {
            1
        } else {
            self.seed.max_threads
        };
        let stored_threads = &threads[..stored_threads.min(threads.len())];

        self.populate(stored_threads, &extractions, &mut report)?;

        if self.seed.skip_vector_index {
            tracing::info!("Skipping vector index population");
        } else {
            report.index_created = self.ensure_index_ready().await?;
            self.index_pairs(&mut report).await?;
        }

        tracing::info!(
            "Seeding finished: {} pairs, {} edges, {} vectors",
            report.pairs_stored,
            report.edges_stored,
            report.vectors_upserted
        );
        Ok(report)
    }

    /// Extract pairs from the first `max_threads` threads, dropping failures
    async fn extract(&self, threads: &[RawThread]) -> Result<Vec<ExtractionResult>> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| Error::Config("No extraction model configured".to_string()))?;

        let to_process = &threads[..self.seed.max_threads.min(threads.len())];
        tracing::info!(
            "Extracting knowledge from {} threads with {}",
            to_process.len(),
            llm.model()
        );

        let limiter = RateLimiter::from_config(&self.seed);
        let results = limiter
            .process(to_process, |thread, _| {
                let prompt = PromptBuilder::extraction_prompt(thread);
                let llm = Arc::clone(llm);
                let thread_id = thread.id.clone();
                async move {
                    let reply = llm.generate(&prompt).await?;
                    parse_extraction(&reply).map_err(|e| {
                        tracing::error!("Thread {}: {}", thread_id, e);
                        e
                    })
                }
            })
            .await;

        let extractions: Vec<ExtractionResult> = results.into_iter().flatten().collect();
        tracing::info!("Extracted knowledge from {} threads", extractions.len());
        Ok(extractions)
    }

    /// Replace the database contents with the given threads and extractions
    ///
    /// A failure part way leaves the previous contents in place.
    fn populate(
        &self,
        threads: &[RawThread],
        extractions: &[ExtractionResult],
        report: &mut SeedReport,
    ) -> Result<()> {
        self.db
            .atomically(|| self.replace_rows(threads, extractions, report))
    }

    fn replace_rows(
        &self,
        threads: &[RawThread],
        extractions: &[ExtractionResult],
        report: &mut SeedReport,
    ) -> Result<()> {
        tracing::info!("Clearing old data");
        self.db.clear_all()?;

        let users = self
            .db
            .insert_users(threads.iter().flat_map(|t| t.participants()))?;
        report.users_stored = users.len();

        for raw in threads {
            let thread = self.db.insert_thread(&raw.subject)?;
            report.threads_stored += 1;

            for message in &raw.messages {
                let author_id = users.get(&message.sender).ok_or_else(|| {
                    Error::Internal(format!("No user for sender {}", message.sender))
                })?;
                self.db.insert_message(
                    &thread.id,
                    author_id,
                    &message.id,
                    &message.content,
                    parse_sent_at(&message.date),
                )?;
                report.messages_stored += 1;
            }
        }

        let message_ids = self.db.message_ids_by_original()?;

        for extraction in extractions {
            // Temporary ids ("kp_1") are only unique within one extraction
            let mut pair_ids: HashMap<&str, String> = HashMap::new();

            for extracted in &extraction.knowledge_pairs {
                let pair = self
                    .db
                    .insert_knowledge_pair(&extracted.question, &extracted.answer)?;
                report.pairs_stored += 1;

                for source in &extracted.source_message_ids {
                    match message_ids.get(source) {
                        Some(message_id) => {
                            self.db.link_source_message(&pair.id, message_id)?;
                            report.source_links += 1;
                        }
                        None => tracing::debug!("Skipping unknown source message {}", source),
                    }
                }

                pair_ids.insert(extracted.id.as_str(), pair.id);
            }

            for edge in &extraction.knowledge_edges {
                match (
                    pair_ids.get(edge.source_pair_id.as_str()),
                    pair_ids.get(edge.target_pair_id.as_str()),
                ) {
                    (Some(source), Some(target)) => {
                        self.db.insert_edge(source, target, edge.relationship_type)?;
                        report.edges_stored += 1;
                    }
                    _ => {
                        tracing::warn!(
                            "Skipping edge {} -> {}: unknown pair id",
                            edge.source_pair_id,
                            edge.target_pair_id
                        );
                        report.edges_skipped += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Database populated: {} threads, {} messages, {} pairs",
            report.threads_stored,
            report.messages_stored,
            report.pairs_stored
        );
        Ok(())
    }

    fn vector_index(&self) -> Result<&Arc<dyn VectorIndexProvider>> {
        self.index
            .as_ref()
            .ok_or_else(|| Error::Config("No vector index configured".to_string()))
    }

    /// Make sure the index exists, returning whether it was created
    ///
    /// Gives up waiting after the poll budget and proceeds anyway.
    async fn ensure_index_ready(&self) -> Result<bool> {
        let index = self.vector_index()?;
        let name = &self.index_config.index_name;

        let created = match index.describe_index().await? {
            Some(description) if description.ready => {
                tracing::info!("Index '{}' exists and is ready", name);
                return Ok(false);
            }
            Some(description) => {
                tracing::info!("Index '{}' exists but is {}", name, description.state);
                false
            }
            None => {
                tracing::info!("Index '{}' does not exist, creating it", name);
                index.create_index(&IndexSpec::from(&self.index_config)).await?;
                true
            }
        };

        let attempts = self.index_config.ready_poll_attempts;
        let interval = Duration::from_secs(self.index_config.ready_poll_interval_secs);

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            match index.describe_index().await {
                Ok(Some(description)) if description.ready => {
                    tracing::info!("Index '{}' is ready", name);
                    return Ok(created);
                }
                Ok(_) => tracing::info!("Waiting for index ({}/{})", attempt, attempts),
                Err(e) => tracing::debug!("Index still initializing ({}/{}): {}", attempt, attempts, e),
            }
        }

        tracing::warn!("Index '{}' not ready after {} checks, proceeding anyway", name, attempts);
        Ok(created)
    }

    /// Embed every stored pair and upsert the vectors
    async fn index_pairs(&self, report: &mut SeedReport) -> Result<()> {
        let index = self.vector_index()?;
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| Error::Config("No embedding model configured".to_string()))?;

        let pairs = self.db.list_knowledge_pairs()?;
        tracing::info!("Creating embeddings for {} knowledge pairs", pairs.len());

        let limiter = RateLimiter::from_config(&self.seed);
        let embeddings = limiter
            .process(&pairs, |pair, _| {
                let text = PromptBuilder::embedding_text(pair);
                let embedder = Arc::clone(embedder);
                async move { embedder.embed(&text).await }
            })
            .await;

        let vectors: Vec<VectorRecord> = pairs
            .iter()
            .zip(embeddings)
            .filter_map(|(pair, embedding)| embedding.map(|values| vector_record(pair, values)))
            .collect();
        report.embeddings_failed = pairs.len() - vectors.len();

        tracing::info!("Upserting {} vectors", vectors.len());
        for batch in vectors.chunks(self.index_config.upsert_batch_size.max(1)) {
            report.vectors_upserted += index.upsert(batch).await?;
        }

        Ok(())
    }
}

fn vector_record(pair: &KnowledgePair, values: Vec<f32>) -> VectorRecord {
    let mut metadata = HashMap::new();
    metadata.insert(
        "question".to_string(),
        serde_json::Value::String(pair.question.clone()),
    );

    VectorRecord {
        id: pair.id.clone(),
        values,
        metadata,
    }
}

/// Parse a message date from the emails file
///
/// Accepts RFC 3339, RFC 2822 and plain `YYYY-MM-DD[ HH:MM:SS]` (read as
/// UTC). Anything else is logged and stamped with the current time.
fn parse_sent_at(date: &str) -> DateTime<Utc> {
    let date = date.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(date) {
        return parsed.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(date, format) {
            return parsed.and_utc();
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return midnight.and_utc();
    }

    tracing::warn!("Unparseable message date '{}', using current time", date);
    Utc::now()
}
