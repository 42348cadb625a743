//! In-process provider fakes shared by pipeline and handler tests

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::providers::{
    EmbeddingProvider, IndexDescription, IndexSpec, LlmProvider, VectorIndexProvider,
    VectorMatch, VectorRecord,
};

type Responder<T> = Box<dyn Fn(&str) -> Result<T> + Send + Sync>;

/// LLM answering every prompt through a closure
pub struct FakeLlm {
    respond: Responder<String>,
    healthy: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(respond: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            healthy: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail health checks
    pub fn unhealthy(self) -> Self {
        Self {
            healthy: false,
            ..self
        }
    }

    pub fn replying(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        (self.respond)(prompt)
    }

    async fn health_check(&self) -> Result<bool> {
        if self.healthy {
            Ok(true)
        } else {
            Err(Error::Llm("model unavailable".to_string()))
        }
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Embedder producing a small deterministic vector
pub struct FakeEmbedder {
    respond: Responder<Vec<f32>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::with(|text| Ok(vec![text.len() as f32, 1.0, 0.0]))
    }

    pub fn with(respond: impl Fn(&str) -> Result<Vec<f32>> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
        }
    }

    /// Fails for any text containing `needle`
    pub fn failing_on(needle: &str) -> Self {
        let needle = needle.to_string();
        Self::with(move |text| {
            if text.contains(&needle) {
                Err(Error::Embedding("quota exceeded".to_string()))
            } else {
                Ok(vec![1.0, 0.0, 0.0])
            }
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (self.respond)(text)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Vector index holding state in memory
pub struct FakeIndex {
    pub description: Mutex<Option<IndexDescription>>,
    pub created: Mutex<Vec<IndexSpec>>,
    pub upserted: Mutex<Vec<VectorRecord>>,
    pub upsert_calls: Mutex<usize>,
    matches: Vec<VectorMatch>,
}

impl FakeIndex {
    /// An index that does not exist yet
    pub fn missing() -> Self {
        Self {
            description: Mutex::new(None),
            created: Mutex::new(Vec::new()),
            upserted: Mutex::new(Vec::new()),
            upsert_calls: Mutex::new(0),
            matches: Vec::new(),
        }
    }

    /// A ready index answering every query with `matches`
    pub fn ready_with_matches(matches: Vec<VectorMatch>) -> Self {
        let index = Self {
            matches,
            ..Self::missing()
        };
        *index.description.lock() = Some(IndexDescription {
            name: "knowledge-base-index".to_string(),
            dimension: 3,
            host: "fake".to_string(),
            ready: true,
            state: "Ready".to_string(),
        });
        index
    }
}

#[async_trait]
impl VectorIndexProvider for FakeIndex {
    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        Ok(self.description.lock().clone())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        self.created.lock().push(spec.clone());
        *self.description.lock() = Some(IndexDescription {
            name: spec.name.clone(),
            dimension: spec.dimension,
            host: "fake".to_string(),
            ready: true,
            state: "Ready".to_string(),
        });
        Ok(())
    }

    async fn upsert(&self, vectors: &[VectorRecord]) -> Result<usize> {
        *self.upsert_calls.lock() += 1;
        self.upserted.lock().extend_from_slice(vectors);
        Ok(vectors.len())
    }

    async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.description.lock().is_some())
    }

    fn name(&self) -> &str {
        "fake"
    }
}
