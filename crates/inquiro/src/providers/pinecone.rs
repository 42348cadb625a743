//! Pinecone serverless index client
//!
//! Control-plane calls (describe/create) go to the global API; upsert and
//! query go to the per-index data-plane host, which is resolved from the
//! index description and cached.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::VectorIndexConfig;
use crate::error::{Error, Result};
use crate::providers::vector_index::{
    IndexDescription, IndexSpec, VectorIndexProvider, VectorMatch, VectorRecord,
};

/// Pinecone client bound to one index
pub struct PineconeClient {
    http: reqwest::Client,
    api_key: String,
    api_version: String,
    control_plane_url: String,
    index_name: String,
    /// Cached data-plane host
    host: RwLock<Option<String>>,
}

impl PineconeClient {
    /// Create a new client
    pub fn new(config: &VectorIndexConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("PINECONE_API_KEY is not set".to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
            host: RwLock::new(None),
        })
    }

    /// Use a known data-plane host instead of resolving it
    pub fn with_host(self, host: impl Into<String>) -> Self {
        Self {
            host: RwLock::new(Some(normalize_host(&host.into()))),
            ..self
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
    }

    /// Resolve and cache the data-plane host
    async fn data_host(&self) -> Result<String> {
        {
            let cached = self.host.read().await;
            if let Some(host) = cached.as_ref() {
                return Ok(host.clone());
            }
        }

        let description = self.describe_index().await?.ok_or_else(|| {
            Error::VectorIndex(format!("Index '{}' does not exist", self.index_name))
        })?;

        let host = normalize_host(&description.host);
        *self.host.write().await = Some(host.clone());
        Ok(host)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::VectorIndex(format!(
            "Pinecone {} failed with {}: {}",
            action, status, body
        )))
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(serde::Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(serde::Deserialize, Default)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(serde::Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: ServerlessSpec<'a>,
}

#[derive(serde::Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudRegion<'a>,
}

#[derive(serde::Serialize)]
struct CloudRegion<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(serde::Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(serde::Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(serde::Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
}

#[async_trait]
impl VectorIndexProvider for PineconeClient {
    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.control_plane_url, self.index_name);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Error::VectorIndex(format!("Describe request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let model: IndexModel = Self::check(response, "describe")
            .await?
            .json()
            .await
            .map_err(|e| Error::VectorIndex(format!("Failed to parse index description: {}", e)))?;

        Ok(Some(IndexDescription {
            name: model.name,
            dimension: model.dimension,
            host: model.host,
            ready: model.status.ready,
            state: model.status.state,
        }))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        tracing::info!(
            "Creating Pinecone index '{}' (dimension {}, {})",
            spec.name,
            spec.dimension,
            spec.metric
        );

        let body = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: &spec.metric,
            spec: ServerlessSpec {
                serverless: CloudRegion {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
        };

        let response = self
            .request(reqwest::Method::POST, &format!("{}/indexes", self.control_plane_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::VectorIndex(format!("Create request failed: {}", e)))?;

        Self::check(response, "create").await?;
        Ok(())
    }

    async fn upsert(&self, vectors: &[VectorRecord]) -> Result<usize> {
        if vectors.is_empty() {
            return Ok(0);
        }

        let host = self.data_host().await?;
        let response = self
            .request(reqwest::Method::POST, &format!("{}/vectors/upsert", host))
            .json(&UpsertRequest { vectors })
            .send()
            .await
            .map_err(|e| Error::VectorIndex(format!("Upsert request failed: {}", e)))?;

        let result: UpsertResponse = Self::check(response, "upsert")
            .await?
            .json()
            .await
            .map_err(|e| Error::VectorIndex(format!("Failed to parse upsert response: {}", e)))?;

        tracing::debug!("Upserted {} vectors", result.upserted_count);
        Ok(result.upserted_count)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let host = self.data_host().await?;
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response = self
            .request(reqwest::Method::POST, &format!("{}/query", host))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::VectorIndex(format!("Query request failed: {}", e)))?;

        let result: QueryResponse = Self::check(response, "query")
            .await?
            .json()
            .await
            .map_err(|e| Error::VectorIndex(format!("Failed to parse query response: {}", e)))?;

        Ok(result
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self
            .describe_index()
            .await?
            .map(|d| d.ready)
            .unwrap_or(false))
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
