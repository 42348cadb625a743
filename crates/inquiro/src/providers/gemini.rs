//! Gemini client for embeddings and generation via the Generative Language API
//!
//! One client serves both roles: `generate` uses the generation model it was
//! built with, `embed` uses the configured embedding model.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::llm::LlmProvider;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    generate_model: String,
    embed_model: String,
}

impl GeminiClient {
    /// Create a client generating with `generate_model`
    pub fn new(config: &GeminiConfig, generate_model: impl Into<String>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("GOOGLE_API_KEY is not set".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            generate_model: generate_model.into(),
            embed_model: config.embedding_model.clone(),
        })
    }

    /// Client for answer synthesis
    pub fn for_synthesis(config: &GeminiConfig) -> Result<Self> {
        Self::new(config, config.synthesis_model.clone())
    }

    /// Client for knowledge extraction
    pub fn for_extraction(config: &GeminiConfig) -> Result<Self> {
        Self::new(config, config.extraction_model.clone())
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// Whether the API key can see `model`
    async fn model_available(&self, model: &str) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/models/{}", self.base_url, model))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn post<B: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        wrap: fn(String) -> Error,
    ) -> Result<R> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| wrap(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(wrap(format!("Gemini returned {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| wrap(format!("Failed to parse Gemini response: {}", e)))
    }

}

#[derive(serde::Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Part {
    text: String,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(serde::Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(serde::Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(serde::Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 2048,
            },
        };

        let response: GenerateResponse = self
            .post(
                &self.endpoint(&self.generate_model, "generateContent"),
                &request,
                Error::Llm,
            )
            .await?;

        // Join all text parts of the first candidate
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(Error::Llm("No text in Gemini response".to_string()));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        self.model_available(&self.generate_model).await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.generate_model
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: format!("models/{}", self.embed_model),
            content: Content {
                role: None,
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let response: EmbedResponse = self
            .post(
                &self.endpoint(&self.embed_model, "embedContent"),
                &request,
                Error::Embedding,
            )
            .await?;
        Ok(response.embedding.values)
    }

    async fn health_check(&self) -> Result<bool> {
        self.model_available(&self.embed_model).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
