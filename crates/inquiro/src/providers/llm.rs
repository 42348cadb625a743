//! LLM provider trait for text generation

use async_trait::async_trait;
use crate::error::Result;

/// Trait for hosted text generation
///
/// Prompts are fully assembled by the caller (see `generation::PromptBuilder`),
/// so the same provider serves both answer synthesis and knowledge extraction.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a single-turn prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
