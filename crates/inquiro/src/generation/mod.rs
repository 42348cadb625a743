//! Prompt construction and parsing of model replies

pub mod extraction;
pub mod prompt;

pub use extraction::parse_extraction;
pub use prompt::PromptBuilder;
