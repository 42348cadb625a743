//! Phrase table driving the response-gating classifier
//!
//! Each row maps a phrase to how it is matched and what a match means.
//! The built-in table can be replaced by a TOML file of the form:
//!
//! ```toml
//! [[rule]]
//! phrase = "no thanks"
//! matching = "whole"
//! effect = "not_question"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Characters that separate clauses for whole-string matching
pub const CLAUSE_DELIMITERS: &[char] = &[',', ';', '.', '!', '?'];

/// How a phrase is compared against normalized text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matching {
    /// The entire text (or every clause of it) equals a phrase
    Whole,
    /// Text starts with the phrase
    Prefix,
    /// Text ends with the phrase
    Suffix,
    /// Phrase appears anywhere in the text
    Contains,
}

/// What a match means for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// User utterance is closing or declining, not a question
    NotQuestion,
    /// User utterance is a question or request
    Question,
    /// Model reply does not substantively answer
    NonAnswer,
}

/// One row of the phrase table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRule {
    pub phrase: String,
    pub matching: Matching,
    pub effect: Effect,
}

impl PhraseRule {
    pub fn new(phrase: impl Into<String>, matching: Matching, effect: Effect) -> Self {
        Self {
            phrase: phrase.into(),
            matching,
            effect,
        }
    }
}

/// A replaceable table of phrase rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseTable {
    #[serde(rename = "rule", default)]
    pub rules: Vec<PhraseRule>,
}

const CLOSING_PHRASES: &[&str] = &[
    "nah",
    "no",
    "nope",
    "not really",
    "i'm good",
    "that's all",
    "thanks",
    "thank you",
    "bye",
    "goodbye",
    "see you",
    "that's it",
    "no thanks",
    "no thank you",
    "i don't think so",
    "not right now",
    "maybe later",
    "that's all i need",
    "i'm done",
    "that's everything",
    "nothing else",
];

const QUESTION_SUFFIXES: &[&str] = &["?"];

const INTERROGATIVE_PREFIXES: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can you", "could you", "would you",
    "do you", "does", "is", "are", "was", "were", "will", "should", "might", "may",
];

const REQUEST_PREFIXES: &[&str] = &[
    "tell me",
    "explain",
    "describe",
    "show me",
    "help me",
    "i need",
    "i want to know",
    "i'm looking for",
];

const FAREWELL_REPLIES: &[&str] = &[
    "goodbye",
    "bye",
    "see you",
    "take care",
    "have a great day",
    "thanks for chatting",
];

const FOLLOW_UP_REPLIES: &[&str] = &[
    "is there anything else i can help you with",
    "can i help you with anything else",
    "what else can i help you with",
    "let me know if you need anything else",
    "feel free to ask if you have more questions",
    "i'm here if you need anything else",
    "just let me know if you have other questions",
];

const INSUFFICIENT_INFORMATION: &[&str] = &[
    "i don't have enough information",
    "i don't have sufficient information",
    "i don't have the information needed",
    "i don't have enough context",
    "i don't have enough data",
    "the context doesn't contain the answer",
    "the provided context doesn't include",
    "the information isn't available in the context",
];

impl PhraseTable {
    /// The built-in English phrase table
    pub fn builtin() -> Self {
        let mut rules = Vec::new();

        let mut push = |phrases: &[&str], matching: Matching, effect: Effect| {
            rules.extend(
                phrases
                    .iter()
                    .map(|p| PhraseRule::new(*p, matching, effect)),
            );
        };

        push(CLOSING_PHRASES, Matching::Whole, Effect::NotQuestion);
        push(QUESTION_SUFFIXES, Matching::Suffix, Effect::Question);
        push(INTERROGATIVE_PREFIXES, Matching::Prefix, Effect::Question);
        push(REQUEST_PREFIXES, Matching::Prefix, Effect::Question);
        push(FAREWELL_REPLIES, Matching::Whole, Effect::NonAnswer);
        push(FOLLOW_UP_REPLIES, Matching::Whole, Effect::NonAnswer);
        push(INSUFFICIENT_INFORMATION, Matching::Contains, Effect::NonAnswer);

        Self { rules }
    }

    /// Parse a table from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid phrase table: {}", e)))?;
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read phrase table {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check that every rule can actually match normalized text
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            if rule.phrase.trim().is_empty() {
                return Err(Error::Config("Phrase table contains an empty phrase".to_string()));
            }
            if rule.phrase != super::normalize(&rule.phrase) {
                return Err(Error::Config(format!(
                    "Phrase '{}' must be lower-case and trimmed",
                    rule.phrase
                )));
            }
            if rule.matching == Matching::Whole && rule.phrase.contains(CLAUSE_DELIMITERS) {
                return Err(Error::Config(format!(
                    "Whole-string phrase '{}' must not contain clause punctuation",
                    rule.phrase
                )));
            }
        }
        Ok(())
    }

    /// Rules with the given effect
    pub fn rules_for(&self, effect: Effect) -> impl Iterator<Item = &PhraseRule> {
        self.rules.iter().filter(move |r| r.effect == effect)
    }
}

impl Default for PhraseTable {
    fn default() -> Self {
        Self::builtin()
    }
}
