//! Response gating: decide whether a chat reply should carry source citations
//!
//! Two independent checks feed the decision:
//! - question detection on the user's latest utterance, so small talk
//!   ("no thanks", "bye") never gets sources attached;
//! - non-answer detection on the generated reply, so farewells, follow-up
//!   offers and "I don't have enough information" admissions never get
//!   sources attached either.
//!
//! Both checks are pure and total over any input string.

pub mod rules;

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::error::Result;
pub use rules::{Effect, Matching, PhraseRule, PhraseTable, CLAUSE_DELIMITERS};

static DEFAULT_GATE: Lazy<ResponseGate> = Lazy::new(ResponseGate::default);

/// Lower-case, trim, and fold typographic apostrophes
pub(crate) fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('\u{2019}', "'")
}

/// Outcome of classifying one request/response turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    pub is_question: bool,
    pub is_substantive_answer: bool,
}

impl ClassificationResult {
    /// Citations are shown only for a question that received a real answer
    pub fn allows_citations(&self) -> bool {
        self.is_question && self.is_substantive_answer
    }

    /// Keep `sources` if citations are allowed, otherwise return an empty set
    pub fn gate<T>(&self, sources: Vec<T>) -> Vec<T> {
        if self.allows_citations() {
            sources
        } else {
            Vec::new()
        }
    }
}

/// Phrases for one effect, grouped by how they match
#[derive(Debug, Default)]
struct PhraseSet {
    whole: HashSet<String>,
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    contains: Vec<String>,
}

impl PhraseSet {
    fn from_table(table: &PhraseTable, effect: Effect) -> Self {
        let mut set = Self::default();
        for rule in table.rules_for(effect) {
            let phrase = rule.phrase.clone();
            match rule.matching {
                Matching::Whole => {
                    set.whole.insert(phrase);
                }
                Matching::Prefix => set.prefixes.push(phrase),
                Matching::Suffix => set.suffixes.push(phrase),
                Matching::Contains => set.contains.push(phrase),
            }
        }
        set
    }

    /// First way the normalized text matches this set, if any
    fn find(&self, text: &str) -> Option<Matching> {
        if self.matches_whole(text) {
            return Some(Matching::Whole);
        }
        if self.suffixes.iter().any(|s| text.ends_with(s.as_str())) {
            return Some(Matching::Suffix);
        }
        if self.prefixes.iter().any(|p| text.starts_with(p.as_str())) {
            return Some(Matching::Prefix);
        }
        if self.contains.iter().any(|c| text.contains(c.as_str())) {
            return Some(Matching::Contains);
        }
        None
    }

    /// Whole-string match: the text, or every clause of it, is a known phrase
    fn matches_whole(&self, text: &str) -> bool {
        if self.whole.is_empty() || text.is_empty() {
            return false;
        }
        if self.whole.contains(text) {
            return true;
        }

        let mut clauses = text
            .split(CLAUSE_DELIMITERS)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .peekable();

        clauses.peek().is_some() && clauses.all(|c| self.whole.contains(c))
    }
}

/// Classifier built from a phrase table
#[derive(Debug)]
pub struct ResponseGate {
    not_question: PhraseSet,
    question: PhraseSet,
    non_answer: PhraseSet,
}

impl ResponseGate {
    /// Build a gate from a table, rejecting rules that can never match
    pub fn new(table: &PhraseTable) -> Result<Self> {
        table.validate()?;
        Ok(Self::compile(table))
    }

    fn compile(table: &PhraseTable) -> Self {
        Self {
            not_question: PhraseSet::from_table(table, Effect::NotQuestion),
            question: PhraseSet::from_table(table, Effect::Question),
            non_answer: PhraseSet::from_table(table, Effect::NonAnswer),
        }
    }

    /// Is the user's utterance a question worth citing sources for?
    ///
    /// Closing phrases win over everything; unmatched input defaults to
    /// `true` since a superfluous citation costs less than a missing one.
    pub fn is_question(&self, utterance: &str) -> bool {
        let text = normalize(utterance);

        if let Some(how) = self.not_question.find(&text) {
            tracing::debug!(?how, "utterance is a closing phrase");
            return false;
        }

        if let Some(how) = self.question.find(&text) {
            tracing::debug!(?how, "utterance has a question signal");
            return true;
        }

        tracing::debug!("no question signal, defaulting to question");
        true
    }

    /// Does the generated reply decline to answer substantively?
    pub fn is_non_answer(&self, reply: &str) -> bool {
        let text = normalize(reply);
        let found = self.non_answer.find(&text);
        tracing::debug!(non_answer = found.is_some(), ?found, "checked reply");
        found.is_some()
    }

    /// Classify one turn
    pub fn classify(&self, user_query: &str, model_reply: &str) -> ClassificationResult {
        ClassificationResult {
            is_question: self.is_question(user_query),
            is_substantive_answer: !self.is_non_answer(model_reply),
        }
    }
}

impl Default for ResponseGate {
    fn default() -> Self {
        Self::compile(&PhraseTable::builtin())
    }
}

/// [`ResponseGate::is_question`] with the built-in phrase table
pub fn is_question(utterance: &str) -> bool {
    DEFAULT_GATE.is_question(utterance)
}

/// [`ResponseGate::is_non_answer`] with the built-in phrase table
pub fn is_non_answer(reply: &str) -> bool {
    DEFAULT_GATE.is_non_answer(reply)
}

/// Whether citations should accompany `model_reply` to `user_query`
pub fn should_attach_sources(user_query: &str, model_reply: &str) -> bool {
    DEFAULT_GATE.classify(user_query, model_reply).allows_citations()
}
