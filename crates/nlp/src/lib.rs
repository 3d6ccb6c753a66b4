//! # clinq NLP
//!
//! Query interpretation for the clinical query service.
//!
//! This crate turns free text into structured evidence, in three layers:
//! - [`lexer`]: tokenising, lemmatising and part-of-speech tagging
//! - [`intent`]: keyword scoring into one of a closed set of intents
//! - [`entities`]: age, gender, condition and result-limit extraction
//!
//! Keyword, synonym and cue tables live in [`vocabulary`] and are loaded once at startup from
//! YAML. Everything here is pure: no I/O after loading, no shared mutable state.
//!
//! **No repository concerns**: what a query *means* for a data source belongs in `clinq-core`.

pub mod entities;
pub mod intent;
pub mod lexer;
pub mod vocabulary;

pub use entities::{AgeFilter, EntityExtractor, EntitySet, Gender};
pub use intent::{Intent, IntentClassifier};
pub use lexer::{LexicalAnalyzer, NormalizedToken, PartOfSpeech, DEFAULT_MAX_QUERY_LENGTH};
pub use vocabulary::{ConditionConcept, Vocabulary};

use std::path::PathBuf;

/// Errors raised while analysing a query.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("query is {length} characters long; the maximum is {max}")]
    InputTooLong { length: usize, max: usize },
}

/// Errors raised while loading vocabulary tables.
#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
    #[error("failed to read vocabulary file {path}: {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid vocabulary YAML: {0}")]
    Parse(String),
    #[error("invalid vocabulary: {0}")]
    Invalid(String),
}
