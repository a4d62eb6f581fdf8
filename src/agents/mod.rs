//! The three sub-agents of the pipeline.
//!
//! - [`commitments`] — Agent A: semantic retrieval + structured claim extraction
//! - [`events`] — Agent C: news candidate collection and scoring
//! - [`synthesis`] — Agent D: reconciliation into one risk assessment
//!
//! A and C know nothing about each other; D consumes both their typed
//! outputs. Failures stay inside the owning agent as values.

pub mod commitments;
pub mod events;
pub mod synthesis;

use thiserror::Error;

use crate::embedder::EmbedderError;
use crate::index::IndexError;
use crate::llm::LlmError;

/// A sub-agent failure the orchestrator turns into an `unavailable` section.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbedderError),

    #[error(transparent)]
    Generation(#[from] LlmError),
}

impl AgentError {
    /// Machine-readable kind for the section envelope. `index_missing` is
    /// kept distinct so callers can tell a setup problem from a no-match.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Index(IndexError::Missing { .. }) => "index_missing",
            Self::Index(_) => "index_error",
            Self::Embedding(_) => "embedding_failed",
            Self::Generation(_) => "generation_failed",
        }
    }
}

/// Case-fold and strip whitespace for fuzzy name/keyword comparison.
/// Report stems and user input are never normalized consistently
/// (e.g. 「台塑 2024」 vs 「台塑2024」), so comparisons go through this.
pub(crate) fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
