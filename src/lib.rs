//! # greenlens — greenwashing risk screening pipeline
//!
//! Cross-validates a company's self-reported sustainability commitments
//! against externally reported negative events and produces a
//! natural-language risk narrative.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, defaults
//! - **[`chunker`]** — Sentence-window chunking of extracted report text
//! - **[`embedder`]** — Text embedding (remote HTTP service or hashed-ngram fallback)
//! - **[`index`]** — Flat vector index + aligned metadata store (build, load, search)
//! - **[`llm`]** — Text-generation capability (Ollama HTTP, scripted test double)
//! - **[`feed`]** — Public news feed source (Google News RSS, replay test double)
//! - **[`schema`]** — Shared typed results exchanged between agents
//! - **[`agents`]** — Commitment extraction (A), event collection (C), synthesis (D)
//! - **[`orchestrator`]** — Concurrent A ‖ C dispatch, joined before D

pub mod agents;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod feed;
pub mod index;
pub mod llm;
pub mod orchestrator;
pub mod schema;
