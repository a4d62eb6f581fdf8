/// Configuration module for greenlens.
///
/// Handles loading, validating, and providing default configuration values
/// for the index build and the online pipeline.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_index_dir() -> String {
    "./index_out".to_string()
}

fn default_window_sentences() -> usize {
    3
}

fn default_stride_sentences() -> usize {
    1
}

fn default_min_chars() -> usize {
    50
}

fn default_max_chars() -> usize {
    800
}

fn default_embed_batch_size() -> usize {
    64
}

fn default_retrieve_top_k() -> usize {
    50
}

fn default_passages_per_company() -> usize {
    12
}

fn default_cite_excerpt_chars() -> usize {
    160
}

fn default_model_name() -> String {
    "paraphrase-multilingual-MiniLM-L12-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_embed_timeout_secs() -> u64 {
    20
}

fn default_llm_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_feed_base_url() -> String {
    "https://news.google.com/rss/search".to_string()
}

fn default_feed_lang() -> String {
    "zh-TW".to_string()
}

fn default_feed_region() -> String {
    "TW".to_string()
}

fn default_feed_edition() -> String {
    "TW:zh-Hant".to_string()
}

fn default_feed_per_query_limit() -> usize {
    10
}

fn default_feed_timeout_secs() -> u64 {
    10
}

fn default_max_candidates() -> usize {
    12
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory of extracted report text files (one per company report).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory holding the vector index and metadata artifacts.
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    #[serde(default)]
    pub chunk: ChunkConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub feed: FeedConfig,
}

/// Sentence-window chunking parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkConfig {
    /// Sentences per chunk.
    #[serde(default = "default_window_sentences")]
    pub window_sentences: usize,

    /// Sentences advanced between consecutive chunks. Overlap is
    /// `window_sentences - stride_sentences`.
    #[serde(default = "default_stride_sentences")]
    pub stride_sentences: usize,

    /// Chunks shorter than this are dropped. 0 disables the bound.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Chunks longer than this are dropped. 0 disables the bound.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Nearest neighbours pulled from the index per query.
    #[serde(default = "default_retrieve_top_k")]
    pub retrieve_top_k: usize,

    /// Passages of the selected company handed to the generator.
    #[serde(default = "default_passages_per_company")]
    pub passages_per_company: usize,

    /// Max excerpt length when echoing cited chunks back to the caller.
    #[serde(default = "default_cite_excerpt_chars")]
    pub cite_excerpt_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Embedding service endpoint. Empty selects the offline hashed-ngram
    /// embedder (useful for smoke runs without the service).
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,

    #[serde(default = "default_feed_lang")]
    pub lang: String,

    #[serde(default = "default_feed_region")]
    pub region: String,

    #[serde(default = "default_feed_edition")]
    pub edition: String,

    #[serde(default = "default_feed_per_query_limit")]
    pub per_query_limit: usize,

    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,

    /// Cap on candidates returned after dedupe and scoring.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            index_dir: default_index_dir(),
            chunk: ChunkConfig::default(),
            retrieval: RetrievalConfig::default(),
            model: ModelConfig::default(),
            llm: LlmConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window_sentences: default_window_sentences(),
            stride_sentences: default_stride_sentences(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            retrieve_top_k: default_retrieve_top_k(),
            passages_per_company: default_passages_per_company(),
            cite_excerpt_chars: default_cite_excerpt_chars(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dimensions: default_dimensions(),
            endpoint: String::new(),
            batch_size: default_embed_batch_size(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            lang: default_feed_lang(),
            region: default_feed_region(),
            edition: default_feed_edition(),
            per_query_limit: default_feed_per_query_limit(),
            timeout_secs: default_feed_timeout_secs(),
            max_candidates: default_max_candidates(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.chunk.window_sentences > 0,
            "chunk.window_sentences must be positive"
        );
        anyhow::ensure!(
            self.chunk.stride_sentences > 0,
            "chunk.stride_sentences must be positive"
        );
        anyhow::ensure!(
            self.chunk.stride_sentences <= self.chunk.window_sentences,
            "chunk.stride_sentences must not exceed chunk.window_sentences"
        );
        anyhow::ensure!(
            self.retrieval.retrieve_top_k > 0,
            "retrieval.retrieve_top_k must be positive"
        );
        anyhow::ensure!(
            self.retrieval.passages_per_company > 0,
            "retrieval.passages_per_company must be positive"
        );
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(self.model.batch_size > 0, "model.batch_size must be positive");
        anyhow::ensure!(
            self.feed.max_candidates > 0,
            "feed.max_candidates must be positive"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
