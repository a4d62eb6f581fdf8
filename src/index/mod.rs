//! Vector index and metadata store.
//!
//! Two co-located artifacts, positionally aligned 1:1 and regenerated only
//! together by [`builder::IndexBuilder`]:
//!
//! - `vectors.bin` — magic, dimension, row count, then row-major
//!   little-endian `f32` embedding rows
//! - `meta.json` — embedding model id, dimension, and one chunk record per
//!   vector row (row `i` describes vector `i`)
//!
//! The store is loaded once at startup and is read-only afterwards;
//! concurrent readers never need a lock.

pub mod builder;

use std::path::Path;

use thiserror::Error;

use crate::chunker::Chunk;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const META_FILE: &str = "meta.json";

const MAGIC: [u8; 4] = *b"GLV1";
const HEADER_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum IndexError {
    /// No artifacts on disk. A setup problem, distinct from an empty result.
    #[error("similarity index not found under {dir}; run the index build first")]
    Missing { dir: String },

    #[error("index artifact corrupt: {0}")]
    Corrupt(String),

    #[error("index misaligned: {vectors} vector rows vs {entries} metadata entries")]
    Misaligned { vectors: usize, entries: usize },

    #[error("query dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("corpus produced no embeddable chunks")]
    EmptyCorpus,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("metadata encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Metadata artifact layout.
#[derive(serde::Serialize, serde::Deserialize)]
struct MetaFile {
    model: String,
    dimensions: usize,
    chunks: Vec<Chunk>,
}

/// One search hit: the ordinal row of the index plus its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk {
    pub ordinal: usize,
    pub score: f32,
}

/// In-memory, read-only view over the two artifacts.
#[derive(Debug)]
pub struct IndexStore {
    model: String,
    dimensions: usize,
    /// Row-major, `len * dimensions` floats.
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl IndexStore {
    /// Load both artifacts from `dir`, verifying alignment.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let vec_path = dir.join(VECTORS_FILE);
        let meta_path = dir.join(META_FILE);

        if !vec_path.exists() || !meta_path.exists() {
            return Err(IndexError::Missing {
                dir: dir.display().to_string(),
            });
        }

        let bytes = std::fs::read(&vec_path)?;
        if bytes.len() < HEADER_LEN {
            return Err(IndexError::Corrupt("vector file shorter than header".into()));
        }
        if bytes[0..4] != MAGIC {
            return Err(IndexError::Corrupt("bad magic in vector file".into()));
        }
        let dimensions = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let count = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;

        let expected = HEADER_LEN + count * dimensions * 4;
        if bytes.len() != expected {
            return Err(IndexError::Corrupt(format!(
                "vector file is {} bytes, expected {expected}",
                bytes.len()
            )));
        }

        let mut vectors = Vec::with_capacity(count * dimensions);
        for raw in bytes[HEADER_LEN..].chunks_exact(4) {
            vectors.push(f32::from_le_bytes(raw.try_into().unwrap()));
        }

        let meta_raw = std::fs::read_to_string(&meta_path)?;
        let meta: MetaFile = serde_json::from_str(&meta_raw)?;

        if meta.dimensions != dimensions {
            return Err(IndexError::Corrupt(format!(
                "metadata dimension {} disagrees with vector file dimension {dimensions}",
                meta.dimensions
            )));
        }
        if meta.chunks.len() != count {
            return Err(IndexError::Misaligned {
                vectors: count,
                entries: meta.chunks.len(),
            });
        }

        tracing::info!(
            "Loaded index: {count} chunks, dim {dimensions}, model {}",
            meta.model
        );

        Ok(Self {
            model: meta.model,
            dimensions,
            vectors,
            chunks: meta.chunks,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Model id the vectors were produced with.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model
    }

    /// Chunk record at ordinal `i` (aligned with vector row `i`).
    #[must_use]
    pub fn chunk(&self, ordinal: usize) -> Option<&Chunk> {
        self.chunks.get(ordinal)
    }

    /// Vector row at ordinal `i`.
    #[must_use]
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let start = ordinal.checked_mul(self.dimensions)?;
        self.vectors.get(start..start + self.dimensions)
    }

    /// Exact nearest-neighbour search by inner product (vectors are
    /// normalized, so this is cosine similarity). Results come back in
    /// descending score order; equal scores break toward the lowest ordinal
    /// so repeated queries are stable.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let mut scored: Vec<ScoredChunk> = self
            .vectors
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(ordinal, row)| ScoredChunk {
                ordinal,
                score: dot(query, row),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Serialize vector rows into the on-disk artifact layout.
fn serialize_vectors(dimensions: usize, rows: &[Vec<f32>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + rows.len() * dimensions * 4);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&(dimensions as u32).to_le_bytes());
    bytes.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    for row in rows {
        for v in row {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    bytes
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::builder::IndexBuilder;
    use super::*;
    use crate::chunker::Chunk;
    use crate::embedder::{Embedder, EmbedderError};
    use tempfile::tempdir;

    /// Returns the same vector for every input — all scores tie.
    struct ConstEmbedder;

    impl Embedder for ConstEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
        fn dimensions(&self) -> usize {
            4
        }
        fn model_id(&self) -> &str {
            "const"
        }
    }

    fn sample_chunk(id: u32, company: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id,
            company: company.to_string(),
            year: Some(2024),
            page: 1,
            text: text.to_string(),
            source_document: format!("{company}2024"),
        }
    }

    #[test]
    fn test_load_missing_artifacts() {
        let dir = tempdir().unwrap();
        match IndexStore::load(dir.path()) {
            Err(IndexError::Missing { .. }) => {}
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn test_serialize_vectors_layout() {
        let bytes = serialize_vectors(2, &[vec![1.0, 2.0]]);
        assert_eq!(&bytes[0..4], b"GLV1");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 1);
        // 1.0f32 little endian: 00 00 80 3f
        assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x80, 0x3f]);
        // 2.0f32 little endian: 00 00 00 40
        assert_eq!(&bytes[16..20], &[0x00, 0x00, 0x00, 0x40]);
    }

    #[test]
    fn test_corrupt_vector_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(VECTORS_FILE), b"NOPE").unwrap();
        std::fs::write(dir.path().join(META_FILE), "{}").unwrap();
        match IndexStore::load(dir.path()) {
            Err(IndexError::Corrupt(_)) => {}
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let builder = IndexBuilder::new(&ConstEmbedder, 8);
        builder
            .build(vec![sample_chunk(0, "甲", "一。")], dir.path())
            .unwrap();

        let store = IndexStore::load(dir.path()).unwrap();
        match store.search(&[1.0, 0.0], 5) {
            Err(IndexError::DimensionMismatch { expected: 4, got: 2 }) => {}
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_tie_break_is_lowest_ordinal() {
        let dir = tempdir().unwrap();
        let chunks = vec![
            sample_chunk(0, "甲", "一。"),
            sample_chunk(1, "甲", "二。"),
            sample_chunk(2, "甲", "三。"),
        ];
        let builder = IndexBuilder::new(&ConstEmbedder, 8);
        builder.build(chunks, dir.path()).unwrap();

        let store = IndexStore::load(dir.path()).unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        // All scores equal: lowest ordinals win, in order.
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].ordinal, 0);
        assert_eq!(hits[1].ordinal, 1);
    }
}
