//! Wholesale index build: embed every chunk, then atomically swap both
//! artifacts into place.
//!
//! Rebuilding replaces the previous index entirely; there is no incremental
//! update. Artifacts are written to `.tmp` siblings first and renamed last,
//! so a reader loading at startup sees either the old pair or the new pair,
//! never a half-written file.

use std::path::Path;

use tracing::{info, warn};

use super::{IndexError, META_FILE, MetaFile, VECTORS_FILE, serialize_vectors};
use crate::chunker::Chunk;
use crate::embedder::Embedder;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Chunks embedded and written into the index.
    pub embedded: usize,
    /// Chunks dropped because their embedding failed.
    pub skipped: usize,
}

pub struct IndexBuilder<'a, E: Embedder + ?Sized> {
    embedder: &'a E,
    batch_size: usize,
}

impl<'a, E: Embedder + ?Sized> IndexBuilder<'a, E> {
    pub fn new(embedder: &'a E, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed `chunks` and persist both artifacts under `out_dir`.
    ///
    /// A chunk whose embedding fails is skipped and logged; the build only
    /// aborts when nothing at all could be embedded.
    pub fn build<I>(&self, chunks: I, out_dir: &Path) -> Result<BuildReport, IndexError>
    where
        I: IntoIterator<Item = Chunk>,
    {
        let mut report = BuildReport::default();
        let mut kept: Vec<Chunk> = Vec::new();
        let mut rows: Vec<Vec<f32>> = Vec::new();
        let mut batch: Vec<Chunk> = Vec::new();

        for chunk in chunks {
            batch.push(chunk);
            if batch.len() == self.batch_size {
                self.embed_batch_into(&mut batch, &mut kept, &mut rows, &mut report);
            }
        }
        if !batch.is_empty() {
            self.embed_batch_into(&mut batch, &mut kept, &mut rows, &mut report);
        }

        if kept.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        self.write_artifacts(out_dir, &kept, &rows)?;

        info!(
            "Index built: {} chunks embedded, {} skipped, model {}",
            report.embedded,
            report.skipped,
            self.embedder.model_id()
        );
        Ok(report)
    }

    /// Embed one batch, falling back to per-chunk embedding when the batch
    /// call fails so a single bad chunk cannot sink its neighbours.
    fn embed_batch_into(
        &self,
        batch: &mut Vec<Chunk>,
        kept: &mut Vec<Chunk>,
        rows: &mut Vec<Vec<f32>>,
        report: &mut BuildReport,
    ) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        match self.embedder.embed_batch(&texts) {
            Ok(vectors) => {
                report.embedded += batch.len();
                rows.extend(vectors);
                kept.append(batch);
            }
            Err(batch_err) => {
                warn!("Batch embedding failed ({batch_err}), retrying chunk by chunk");
                for chunk in batch.drain(..) {
                    match self.embedder.embed(&chunk.text) {
                        Ok(vector) => {
                            report.embedded += 1;
                            rows.push(vector);
                            kept.push(chunk);
                        }
                        Err(e) => {
                            report.skipped += 1;
                            warn!(
                                "Skipping chunk {}#{}: {e}",
                                chunk.source_document, chunk.chunk_id
                            );
                        }
                    }
                }
            }
        }
    }

    fn write_artifacts(
        &self,
        out_dir: &Path,
        chunks: &[Chunk],
        rows: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        std::fs::create_dir_all(out_dir)?;

        let vec_path = out_dir.join(VECTORS_FILE);
        let meta_path = out_dir.join(META_FILE);
        let vec_tmp = out_dir.join(format!("{VECTORS_FILE}.tmp"));
        let meta_tmp = out_dir.join(format!("{META_FILE}.tmp"));

        let dimensions = self.embedder.dimensions();
        std::fs::write(&vec_tmp, serialize_vectors(dimensions, rows))?;

        let meta = MetaFile {
            model: self.embedder.model_id().to_string(),
            dimensions,
            chunks: chunks.to_vec(),
        };
        std::fs::write(&meta_tmp, serde_json::to_string_pretty(&meta)?)?;

        // Both temporaries are complete; swap them in.
        std::fs::rename(&vec_tmp, &vec_path)?;
        std::fs::rename(&meta_tmp, &meta_path)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::EmbedderError;
    use crate::embedder::ngram::NgramEmbedder;
    use crate::index::IndexStore;
    use tempfile::tempdir;

    /// Fails on any text containing the marker, succeeds otherwise.
    struct FlakyEmbedder {
        inner: NgramEmbedder,
    }

    impl FlakyEmbedder {
        fn new() -> Self {
            Self {
                inner: NgramEmbedder::new(16),
            }
        }
    }

    impl Embedder for FlakyEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
            if text.contains("壞掉") {
                return Err(EmbedderError::InferenceFailed("marker hit".into()));
            }
            self.inner.embed(text)
        }
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
        fn model_id(&self) -> &str {
            "flaky-test"
        }
    }

    fn chunk(id: u32, company: &str, text: &str) -> Chunk {
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
    fn test_build_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let embedder = NgramEmbedder::new(32);
        let chunks = vec![
            chunk(0, "中油", "2030年前碳排放減量百分之三十。"),
            chunk(1, "中油", "持續推動再生能源建置。"),
            chunk(2, "台塑", "廢水處理設備全面更新。"),
        ];

        let report = IndexBuilder::new(&embedder, 2)
            .build(chunks.clone(), dir.path())
            .unwrap();
        assert_eq!(report.embedded, 3);
        assert_eq!(report.skipped, 0);

        let store = IndexStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.dimensions(), 32);
        assert_eq!(store.model_id(), "hashed-bigram-v1");

        // Ordinal alignment: position i in both artifacts is the same chunk.
        for (i, c) in chunks.iter().enumerate() {
            let rec = store.chunk(i).unwrap();
            assert_eq!(rec.chunk_id, c.chunk_id);
            assert_eq!(rec.text, c.text);
            assert_eq!(store.vector(i).unwrap().len(), 32);
        }
    }

    #[test]
    fn test_failed_chunk_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let chunks = vec![
            chunk(0, "甲", "好的段落一。"),
            chunk(1, "甲", "這段壞掉了。"),
            chunk(2, "甲", "好的段落二。"),
        ];

        let report = IndexBuilder::new(&FlakyEmbedder::new(), 8)
            .build(chunks, dir.path())
            .unwrap();
        assert_eq!(report.embedded, 2);
        assert_eq!(report.skipped, 1);

        let store = IndexStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.chunk(0).unwrap().text.contains("段落一"));
        assert!(store.chunk(1).unwrap().text.contains("段落二"));
    }

    #[test]
    fn test_empty_corpus_aborts() {
        let dir = tempdir().unwrap();
        let embedder = NgramEmbedder::new(16);
        match IndexBuilder::new(&embedder, 8).build(Vec::new(), dir.path()) {
            Err(IndexError::EmptyCorpus) => {}
            other => panic!("expected EmptyCorpus, got {other:?}"),
        }
        // Nothing swapped in.
        assert!(!dir.path().join(VECTORS_FILE).exists());
    }

    #[test]
    fn test_rebuild_replaces_wholesale() {
        let dir = tempdir().unwrap();
        let embedder = NgramEmbedder::new(16);
        let builder = IndexBuilder::new(&embedder, 8);

        builder
            .build(
                vec![chunk(0, "甲", "第一版一。"), chunk(1, "甲", "第一版二。")],
                dir.path(),
            )
            .unwrap();
        assert_eq!(IndexStore::load(dir.path()).unwrap().len(), 2);

        builder
            .build(vec![chunk(0, "乙", "第二版唯一。")], dir.path())
            .unwrap();

        let store = IndexStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.chunk(0).unwrap().company, "乙");

        // No temporaries left behind.
        assert!(!dir.path().join(format!("{VECTORS_FILE}.tmp")).exists());
        assert!(!dir.path().join(format!("{META_FILE}.tmp")).exists());
    }
}
