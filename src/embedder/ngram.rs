//! Deterministic offline embedder based on hashed character bigrams.
//!
//! Each bigram of the input is hashed into one of `dimensions` buckets and
//! counted; the bucket histogram is L2-normalized. Texts sharing surface
//! vocabulary land near each other, which is enough for smoke runs and for
//! exercising the retrieval path in tests without an embedding service.

use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError, normalize};

pub const NGRAM_MODEL_ID: &str = "hashed-bigram-v1";

pub struct NgramEmbedder {
    dimensions: usize,
}

impl NgramEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for NgramEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

fn bucket(a: char, b: char, dimensions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    a.hash(&mut hasher);
    b.hash(&mut hasher);
    (hasher.finish() % dimensions as u64) as usize
}

impl Embedder for NgramEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vec = vec![0.0f32; self.dimensions];

        // Pad with sentinels so single-char input still produces a bigram.
        let chars: Vec<char> = std::iter::once('\u{2402}')
            .chain(text.chars().filter(|c| !c.is_whitespace()))
            .chain(std::iter::once('\u{2403}'))
            .collect();

        for pair in chars.windows(2) {
            vec[bucket(pair[0], pair[1], self.dimensions)] += 1.0;
        }

        normalize(&mut vec);
        Ok(vec)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        NGRAM_MODEL_ID
    }
}
