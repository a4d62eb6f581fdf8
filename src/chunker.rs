//! Sentence-window chunking of extracted report text.
//!
//! Reports arrive as plain text with form-feed page breaks (the PDF
//! extraction step is upstream of this crate). Text is whitespace-normalized,
//! split into sentences on CJK terminators, and grouped into overlapping
//! windows so no statement is lost at a chunk boundary.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ChunkConfig;

/// Page boundary marker emitted by the text extraction step.
pub const PAGE_BREAK: char = '\u{0C}';

/// Provenance for one source document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    pub company: String,
    pub year: Option<i32>,
    /// Original document name, kept for citation.
    pub source: String,
}

/// One bounded passage of report text with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal within the source document.
    pub chunk_id: u32,
    pub company: String,
    pub year: Option<i32>,
    /// 1-based page the chunk starts on.
    pub page: u32,
    pub text: String,
    pub source_document: String,
}

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static STEM_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)[ _-]?((?:19|20)\d{2})$").unwrap());

/// Collapse all whitespace runs to a single space and trim.
pub fn normalize_ws(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Derive company and reporting year from a document file stem.
///
/// Report files are conventionally named `<company><year>` (e.g. `台塑2024`);
/// when no trailing year is present the whole stem is the company name.
pub fn derive_doc_meta(stem: &str) -> DocumentMeta {
    let stem = stem.trim();
    if let Some(caps) = STEM_YEAR_RE.captures(stem) {
        let company = caps[1].trim().to_string();
        let year = caps[2].parse::<i32>().ok();
        if !company.is_empty() {
            return DocumentMeta {
                company,
                year,
                source: stem.to_string(),
            };
        }
    }
    DocumentMeta {
        company: stem.to_string(),
        year: None,
        source: stem.to_string(),
    }
}

/// Split normalized text into sentences, each keeping its terminator.
///
/// Terminators follow the source corpus: 。；！？ — report prose is CJK.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_ws(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in normalized.chars() {
        current.push(ch);
        if matches!(ch, '。' | '；' | '！' | '？') {
            let s = current.trim().to_string();
            if !s.is_empty() {
                sentences.push(s);
            }
            current.clear();
        }
    }
    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Window start offsets covering `len` sentences.
///
/// Full windows advance by `stride`; a final shortened start is added when
/// stepping would leave trailing sentences uncovered.
fn window_starts(len: usize, window: usize, stride: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    if len <= window {
        return vec![0];
    }
    let last = len - window;
    let mut starts: Vec<usize> = (0..=last).step_by(stride).collect();
    if *starts.last().unwrap_or(&0) != last {
        starts.push(last);
    }
    starts
}

/// Produce the ordered chunk sequence for one document.
///
/// Consecutive chunks from the same page overlap by
/// `window_sentences - stride_sentences` sentences. Chunks outside the
/// configured length bounds are dropped (a bound of 0 disables it).
/// Empty or whitespace-only input yields no chunks.
pub fn chunk_document(
    meta: &DocumentMeta,
    text: &str,
    cfg: &ChunkConfig,
) -> impl Iterator<Item = Chunk> + use<> {
    let meta = meta.clone();
    let cfg = cfg.clone();

    let pages: Vec<(u32, Vec<String>)> = text
        .split(PAGE_BREAK)
        .enumerate()
        .filter_map(|(i, page)| {
            let sentences = split_sentences(page);
            if sentences.is_empty() {
                None
            } else {
                Some((i as u32 + 1, sentences))
            }
        })
        .collect();

    pages
        .into_iter()
        .flat_map(move |(page, sentences)| {
            let starts = window_starts(
                sentences.len(),
                cfg.window_sentences.max(1),
                cfg.stride_sentences.max(1),
            );
            let window = cfg.window_sentences.max(1);
            let (min_chars, max_chars) = (cfg.min_chars, cfg.max_chars);
            let meta = meta.clone();
            starts.into_iter().filter_map(move |start| {
                let end = (start + window).min(sentences.len());
                let text: String = sentences[start..end].concat();
                let chars = text.chars().count();
                if min_chars > 0 && chars < min_chars {
                    return None;
                }
                if max_chars > 0 && chars > max_chars {
                    return None;
                }
                Some(Chunk {
                    chunk_id: 0, // assigned below
                    company: meta.company.clone(),
                    year: meta.year,
                    page,
                    text,
                    source_document: meta.source.clone(),
                })
            })
        })
        .enumerate()
        .map(|(i, mut chunk)| {
            chunk.chunk_id = i as u32;
            chunk
        })
}

// ── Tests ────────────────────────────────────────────────────────────
