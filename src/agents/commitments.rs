//! Agent A — commitment extraction over the report index.
//!
//! Retrieves the passages closest to the question, narrows them to the
//! requested company, and asks the text generator for structured commitment
//! claims. Every claim that survives validation cites at least one passage
//! from the retrieval; citations pointing anywhere else are rejected.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AgentError, fold};
use crate::chunker::normalize_ws;
use crate::config::RetrievalConfig;
use crate::embedder::Embedder;
use crate::index::{IndexStore, ScoredChunk};
use crate::llm::TextGenerator;
use crate::schema::{Claim, CommitmentReport, Confidence, RetrievedPassage};

pub struct CommitmentAgent<'a> {
    index: &'a IndexStore,
    embedder: &'a dyn Embedder,
    generator: &'a dyn TextGenerator,
    cfg: &'a RetrievalConfig,
}

impl<'a> CommitmentAgent<'a> {
    pub fn new(
        index: &'a IndexStore,
        embedder: &'a dyn Embedder,
        generator: &'a dyn TextGenerator,
        cfg: &'a RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            cfg,
        }
    }

    /// Run one extraction for `company` / `question`.
    pub fn extract(&self, company: &str, question: &str) -> Result<CommitmentReport, AgentError> {
        let query = normalize_ws(&format!("{company} {question}"));
        let query_vector = self.embedder.embed(&query)?;
        let hits = self.index.search(&query_vector, self.cfg.retrieve_top_k)?;
        debug!("Retrieved {} passages for {query}", hits.len());

        // Narrow retrieval to the requested company.
        let matching: Vec<ScoredChunk> = hits
            .iter()
            .copied()
            .filter(|hit| {
                self.index
                    .chunk(hit.ordinal)
                    .is_some_and(|c| company_matches(&c.company, company))
            })
            .collect();

        if matching.is_empty() {
            // No match is not a failure: surface what retrieval saw so the
            // caller can see why nothing was attributed.
            let context = self.passages(&hits[..hits.len().min(self.cfg.passages_per_company)]);
            return Ok(CommitmentReport {
                selected_company: None,
                company_matched: false,
                claims: Vec::new(),
                retrieved: context,
                raw_response: None,
            });
        }

        let selected_company = self.rank_companies(&matching);
        let selected: Vec<ScoredChunk> = matching
            .iter()
            .copied()
            .filter(|hit| {
                self.index
                    .chunk(hit.ordinal)
                    .is_some_and(|c| c.company == selected_company)
            })
            .take(self.cfg.passages_per_company)
            .collect();

        let retrieved = self.passages(&selected);
        let prompt = self.extraction_prompt(&selected_company, &selected);
        let raw = self.generator.generate(&prompt)?;

        let parsed = match parse_claims_json(&raw) {
            Some(claims) => Some(claims),
            None => {
                // One repair round, as strict as the first.
                debug!("Claim extraction output was not JSON, asking for repair");
                let repaired = self
                    .generator
                    .generate(&self.repair_prompt(&selected_company, &selected))?;
                parse_claims_json(&repaired).or_else(|| {
                    warn!("Claim extraction unparseable after repair, degrading to raw");
                    None
                })
            }
        };

        let Some(raw_claims) = parsed else {
            // Keep the evidence: retrieved passages plus the verbatim output.
            return Ok(CommitmentReport {
                selected_company: Some(selected_company),
                company_matched: true,
                claims: Vec::new(),
                retrieved,
                raw_response: Some(raw),
            });
        };

        let valid_ordinals: Vec<usize> = selected.iter().map(|h| h.ordinal).collect();
        let claims = validate_claims(raw_claims, &valid_ordinals);

        Ok(CommitmentReport {
            selected_company: Some(selected_company),
            company_matched: true,
            claims,
            retrieved,
            raw_response: None,
        })
    }

    /// Highest summed-score company among the matching hits. Ties break on
    /// the name so repeated queries stay stable.
    fn rank_companies(&self, hits: &[ScoredChunk]) -> String {
        let mut totals: BTreeMap<&str, f32> = BTreeMap::new();
        for hit in hits {
            if let Some(chunk) = self.index.chunk(hit.ordinal) {
                *totals.entry(chunk.company.as_str()).or_insert(0.0) += hit.score;
            }
        }
        totals
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(name, _)| (*name).to_string())
            .unwrap_or_default()
    }

    fn passages(&self, hits: &[ScoredChunk]) -> Vec<RetrievedPassage> {
        hits.iter()
            .filter_map(|hit| {
                let chunk = self.index.chunk(hit.ordinal)?;
                Some(RetrievedPassage {
                    ordinal: hit.ordinal,
                    score: hit.score,
                    company: chunk.company.clone(),
                    year: chunk.year,
                    page: chunk.page,
                    excerpt: truncate_chars(&chunk.text, self.cfg.cite_excerpt_chars),
                })
            })
            .collect()
    }

    fn citation_block(&self, hits: &[ScoredChunk]) -> String {
        hits.iter()
            .filter_map(|hit| {
                let c = self.index.chunk(hit.ordinal)?;
                Some(format!(
                    "[{}] 公司:{} | 年度:{} | 頁碼:{} | 內容:{}",
                    hit.ordinal,
                    c.company,
                    c.year.map(|y| y.to_string()).unwrap_or_default(),
                    c.page,
                    c.text
                ))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extraction_prompt(&self, company: &str, hits: &[ScoredChunk]) -> String {
        format!(
            r#"【強制輸出格式】你只能輸出「JSON 陣列」，不得包含任何其他文字。若無明確承諾，輸出 []。

你是永續報告書的承諾提取助理。只根據下列引用內容，抽取 {company} 在環境/永續面向的承諾、目標或政策宣示。

【引用內容（僅可使用以下內容）】
{context}

【輸出要求】
1) 僅能根據引用內容，不可自行推測或補寫。
2) 每筆物件包含欄位：
   - claim_text（完整承諾句，避免只有章節標題）
   - topic（emissions/water/waste/energy/biodiversity/general 擇一）
   - metric（例如 GHG -30% by 2030；沒有就填 unknown）
   - target_year（整數年份，沒有就填 null）
   - certainty（high/medium/low）
   - source_citations（方括號內的引用編號，例如 [{example_id}]）
3) 同一承諾出現多次時合併為一筆。
請只輸出 JSON 陣列。"#,
            company = company,
            context = self.citation_block(hits),
            example_id = hits.first().map(|h| h.ordinal).unwrap_or(0),
        )
    }

    fn repair_prompt(&self, company: &str, hits: &[ScoredChunk]) -> String {
        format!(
            r#"你剛才的輸出不是合法 JSON。請根據下列引用內容重新輸出，只包含 JSON 陣列，不得有其他文字。

【公司】{company}

【引用內容】
{context}

【欄位】claim_text / topic / metric / target_year / certainty / source_citations（使用方括號內的引用編號）。
若無明確承諾，輸出 []。"#,
            company = company,
            context = self.citation_block(hits),
        )
    }
}

// ── Company matching ─────────────────────────────────────────────────

/// Fuzzy match between an indexed company label and the requested name:
/// fold case and whitespace, then accept substring containment in either
/// direction (「中油」 matches 「台灣中油2024」).
pub fn company_matches(indexed: &str, requested: &str) -> bool {
    let a = fold(indexed);
    let b = fold(requested);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

// ── Generator output parsing ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawClaim {
    #[serde(default)]
    claim_text: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    metric: String,
    #[serde(default)]
    target_year: Option<serde_json::Value>,
    #[serde(default)]
    certainty: Option<String>,
    #[serde(default)]
    source_citations: Vec<serde_json::Value>,
}

static JSON_ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// Parse the generator output as a claim array: first verbatim, then the
/// outermost bracketed block (models habitually wrap JSON in prose).
fn parse_claims_json(text: &str) -> Option<Vec<RawClaim>> {
    let trimmed = text.trim();
    if let Ok(claims) = serde_json::from_str::<Vec<RawClaim>>(trimmed) {
        return Some(claims);
    }
    let block = JSON_ARRAY_RE.find(trimmed)?;
    serde_json::from_str::<Vec<RawClaim>>(block.as_str()).ok()
}

fn parse_citation(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(|v| v as usize),
        serde_json::Value::String(s) => s.trim().trim_matches(['[', ']']).parse().ok(),
        _ => None,
    }
}

fn parse_year(value: Option<&serde_json::Value>) -> Option<i32> {
    match value? {
        serde_json::Value::Number(n) => n.as_i64().map(|v| v as i32),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_confidence(raw: Option<&str>) -> Confidence {
    match raw.map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("high") => Confidence::High,
        Some(s) if s.eq_ignore_ascii_case("low") => Confidence::Low,
        _ => Confidence::Medium,
    }
}

/// Keep citations inside the retrieved set, drop claims left without any,
/// and merge duplicates on (claim_text, topic, metric).
fn validate_claims(raw_claims: Vec<RawClaim>, valid_ordinals: &[usize]) -> Vec<Claim> {
    let mut merged: Vec<Claim> = Vec::new();
    let mut by_key: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    let mut rejected_citations = 0usize;

    for raw in raw_claims {
        let claim_text = normalize_ws(&raw.claim_text);
        if claim_text.is_empty() {
            continue;
        }

        let mut citations: Vec<usize> = raw
            .source_citations
            .iter()
            .filter_map(parse_citation)
            .filter(|ordinal| {
                let ok = valid_ordinals.contains(ordinal);
                if !ok {
                    rejected_citations += 1;
                }
                ok
            })
            .collect();
        citations.sort_unstable();
        citations.dedup();

        if citations.is_empty() {
            warn!("Dropping claim without a verifiable citation: {claim_text}");
            continue;
        }

        let key = (claim_text.clone(), raw.topic.clone(), raw.metric.clone());
        if let Some(&at) = by_key.get(&key) {
            let existing = &mut merged[at];
            existing.source_chunk_ids.extend(citations);
            existing.source_chunk_ids.sort_unstable();
            existing.source_chunk_ids.dedup();
            continue;
        }

        by_key.insert(key, merged.len());
        merged.push(Claim {
            topic: raw.topic,
            metric: raw.metric,
            claim_text,
            target_year: parse_year(raw.target_year.as_ref()),
            confidence: parse_confidence(raw.certainty.as_deref()),
            source_chunk_ids: citations,
        });
    }

    if rejected_citations > 0 {
        warn!("Rejected {rejected_citations} citation(s) outside the retrieved set");
    }
    merged
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    let normalized = normalize_ws(s);
    if max_chars == 0 || normalized.chars().count() <= max_chars {
        return normalized;
    }
    let mut out: String = normalized.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

// ── Tests ────────────────────────────────────────────────────────────
