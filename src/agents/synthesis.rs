//! Agent D — reconciliation of commitments and external events into one
//! narrative risk assessment.
//!
//! The generator writes the prose; the qualitative risk level is anchored by
//! a topic-overlap heuristic so the assessment never hinges on free text
//! alone. With nothing on either side the agent states insufficient data
//! instead of inventing a judgment.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::fold;
use crate::llm::TextGenerator;
use crate::schema::{
    AgentSection, Assessment, Claim, CommitmentReport, EventReport, NewsCandidate, RiskLevel,
};

/// Cap on claims/candidates included in the generator briefs.
const BRIEF_LIMIT: usize = 30;

/// Negative-event vocabulary that contradicts any commitment topic.
const UNIVERSAL_TERMS: [&str; 6] = ["罰款", "裁罰", "違規", "火災", "爆炸", "漏油"];

static RISK_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^\s*RISK:\s*(low|medium|high)\s*$").unwrap());

pub struct SynthesisAgent<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> SynthesisAgent<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Produce the assessment. Always returns a value: generator failure
    /// falls back to a deterministic summary of whatever was gathered.
    pub fn assess(
        &self,
        company: &str,
        question: &str,
        commitments: &AgentSection<CommitmentReport>,
        events: &AgentSection<EventReport>,
    ) -> Assessment {
        let claims: &[Claim] = commitments
            .data()
            .map(|r| r.claims.as_slice())
            .unwrap_or_default();
        let candidates: &[NewsCandidate] = events
            .data()
            .map(|r| r.candidates.as_slice())
            .unwrap_or_default();

        if claims.is_empty() && candidates.is_empty() {
            return insufficient_data(company, commitments, events);
        }

        let claims = &claims[..claims.len().min(BRIEF_LIMIT)];
        let candidates = &candidates[..candidates.len().min(BRIEF_LIMIT)];

        let conflicts = conflict_pairs(claims, candidates);
        let heuristic = heuristic_risk(claims, candidates, &conflicts);
        // The generator is told whether an empty side was checked-and-empty
        // or simply unreachable.
        let data_status = format!(
            "報告承諾：{}；外部新聞：{}",
            side_status(commitments, claims.len()),
            side_status(events, candidates.len()),
        );
        let prompt =
            self.narrative_prompt(company, question, &data_status, claims, candidates, &conflicts);

        let (narrative, risk) = match self.generator.generate(&prompt) {
            Ok(text) => {
                let risk = parse_risk_marker(&text).unwrap_or(heuristic);
                (strip_risk_marker(&text), risk)
            }
            Err(e) => {
                warn!("Synthesis generation failed, using deterministic fallback: {e}");
                (fallback_narrative(company, claims, candidates, heuristic), heuristic)
            }
        };

        Assessment {
            narrative,
            risk,
            referenced_claims: (0..claims.len()).collect(),
            referenced_candidates: (0..candidates.len()).collect(),
        }
    }

    fn narrative_prompt(
        &self,
        company: &str,
        question: &str,
        data_status: &str,
        claims: &[Claim],
        candidates: &[NewsCandidate],
        conflicts: &[(usize, usize)],
    ) -> String {
        let claim_brief = serde_json::to_string(
            &claims
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "claim_text": c.claim_text,
                        "topic": c.topic,
                        "metric": c.metric,
                        "target_year": c.target_year,
                        "source_chunk_ids": c.source_chunk_ids,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());

        let news_brief = serde_json::to_string(
            &candidates
                .iter()
                .map(|n| {
                    serde_json::json!({
                        "title": n.title,
                        "source": n.source,
                        "published": n.published,
                        "matched_keyword": n.matched_keyword,
                        "relevance_score": n.relevance_score,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());

        let conflict_hint = if conflicts.is_empty() {
            "（啟發式比對未發現主題重疊）".to_string()
        } else {
            conflicts
                .iter()
                .map(|(ci, ni)| format!("承諾#{ci} 與 新聞#{ni} 主題重疊"))
                .collect::<Vec<_>>()
                .join("；")
        };

        format!(
            r#"你是漂綠風險判讀助理。整合永續報告中的承諾與外部新聞，用繁體中文寫一份給一般使用者看的分析說明。

【使用者原始問題】
{company}：{question}

【資料狀態】
{data_status}

【永續報告承諾摘要（JSON，請自行整理重點）】
{claim_brief}

【外部新聞摘要（JSON，請自行整理重點）】
{news_brief}

【主題重疊提示】
{conflict_hint}

請依下列結構輸出連續文字＋條列，不要輸出 JSON：
一、問題與公司重述（1～3 句）。
二、永續報告中的主要承諾（條列，必要時句尾標註來源編號，例如（報告來源：12））。
三、外部新聞與爭議重點（條列）。
四、綜合判讀：是否有「承諾說得漂亮、外部爭議卻多」的落差，或重大事件在報告中未被對應。
五、限制與提醒（1～3 點，說明這是文字證據的輔助判讀，不是查核結論）。

最後另起一行，只輸出風險標記（三選一）：
RISK: low
RISK: medium
RISK: high"#,
        )
    }
}

// ── Heuristics ───────────────────────────────────────────────────────

/// Negative-event vocabulary related to a specific commitment topic.
fn topic_terms(topic: &str) -> &'static [&'static str] {
    match fold(topic).as_str() {
        "emissions" | "climate" | "energy" => &["碳排", "排放", "空污", "空氣"],
        "water" => &["漏油", "廢水", "污染", "排放"],
        "waste" => &["廢棄物", "污染"],
        "biodiversity" => &["棲地", "生態", "污染"],
        _ => &[],
    }
}

/// Pairs of (claim index, candidate index) whose topics plausibly collide:
/// a candidate mentioning the claim topic's vocabulary, or any candidate
/// carrying universal negative terms (fines, spills, explosions).
pub fn conflict_pairs(claims: &[Claim], candidates: &[NewsCandidate]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (ci, claim) in claims.iter().enumerate() {
        let related = topic_terms(&claim.topic);
        for (ni, candidate) in candidates.iter().enumerate() {
            let text = fold(&format!("{} {}", candidate.title, candidate.matched_keyword));
            let topical = related.iter().any(|t| text.contains(&fold(t)));
            let universal = UNIVERSAL_TERMS.iter().any(|t| text.contains(&fold(t)));
            if topical || universal {
                pairs.push((ci, ni));
            }
        }
    }
    pairs
}

/// Conflict-count anchor for the qualitative risk level.
fn heuristic_risk(
    claims: &[Claim],
    candidates: &[NewsCandidate],
    conflicts: &[(usize, usize)],
) -> RiskLevel {
    if claims.is_empty() && !candidates.is_empty() {
        // Negative coverage with no visible commitments: worth flagging,
        // but there is no claimed/actual gap to call high.
        return RiskLevel::Medium;
    }
    match conflicts.len() {
        0 => RiskLevel::Low,
        1..=2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

fn parse_risk_marker(text: &str) -> Option<RiskLevel> {
    let caps = RISK_MARKER_RE.captures_iter(text).last()?;
    match caps[1].to_ascii_lowercase().as_str() {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        _ => None,
    }
}

fn strip_risk_marker(text: &str) -> String {
    RISK_MARKER_RE.replace_all(text, "").trim().to_string()
}

/// One side's availability, phrased for the generator prompt.
fn side_status<T>(section: &AgentSection<T>, count: usize) -> String {
    match section {
        AgentSection::Ok { .. } if count == 0 => "已查核，無資料".to_string(),
        AgentSection::Ok { .. } => format!("共 {count} 筆"),
        AgentSection::Unavailable { reason, .. } => format!("無法取得（{reason}）"),
    }
}

// ── Deterministic fallbacks ──────────────────────────────────────────

fn section_note<T>(label: &str, section: &AgentSection<T>) -> String {
    match section {
        AgentSection::Ok { .. } => format!("{label}：已查核，未發現內容。"),
        AgentSection::Unavailable { reason, .. } => {
            format!("{label}：無法取得（{reason}）。")
        }
    }
}

/// Both sides empty: say so explicitly instead of judging.
fn insufficient_data(
    company: &str,
    commitments: &AgentSection<CommitmentReport>,
    events: &AgentSection<EventReport>,
) -> Assessment {
    let narrative = format!(
        "目前沒有足夠資料可對 {company} 進行漂綠風險判讀。\n{}\n{}\n\
         在補齊永續報告索引或外部新聞來源之前，不做風險評等。",
        section_note("永續報告承諾", commitments),
        section_note("外部新聞", events),
    );
    Assessment {
        narrative,
        risk: RiskLevel::InsufficientData,
        referenced_claims: Vec::new(),
        referenced_candidates: Vec::new(),
    }
}

/// Generator-down fallback: a plain summary of what was gathered.
fn fallback_narrative(
    company: &str,
    claims: &[Claim],
    candidates: &[NewsCandidate],
    risk: RiskLevel,
) -> String {
    let mut lines = vec![format!(
        "語言生成服務暫時無法使用，以下為 {company} 的資料摘要（非完整判讀）。"
    )];

    if claims.is_empty() {
        lines.push("永續報告承諾：無。".to_string());
    } else {
        lines.push(format!("永續報告承諾（{} 筆）：", claims.len()));
        for claim in claims.iter().take(5) {
            lines.push(format!("- [{}] {}", claim.topic, claim.claim_text));
        }
    }

    if candidates.is_empty() {
        lines.push("外部新聞候選：無。".to_string());
    } else {
        lines.push(format!("外部新聞候選（{} 則）：", candidates.len()));
        for candidate in candidates.iter().take(5) {
            lines.push(format!("- {}（{}）", candidate.title, candidate.source));
        }
    }

    let risk_label = match risk {
        RiskLevel::Low => "低",
        RiskLevel::Medium => "中",
        RiskLevel::High => "高",
        RiskLevel::InsufficientData => "資料不足",
    };
    lines.push(format!("依主題重疊啟發式，初步風險評估：{risk_label}。"));
    lines.join("\n")
}

// ── Tests ────────────────────────────────────────────────────────────
