//! Shared result types exchanged between the agents and returned to the
//! caller. Every boundary uses these tagged structs; nothing downstream
//! re-parses loose JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Agent A: commitments ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Default for Confidence {
    fn default() -> Self {
        Self::Medium
    }
}

/// One extracted commitment, always traceable to retrieved passages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub topic: String,
    pub metric: String,
    pub claim_text: String,
    #[serde(default)]
    pub target_year: Option<i32>,
    #[serde(default)]
    pub confidence: Confidence,
    /// Index ordinals of the passages supporting the claim. Never empty;
    /// always a subset of the retrieval that produced it.
    pub source_chunk_ids: Vec<usize>,
}

/// A retrieved passage echoed back for citation display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Ordinal in the index; the id claims cite.
    pub ordinal: usize,
    pub score: f32,
    pub company: String,
    pub year: Option<i32>,
    pub page: u32,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitmentReport {
    /// Company the passages were attributed to, when one matched.
    pub selected_company: Option<String>,
    /// False when the requested company matched nothing in the index; the
    /// passages then show what retrieval saw instead.
    pub company_matched: bool,
    pub claims: Vec<Claim>,
    pub retrieved: Vec<RetrievedPassage>,
    /// Generator output kept verbatim when it could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

// ── Agent C: news candidates ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsCandidate {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// The query combination that surfaced this item.
    pub matched_keyword: String,
    /// In `[0, 1]`; candidates are returned in non-increasing order.
    pub relevance_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    pub candidates: Vec<NewsCandidate>,
    /// Query combinations issued, kept for traceability.
    pub queries: Vec<String>,
}

// ── Agent D: assessment ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub narrative: String,
    pub risk: RiskLevel,
    /// Positions into the commitment report's claim list.
    pub referenced_claims: Vec<usize>,
    /// Positions into the event report's candidate list.
    pub referenced_candidates: Vec<usize>,
}

// ── Section wrapper and response envelope ────────────────────────────

/// A sub-agent's result: present data, or an explicit unavailability marker
/// so the caller can distinguish "checked, found nothing" from "could not
/// check".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentSection<T> {
    Ok { data: T },
    Unavailable { kind: String, reason: String },
}

impl<T> AgentSection<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ok { data } => Some(data),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Terminal output of one orchestrated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub company: String,
    pub question: String,
    pub commitments: AgentSection<CommitmentReport>,
    pub events: AgentSection<EventReport>,
    pub assessment: Assessment,
}

// ── Tests ────────────────────────────────────────────────────────────
