//! Request orchestration.
//!
//! One request fans out to Agent A (index retrieval + extraction) and
//! Agent C (feed collection) concurrently, joins both regardless of
//! individual outcome, and only then runs Agent D. Agent failures become
//! `unavailable` sections; the response envelope is always produced.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::agents::AgentError;
use crate::agents::commitments::CommitmentAgent;
use crate::agents::events::EventAgent;
use crate::agents::synthesis::SynthesisAgent;
use crate::config::Config;
use crate::embedder::Embedder;
use crate::feed::FeedSource;
use crate::index::{IndexError, IndexStore};
use crate::llm::TextGenerator;
use crate::schema::{
    AgentSection, Assessment, CommitmentReport, EventReport, RiskLevel, RunResponse,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Rejected before any agent runs.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub struct Pipeline {
    /// `None` when the index artifacts are absent; Agent A then reports the
    /// distinct `index_missing` kind instead of pretending an empty match.
    index: Option<Arc<IndexStore>>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TextGenerator>,
    feed: Arc<dyn FeedSource>,
    config: Arc<Config>,
}

impl Pipeline {
    /// Wire the pipeline. The embedder must agree with the index it will
    /// query: dimension mismatch is fatal here, model-name drift is warned
    /// (similarity against a different model is meaningless).
    pub fn new(
        index: Option<Arc<IndexStore>>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        feed: Arc<dyn FeedSource>,
        config: Arc<Config>,
    ) -> anyhow::Result<Self> {
        if let Some(store) = &index {
            anyhow::ensure!(
                store.dimensions() == embedder.dimensions(),
                "index dimension {} does not match embedder dimension {}",
                store.dimensions(),
                embedder.dimensions(),
            );
            if store.model_id() != embedder.model_id() {
                warn!(
                    "Index was built with model {} but embedder is {}; scores may be unusable",
                    store.model_id(),
                    embedder.model_id()
                );
            }
        }

        Ok(Self {
            index,
            embedder,
            generator,
            feed,
            config,
        })
    }

    /// Run one request end to end.
    ///
    /// Agents A and C run concurrently on the blocking pool; D starts only
    /// after both have reached a terminal state.
    pub async fn run(&self, company: &str, question: &str) -> Result<RunResponse, PipelineError> {
        let company = company.trim().to_string();
        let question = question.trim().to_string();
        if company.is_empty() {
            return Err(PipelineError::InvalidInput("company must not be empty".into()));
        }
        if question.is_empty() {
            return Err(PipelineError::InvalidInput("question must not be empty".into()));
        }

        info!("Running assessment for {company}: {question}");

        let commitments_task = {
            let index = self.index.clone();
            let embedder = Arc::clone(&self.embedder);
            let generator = Arc::clone(&self.generator);
            let config = Arc::clone(&self.config);
            let (company, question) = (company.clone(), question.clone());
            tokio::task::spawn_blocking(move || -> Result<CommitmentReport, AgentError> {
                let store = index.ok_or_else(|| {
                    AgentError::Index(IndexError::Missing {
                        dir: config.index_dir.clone(),
                    })
                })?;
                CommitmentAgent::new(
                    &store,
                    embedder.as_ref(),
                    generator.as_ref(),
                    &config.retrieval,
                )
                .extract(&company, &question)
            })
        };

        let events_task = {
            let feed = Arc::clone(&self.feed);
            let config = Arc::clone(&self.config);
            let (company, question) = (company.clone(), question.clone());
            tokio::task::spawn_blocking(move || {
                EventAgent::new(feed.as_ref(), &config.feed).collect(&company, Some(&question))
            })
        };

        // Join barrier: both sides reach a terminal state before synthesis.
        let (commitments_join, events_join) = tokio::join!(commitments_task, events_task);

        let commitments: AgentSection<CommitmentReport> = match commitments_join {
            Ok(Ok(report)) => AgentSection::Ok { data: report },
            Ok(Err(e)) => {
                warn!("Commitment agent unavailable: {e}");
                AgentSection::Unavailable {
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                }
            }
            Err(e) => AgentSection::Unavailable {
                kind: "task_panicked".to_string(),
                reason: e.to_string(),
            },
        };

        let events: AgentSection<EventReport> = match events_join {
            Ok(report) => AgentSection::Ok { data: report },
            Err(e) => AgentSection::Unavailable {
                kind: "task_panicked".to_string(),
                reason: e.to_string(),
            },
        };

        let assessment = {
            let generator = Arc::clone(&self.generator);
            let (company, question) = (company.clone(), question.clone());
            let (commitments, events) = (commitments.clone(), events.clone());
            tokio::task::spawn_blocking(move || {
                SynthesisAgent::new(generator.as_ref())
                    .assess(&company, &question, &commitments, &events)
            })
            .await
            .unwrap_or_else(|e| {
                warn!("Synthesis task failed: {e}");
                Assessment {
                    narrative: "內部錯誤：綜合判讀未能完成。".to_string(),
                    risk: RiskLevel::InsufficientData,
                    referenced_claims: Vec::new(),
                    referenced_candidates: Vec::new(),
                }
            })
        };

        Ok(RunResponse {
            company,
            question,
            commitments,
            events,
            assessment,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
