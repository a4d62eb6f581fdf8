//! Agent C — negative-event candidate collection.
//!
//! Fans a company name out over a fixed set of environmental-controversy
//! keyword combinations, pulls each from the news feed, deduplicates by URL,
//! and ranks by a keyword-overlap + recency heuristic. Individual feed
//! failures are skipped; the agent itself never fails a request.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::fold;
use crate::chunker::normalize_ws;
use crate::config::FeedConfig;
use crate::feed::{FeedItem, FeedSource};
use crate::schema::{EventReport, NewsCandidate};

/// Topic terms combined with the company name, from the source corpus's
/// controversy checklist.
pub const TOPIC_TERMS: [&str; 6] = [
    "永續 罰款",
    "污染",
    "環保 裁罰",
    "漏油",
    "火災 爆炸",
    "碳排",
];

/// Published dates older than this contribute nothing to relevance.
const RECENCY_HORIZON_DAYS: f32 = 365.0;

pub struct EventAgent<'a> {
    feed: &'a dyn FeedSource,
    cfg: &'a FeedConfig,
}

impl<'a> EventAgent<'a> {
    pub fn new(feed: &'a dyn FeedSource, cfg: &'a FeedConfig) -> Self {
        Self { feed, cfg }
    }

    /// Collect candidates for `company`. The question, when present, only
    /// biases the query set with one extra combination.
    pub fn collect(&self, company: &str, question: Option<&str>) -> EventReport {
        self.collect_at(company, question, Utc::now())
    }

    /// Same as [`collect`](Self::collect) with an injectable clock.
    pub fn collect_at(
        &self,
        company: &str,
        question: Option<&str>,
        now: DateTime<Utc>,
    ) -> EventReport {
        let queries = build_queries(company, question);

        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut candidates: Vec<NewsCandidate> = Vec::new();

        for query in &queries {
            let items = match self.feed.fetch(query, self.cfg.per_query_limit) {
                Ok(items) => items,
                Err(e) => {
                    warn!("Feed query failed, skipping: {query}: {e}");
                    continue;
                }
            };
            debug!("Feed query {query} returned {} items", items.len());

            for item in items {
                if !seen_urls.insert(item.link.clone()) {
                    continue;
                }
                let relevance_score = relevance(query, &item, now);
                candidates.push(NewsCandidate {
                    title: item.title,
                    url: item.link,
                    source: item.source,
                    published: item.published,
                    matched_keyword: query.clone(),
                    relevance_score,
                });
            }
        }

        // Stable sort: equal scores keep fetch order.
        candidates.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        candidates.truncate(self.cfg.max_candidates);

        EventReport {
            candidates,
            queries,
        }
    }
}

/// Company × topic-term combinations, plus one question-biased combination.
fn build_queries(company: &str, question: Option<&str>) -> Vec<String> {
    let company = normalize_ws(company);
    let mut queries: Vec<String> = TOPIC_TERMS
        .iter()
        .map(|term| format!("{company} {term}"))
        .collect();

    if let Some(q) = question {
        let q = normalize_ws(q);
        if !q.is_empty() {
            queries.push(format!("{company} {q}"));
        }
    }
    queries
}

/// Relevance heuristic in `[0, 1]`: 70% keyword overlap between the query
/// combination and title+summary, 30% recency with linear decay over a
/// year. An unknown publish date earns no recency credit.
fn relevance(query: &str, item: &FeedItem, now: DateTime<Utc>) -> f32 {
    let haystack = fold(&format!("{} {}", item.title, item.summary));

    let terms: Vec<String> = query.split_whitespace().map(fold).collect();
    let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    let overlap = if terms.is_empty() {
        0.0
    } else {
        matched as f32 / terms.len() as f32
    };

    let recency = match item.published {
        Some(ts) => {
            let days = (now - ts).num_days().max(0) as f32;
            (1.0 - days / RECENCY_HORIZON_DAYS).max(0.0)
        }
        None => 0.0,
    };

    (0.7 * overlap + 0.3 * recency).clamp(0.0, 1.0)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::replay::ReplayFeed;
    use chrono::TimeZone;

    fn cfg() -> FeedConfig {
        FeedConfig {
            per_query_limit: 10,
            max_candidates: 12,
            ..FeedConfig::default()
        }
    }

    fn item(title: &str, link: &str, published: Option<DateTime<Utc>>) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: link.to_string(),
            source: "測試媒體".to_string(),
            published,
            summary: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_build_queries() {
        let queries = build_queries("中油", Some("減碳 目標"));
        assert_eq!(queries.len(), TOPIC_TERMS.len() + 1);
        assert_eq!(queries[0], "中油 永續 罰款");
        assert_eq!(queries.last().unwrap(), "中油 減碳 目標");

        let queries = build_queries("中油", None);
        assert_eq!(queries.len(), TOPIC_TERMS.len());
    }

    #[test]
    fn test_dedupe_and_ordering() {
        let recent = Some(now() - chrono::Duration::days(3));
        let feed = ReplayFeed::new()
            .with(
                "中油 污染",
                vec![
                    item("中油 污染 高雄外海", "https://n/1", recent),
                    item("不相關的產業新聞", "https://n/2", None),
                ],
            )
            .with(
                "中油 漏油",
                // Same URL as the pollution query: must be dropped.
                vec![
                    item("中油 污染 高雄外海", "https://n/1", recent),
                    item("中油 漏油 應變", "https://n/3", recent),
                ],
            );
        let cfg = cfg();
        let agent = EventAgent::new(&feed, &cfg);

        let report = agent.collect_at("中油", None, now());
        let urls: Vec<&str> = report.candidates.iter().map(|c| c.url.as_str()).collect();
        let unique: HashSet<&&str> = urls.iter().collect();
        assert_eq!(urls.len(), unique.len(), "no duplicate URLs");
        assert_eq!(urls.len(), 3);

        // Scores are non-increasing down the list.
        for pair in report.candidates.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }

        // The fully-matching, recent item outranks the unrelated one.
        assert_eq!(report.candidates[0].url, "https://n/1");
        assert_eq!(report.candidates[0].matched_keyword, "中油 污染");
    }

    #[test]
    fn test_failed_query_is_skipped() {
        let feed = ReplayFeed::new()
            .failing("中油 永續 罰款")
            .with("中油 污染", vec![item("中油 污染", "https://n/1", None)]);
        let cfg = cfg();
        let agent = EventAgent::new(&feed, &cfg);

        let report = agent.collect_at("中油", None, now());
        assert_eq!(report.candidates.len(), 1, "other queries still collected");
    }

    #[test]
    fn test_all_queries_failing_yields_empty() {
        let feed = ReplayFeed::new().failing_all();
        let cfg = cfg();
        let agent = EventAgent::new(&feed, &cfg);

        let report = agent.collect_at("中油", Some("減碳"), now());
        assert!(report.candidates.is_empty());
        assert_eq!(report.queries.len(), TOPIC_TERMS.len() + 1);
    }

    #[test]
    fn test_candidate_cap() {
        let many: Vec<FeedItem> = (0..30)
            .map(|i| item("中油 污染", &format!("https://n/{i}"), None))
            .collect();
        let feed = ReplayFeed::new().with("中油 污染", many);
        let mut cfg = cfg();
        cfg.per_query_limit = 50;
        cfg.max_candidates = 5;
        let agent = EventAgent::new(&feed, &cfg);

        let report = agent.collect_at("中油", None, now());
        assert_eq!(report.candidates.len(), 5);
    }

    #[test]
    fn test_recency_weighting() {
        let fresh = item("中油 污染", "https://n/fresh", Some(now() - chrono::Duration::days(1)));
        let stale = item(
            "中油 污染",
            "https://n/stale",
            Some(now() - chrono::Duration::days(400)),
        );
        let score_fresh = relevance("中油 污染", &fresh, now());
        let score_stale = relevance("中油 污染", &stale, now());
        assert!(score_fresh > score_stale);
        assert!((0.0..=1.0).contains(&score_fresh));
        assert!((0.0..=1.0).contains(&score_stale));
    }

    #[test]
    fn test_relevance_bounds() {
        let perfect = item("中油 污染 事件", "https://n/x", Some(now()));
        let score = relevance("中油 污染", &perfect, now());
        assert!((score - 1.0).abs() < 1e-6, "full overlap + fresh = 1.0, got {score}");

        let none = item("完全無關", "https://n/y", None);
        assert_eq!(relevance("中油 污染", &none, now()), 0.0);
    }
}
