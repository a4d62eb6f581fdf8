//! Replay feed for tests: canned items per query, optional per-query or
//! blanket failures.

use std::collections::{HashMap, HashSet};

use super::{FeedError, FeedItem, FeedSource};

#[derive(Default)]
pub struct ReplayFeed {
    items: HashMap<String, Vec<FeedItem>>,
    failing: HashSet<String>,
    fail_all: bool,
}

impl ReplayFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `items`.
    #[must_use]
    pub fn with(mut self, query: &str, items: Vec<FeedItem>) -> Self {
        self.items.insert(query.to_string(), items);
        self
    }

    /// Make `query` fail with a timeout-style error.
    #[must_use]
    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// Make every query fail, as when the feed host is unreachable.
    #[must_use]
    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }
}

impl FeedSource for ReplayFeed {
    fn fetch(&self, query: &str, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
        if self.fail_all || self.failing.contains(query) {
            return Err(FeedError::RequestFailed(format!(
                "replay: simulated timeout for {query}"
            )));
        }
        let mut items = self.items.get(query).cloned().unwrap_or_default();
        items.truncate(limit);
        Ok(items)
    }
}
