//! Google News RSS search source.

use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use super::{FeedError, FeedItem, FeedSource, parse_rss};

pub struct GoogleNewsFeed {
    base_url: String,
    lang: String,
    region: String,
    edition: String,
    client: reqwest::blocking::Client,
}

impl GoogleNewsFeed {
    pub fn new(
        base_url: &str,
        lang: &str,
        region: &str,
        edition: &str,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("greenlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::RequestFailed(e.to_string()))?;

        Ok(Self {
            base_url: base_url.to_string(),
            lang: lang.to_string(),
            region: region.to_string(),
            edition: edition.to_string(),
            client,
        })
    }

    fn query_url(&self, query: &str) -> Result<Url, FeedError> {
        Url::parse_with_params(
            &self.base_url,
            &[
                ("q", query),
                ("hl", &self.lang),
                ("gl", &self.region),
                ("ceid", &self.edition),
            ],
        )
        .map_err(|e| FeedError::InvalidUrl(e.to_string()))
    }
}

impl FeedSource for GoogleNewsFeed {
    fn fetch(&self, query: &str, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
        let url = self.query_url(query)?;
        debug!("Fetching feed: {url}");

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FeedError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::BadStatus(status.as_u16()));
        }

        let body = resp
            .text()
            .map_err(|e| FeedError::RequestFailed(e.to_string()))?;

        let mut items = parse_rss(&body);
        items.truncate(limit);
        Ok(items)
    }
}
