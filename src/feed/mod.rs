//! Public news feed source.
//!
//! Consumed read-only: a query string in, a list of headline items out.
//! The production source is Google News RSS search; the wire format is a
//! small enough RSS subset that items are extracted structurally with
//! regex rather than a full XML stack.
pub mod google_news;
pub mod replay;

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed query url invalid: {0}")]
    InvalidUrl(String),

    #[error("feed request failed: {0}")]
    RequestFailed(String),

    #[error("feed returned status {0}")]
    BadStatus(u16),
}

/// One headline from the feed, prior to scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
}

/// A queryable feed. Implementations must be `Send + Sync`.
pub trait FeedSource: Send + Sync {
    /// Fetch up to `limit` items for one query combination.
    fn fetch(&self, query: &str, limit: usize) -> Result<Vec<FeedItem>, FeedError>;
}

// ── RSS item extraction ──────────────────────────────────────────────

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link>(.*?)</link>").unwrap());
static PUB_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pubDate>(.*?)</pubDate>").unwrap());
static SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<source[^>]*>(.*?)</source>").unwrap());
static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<description>(.*?)</description>").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

fn strip_cdata(s: &str) -> &str {
    s.trim()
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(s.trim())
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn tag_text(block: &str, re: &Regex) -> String {
    re.captures(block)
        .map(|c| unescape(strip_cdata(&c[1])).trim().to_string())
        .unwrap_or_default()
}

/// Parse an RSS 2.0 payload into feed items.
///
/// Tolerant by construction: a malformed item simply contributes empty
/// fields, and items without a link are dropped (they cannot be
/// deduplicated or cited).
pub fn parse_rss(xml: &str) -> Vec<FeedItem> {
    ITEM_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let block = &caps[1];
            let link = tag_text(block, &LINK_RE);
            if link.is_empty() {
                return None;
            }

            let summary_html = tag_text(block, &DESCRIPTION_RE);
            let summary = HTML_TAG_RE.replace_all(&summary_html, " ").trim().to_string();

            let published = {
                let raw = tag_text(block, &PUB_DATE_RE);
                DateTime::parse_from_rfc2822(&raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            };

            Some(FeedItem {
                title: tag_text(block, &TITLE_RE),
                link,
                source: tag_text(block, &SOURCE_RE),
                published,
                summary,
            })
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────
