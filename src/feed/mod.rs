pub mod fetcher;
pub mod ingestor;
pub mod parser;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One dated entry kept by an ingestion run. Never persisted; it lives only
/// as long as it takes to build the report prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl ParsedEntry {
    /// `published` wins over `updated`; an entry with neither cannot be dated.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.published.or(self.updated)
    }

    pub fn into_record(self) -> Option<ArticleRecord> {
        let published_at = self.timestamp()?;
        let summary = self.summary.or(self.content).unwrap_or_default();

        Some(ArticleRecord {
            title: self.title,
            link: self.link,
            published_at,
            summary,
        })
    }
}

/// Anything that can turn a feed URL into parsed entries.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<ParsedFeed>;
}
