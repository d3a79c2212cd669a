//! The admin and reader actions, wired to the store, the ingestor and the
//! report generator. Both the CLI and the dashboard go through here.

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::config::{Config, Credentials};
use crate::error::Result;
use crate::feed::fetcher::FeedFetcher;
use crate::feed::ingestor::{FeedIngestor, FeedOutcome};
use crate::feed::parser::FeedParser;
use crate::feed::FeedSource;
use crate::report::{GeminiClient, ReportGenerator, Summarizer};
use crate::stats;
use crate::storage::{
    date_key, AddOutcome, DocumentStore, FeedList, Loaded, NewsArchive, VisitorStats,
};

#[derive(Debug, Clone)]
pub enum AnalysisStatus {
    /// Nothing to ingest; no report was written.
    NoFeeds,
    Completed {
        date: String,
        articles: usize,
        report: String,
        synced: bool,
    },
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub status: AnalysisStatus,
    /// Human-readable progress lines, in order.
    pub steps: Vec<String>,
    pub feeds: Vec<FeedOutcome>,
    pub notices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEdit {
    Added,
    Removed(String),
    Duplicate,
    Empty,
    Invalid(String),
    Missing,
}

#[derive(Debug, Clone)]
pub struct FeedChange {
    pub edit: FeedEdit,
    pub feeds: FeedList,
    /// `None` when nothing was written.
    pub synced: Option<bool>,
    pub notice: Option<String>,
}

pub struct Newsroom<S = FeedFetcher, M = GeminiClient> {
    store: DocumentStore,
    ingestor: FeedIngestor<S>,
    generator: ReportGenerator<M>,
    window_days: u32,
}

impl Newsroom<FeedFetcher, GeminiClient> {
    /// Production wiring: GitHub-backed store, HTTP feed fetcher, Gemini.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        let store = DocumentStore::github(credentials, &config.settings)?;
        Ok(Self::with_store(config, credentials, store))
    }

    /// Same wiring over an arbitrary document store.
    pub fn with_store(config: &Config, credentials: &Credentials, store: DocumentStore) -> Self {
        let settings = &config.settings;
        let ingestor = FeedIngestor::new(FeedFetcher::with_settings(settings));
        let model = GeminiClient::new(credentials.gemini_api_key.clone(), settings);
        let generator = ReportGenerator::with_settings(model, settings);

        Self::new(store, ingestor, generator, settings.window_days)
    }
}

impl<S: FeedSource, M: Summarizer> Newsroom<S, M> {
    pub fn new(
        store: DocumentStore,
        ingestor: FeedIngestor<S>,
        generator: ReportGenerator<M>,
        window_days: u32,
    ) -> Self {
        Self { store, ingestor, generator, window_days }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn generator(&self) -> &ReportGenerator<M> {
        &self.generator
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    pub async fn feeds(&self) -> Loaded<FeedList> {
        self.store.load_doc().await
    }

    pub async fn archive(&self) -> Loaded<NewsArchive> {
        self.store.load_doc().await
    }

    pub async fn stats(&self) -> Loaded<VisitorStats> {
        self.store.load_doc().await
    }

    pub async fn record_visit(&self) -> VisitorStats {
        stats::record_visit(&self.store).await
    }

    pub async fn run_analysis(&self) -> AnalysisOutcome {
        self.run_analysis_on(Local::now().date_naive()).await
    }

    /// Ingest, summarize and store the report under `today`, replacing any
    /// earlier report for that date.
    pub async fn run_analysis_on(&self, today: NaiveDate) -> AnalysisOutcome {
        let mut steps = vec!["Fetching RSS feeds...".to_string()];
        let mut notices = Vec::new();

        let feeds = self.feeds().await;
        notices.extend(feeds.notice);
        if feeds.doc.is_empty() {
            steps.push("No feeds configured.".to_string());
            return AnalysisOutcome { status: AnalysisStatus::NoFeeds, steps, feeds: Vec::new(), notices };
        }

        let ingest = self.ingestor.ingest(feeds.doc.urls(), self.window_days).await;
        steps.push(format!(
            "Found {} articles from the last {} days.",
            ingest.articles.len(),
            self.window_days
        ));
        for failed in ingest.failed_feeds() {
            steps.push(format!(
                "Skipped {}: {}",
                failed.url,
                failed.error.as_deref().unwrap_or("unknown error")
            ));
        }

        steps.push(format!("Generating AI summary ({})...", self.generator.model().model_name()));
        let report = self.generator.generate(&ingest.articles).await;

        steps.push("Saving report...".to_string());
        let date = date_key(today);
        // reload right before writing so a report saved meanwhile is kept
        let mut archive = self.archive().await;
        notices.extend(archive.notice.take());
        archive.doc.insert(today, report.clone());
        let synced = self.store.save_doc(&archive.doc, &format!("Add report for {}", date)).await;
        if !synced && !self.store.is_local_only() {
            notices.push(format!("Report for {} saved locally only; remote sync failed", date));
        }

        info!("Report for {} generated from {} articles", date, ingest.articles.len());
        AnalysisOutcome {
            status: AnalysisStatus::Completed {
                date,
                articles: ingest.articles.len(),
                report,
                synced,
            },
            steps,
            feeds: ingest.feeds,
            notices,
        }
    }

    pub async fn add_feed(&self, url: &str) -> FeedChange {
        let Loaded { doc: mut feeds, notice, .. } = self.feeds().await;
        let url = url.trim();

        let edit = if url.is_empty() {
            FeedEdit::Empty
        } else if feeds.contains(url) {
            FeedEdit::Duplicate
        } else if let Err(e) = FeedParser::new().validate_feed_url(url) {
            FeedEdit::Invalid(e.to_string())
        } else {
            match feeds.add(url) {
                AddOutcome::Added => FeedEdit::Added,
                AddOutcome::Duplicate => FeedEdit::Duplicate,
                AddOutcome::Empty => FeedEdit::Empty,
            }
        };

        let synced = if edit == FeedEdit::Added {
            Some(self.store.save_doc(&feeds, "Add feed URL").await)
        } else {
            None
        };

        FeedChange { edit, feeds, synced, notice }
    }

    pub async fn remove_feed(&self, url: &str) -> FeedChange {
        let Loaded { doc: mut feeds, notice, .. } = self.feeds().await;
        let edit = if feeds.remove(url) {
            FeedEdit::Removed(url.trim().to_string())
        } else {
            FeedEdit::Missing
        };
        self.finish_removal(edit, feeds, notice).await
    }

    /// Remove by position in the list as currently stored.
    pub async fn remove_feed_at(&self, index: usize) -> FeedChange {
        let Loaded { doc: mut feeds, notice, .. } = self.feeds().await;
        let edit = match feeds.remove_at(index) {
            Some(url) => FeedEdit::Removed(url),
            None => FeedEdit::Missing,
        };
        self.finish_removal(edit, feeds, notice).await
    }

    async fn finish_removal(&self, edit: FeedEdit, feeds: FeedList, notice: Option<String>) -> FeedChange {
        let synced = match edit {
            FeedEdit::Removed(_) => Some(self.store.save_doc(&feeds, "Remove feed URL").await),
            _ => None,
        };
        FeedChange { edit, feeds, synced, notice }
    }
}
