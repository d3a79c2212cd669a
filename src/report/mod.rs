pub mod gemini;

use std::sync::Arc;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::feed::ArticleRecord;

pub use gemini::{GeminiClient, ModelInfo};

const PREAMBLE: &str = "\
You are a professional IT news curator. Analyze the recent IT news articles \
provided below and write a one-page daily news report.

[Guidelines]
1. Group the articles by similar topic (e.g. AI/ML, semiconductors, mobile, business).
2. Summarize the key points of each topic in three sentences or fewer.
3. End every summary item with the title of the related article and a [Link](URL) citing the source.
4. Keep the overall tone professional and insightful.
5. Write the report in readable Markdown.

[News data]
";

/// A hosted model that turns one prompt into one block of text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn generate_content(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: Summarizer> Summarizer for Arc<T> {
    async fn generate_content(&self, prompt: &str) -> Result<String> {
        (**self).generate_content(prompt).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Cut `text` to at most `max` characters without splitting one.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct ReportGenerator<M> {
    model: M,
    max_articles: usize,
    summary_chars: usize,
    window_days: u32,
}

impl<M: Summarizer> ReportGenerator<M> {
    pub fn new(model: M) -> Self {
        Self::with_settings(model, &Settings::default())
    }

    pub fn with_settings(model: M, settings: &Settings) -> Self {
        Self {
            model,
            max_articles: settings.max_articles,
            summary_chars: settings.summary_chars,
            window_days: settings.window_days,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn empty_notice(&self) -> String {
        format!("No IT news from the last {} days.", self.window_days)
    }

    pub fn build_prompt(&self, articles: &[ArticleRecord]) -> String {
        let mut prompt = String::from(PREAMBLE);
        for (i, article) in articles.iter().take(self.max_articles).enumerate() {
            prompt.push_str(&format!(
                "{}. Title: {}\nLink: {}\nSummary: {}\n\n",
                i + 1,
                article.title,
                article.link,
                truncate_chars(&article.summary, self.summary_chars)
            ));
        }
        prompt
    }

    /// Markdown report for `articles`. Always returns renderable text: an
    /// empty input short-circuits to a notice, a model failure becomes an
    /// error report.
    pub async fn generate(&self, articles: &[ArticleRecord]) -> String {
        if articles.is_empty() {
            return self.empty_notice();
        }

        let prompt = self.build_prompt(articles);
        info!(
            "Summarizing {} of {} articles with {}",
            articles.len().min(self.max_articles),
            articles.len(),
            self.model.model_name()
        );

        match self.model.generate_content(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Report generation failed: {}", e);
                format!("**Error during AI analysis:** {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for RecordingModel {
        async fn generate_content(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            if self.fail {
                Err(Error::Model("quota exceeded".to_string()))
            } else {
                Ok("## AI/ML\nSummary".to_string())
            }
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn article(i: usize) -> ArticleRecord {
        ArticleRecord {
            title: format!("Headline {:02}", i),
            link: format!("https://news.test/{}", i),
            published_at: Utc::now(),
            summary: format!("Summary {}", i),
        }
    }

    #[tokio::test]
    async fn test_empty_input_skips_model() {
        let generator = ReportGenerator::new(Arc::new(RecordingModel::default()));
        let report = generator.generate(&[]).await;

        assert_eq!(report, "No IT news from the last 3 days.");
        assert!(generator.model().prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_is_capped_at_fifty_articles() {
        let generator = ReportGenerator::new(Arc::new(RecordingModel::default()));
        let articles: Vec<_> = (1..=60).map(article).collect();

        let report = generator.generate(&articles).await;
        assert_eq!(report, "## AI/ML\nSummary");

        let prompts = generator.model().prompts.lock();
        assert_eq!(prompts.len(), 1);
        for i in 1..=50 {
            assert!(prompts[0].contains(&format!("Title: Headline {:02}\n", i)));
        }
        for i in 51..=60 {
            assert!(!prompts[0].contains(&format!("Headline {:02}", i)));
        }
        assert!(prompts[0].contains("50. Title: Headline 50"));
    }

    #[tokio::test]
    async fn test_model_error_becomes_report() {
        let model = RecordingModel { fail: true, ..Default::default() };
        let generator = ReportGenerator::new(model);

        let report = generator.generate(&[article(1)]).await;
        assert!(report.starts_with("**Error during AI analysis:**"));
        assert!(report.contains("quota exceeded"));
    }

    #[test]
    fn test_summary_truncated_to_200_chars() {
        let generator = ReportGenerator::new(RecordingModel::default());
        let mut long = article(1);
        long.summary = "가".repeat(250);

        let prompt = generator.build_prompt(&[long]);
        let line = prompt.lines().find(|l| l.starts_with("Summary: ")).unwrap();
        assert_eq!(line.trim_start_matches("Summary: ").chars().count(), 200);
    }

    #[test]
    fn test_prompt_block_layout() {
        let generator = ReportGenerator::new(RecordingModel::default());
        let prompt = generator.build_prompt(&[article(7)]);

        assert!(prompt.starts_with("You are a professional IT news curator."));
        assert!(prompt.contains("[Link](URL)"));
        assert!(prompt.ends_with(
            "1. Title: Headline 07\nLink: https://news.test/7\nSummary: Summary 7\n\n"
        ));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 0), "");
    }
}
