use std::fs;
use std::path::PathBuf;
use chrono::Local;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::config::{Config, Credentials, LoggingConfig};
use crate::error::{Error, Result};
use crate::newsroom::{AnalysisStatus, FeedEdit, Newsroom};
use crate::report::GeminiClient;
use crate::storage::{DocumentStore, LocalFiles};
use crate::web::{self, Dashboard};

/// Write a commented template configuration.
pub async fn init(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::AlreadyExists(format!(
            "{} (use --force to overwrite)",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, default_config_template())?;
    info!("Created configuration: {}", path.display());

    println!("✅ Configuration written to {}", path.display());
    println!();
    println!("Next steps:");
    println!("   1. Fill in [secrets] (or export GITHUB_TOKEN, REPO_NAME, GEMINI_API_KEY, ADMIN_PASSWORD)");
    println!("   2. Add a feed: rss-newsroom add-feed <url>");
    println!("   3. Start the dashboard: rss-newsroom serve");
    Ok(())
}

fn credentials(config: &Config) -> Result<Credentials> {
    config.secrets.require()
}

fn newsroom(config: &Config, offline: bool) -> Result<Newsroom> {
    let credentials = credentials(config)?;
    build_newsroom(config, &credentials, offline)
}

fn build_newsroom(config: &Config, credentials: &Credentials, offline: bool) -> Result<Newsroom> {
    if offline {
        let store = DocumentStore::local_only(LocalFiles::new(config.data_root()));
        debug!("Offline mode: documents kept under {}", config.data_root().display());
        Ok(Newsroom::with_store(config, credentials, store))
    } else {
        Newsroom::from_config(config, credentials)
    }
}

fn print_notice(notice: Option<&str>) {
    if let Some(notice) = notice {
        println!("⚠️  {}", notice);
    }
}

pub async fn serve(config: &Config, offline: bool, bind: Option<String>) -> Result<()> {
    let credentials = credentials(config)?;
    let newsroom = build_newsroom(config, &credentials, offline)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    println!("📰 Newsroom on http://{} ({})", bind, newsroom.store().describe());
    web::serve(Dashboard::new(newsroom, credentials), &bind).await
}

/// Run the analysis pipeline once and print the report.
pub async fn run(config: &Config, offline: bool) -> Result<()> {
    let newsroom = newsroom(config, offline)?;
    let outcome = newsroom.run_analysis().await;

    for step in &outcome.steps {
        println!("• {}", step);
    }
    for notice in &outcome.notices {
        print_notice(Some(notice));
    }

    match outcome.status {
        AnalysisStatus::NoFeeds => {
            println!("📋 No feeds configured yet.");
            println!("   Add feeds with: rss-newsroom add-feed <url>");
        }
        AnalysisStatus::Completed { date, articles, report, synced } => {
            println!();
            println!("{}", report);
            println!();
            println!(
                "✅ Report for {} saved ({} articles{})",
                date,
                articles,
                if synced || offline { "" } else { ", local copy only" }
            );
        }
    }
    Ok(())
}

pub async fn add_feed(config: &Config, offline: bool, url: &str) -> Result<()> {
    let newsroom = newsroom(config, offline)?;
    let change = newsroom.add_feed(url).await;
    print_notice(change.notice.as_deref());

    match change.edit {
        FeedEdit::Added => {
            println!("✅ Feed added: {}", url.trim());
            if change.synced == Some(false) && !offline {
                println!("⚠️  Saved locally only; remote sync failed");
            }
            Ok(())
        }
        FeedEdit::Duplicate => Err(Error::AlreadyExists("Feed already exists.".to_string())),
        FeedEdit::Empty => Err(Error::Invalid("Please enter a URL.".to_string())),
        FeedEdit::Invalid(reason) => Err(Error::InvalidUrl(reason)),
        FeedEdit::Removed(_) | FeedEdit::Missing => Ok(()),
    }
}

pub async fn remove_feed(config: &Config, offline: bool, url: &str) -> Result<()> {
    let newsroom = newsroom(config, offline)?;
    let change = newsroom.remove_feed(url).await;
    print_notice(change.notice.as_deref());

    match change.edit {
        FeedEdit::Removed(removed) => {
            println!("✅ Feed removed: {}", removed);
            if change.synced == Some(false) && !offline {
                println!("⚠️  Saved locally only; remote sync failed");
            }
            Ok(())
        }
        _ => Err(Error::NotFound(format!("Feed '{}'", url.trim()))),
    }
}

pub async fn list_feeds(config: &Config, offline: bool) -> Result<()> {
    let newsroom = newsroom(config, offline)?;
    let feeds = newsroom.feeds().await;
    print_notice(feeds.notice.as_deref());

    if feeds.doc.is_empty() {
        println!("📋 No feeds configured yet.");
        println!("   Add feeds with: rss-newsroom add-feed <url>");
        return Ok(());
    }

    println!("📋 Configured RSS Feeds ({}):", feeds.doc.len());
    for (i, url) in feeds.doc.urls().iter().enumerate() {
        println!("  {:>3}. {}", i + 1, url);
    }
    Ok(())
}

pub async fn reports(config: &Config, offline: bool, date: Option<&str>, list: bool) -> Result<()> {
    let newsroom = newsroom(config, offline)?;
    let archive = newsroom.archive().await;
    print_notice(archive.notice.as_deref());

    if archive.doc.is_empty() {
        println!("📭 No news report has been generated yet.");
        return Ok(());
    }

    if list {
        for key in archive.doc.dates_desc() {
            println!("{}", key);
        }
        return Ok(());
    }

    let (key, report) = match date {
        Some(date) => archive
            .doc
            .get(date)
            .map(|report| (date, report))
            .ok_or_else(|| Error::NotFound(format!("Report for {}", date)))?,
        None => archive
            .doc
            .latest()
            .ok_or_else(|| Error::NotFound("Latest report".to_string()))?,
    };

    println!("# {}", key);
    println!();
    println!("{}", report);
    Ok(())
}

pub async fn stats(config: &Config, offline: bool) -> Result<()> {
    let newsroom = newsroom(config, offline)?;
    let stats = newsroom.stats().await;
    print_notice(stats.notice.as_deref());

    println!("📊 Visitor Statistics");
    println!("=====================");
    println!("Total views: {}", stats.doc.total_views);
    println!("Today ({}): {}", Local::now().date_naive(), stats.doc.visitors_on(Local::now().date_naive()));

    let series = stats.doc.daily_series();
    if series.is_empty() {
        println!("Not enough data for chart.");
        return Ok(());
    }

    let peak = series.iter().map(|(_, v)| *v).max().unwrap_or(1).max(1);
    for (day, count) in series {
        let width = ((count as f64 / peak as f64) * 40.0).round() as usize;
        println!("{}  {:>6}  {}", day, count, "█".repeat(width));
    }
    Ok(())
}

pub async fn list_models(config: &Config) -> Result<()> {
    let credentials = credentials(config)?;
    let client = GeminiClient::new(credentials.gemini_api_key, &config.settings);
    let models = client.list_models().await?;

    println!("Available models (generateContent):");
    for model in models {
        match model.display_name {
            Some(display) => println!("  {}  ({})", model.name, display),
            None => println!("  {}", model.name),
        }
    }
    Ok(())
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let cmd_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, cmd_name, &mut std::io::stdout());
}

/// `RUST_LOG` wins when set; otherwise `--debug`, `--verbose`, then the
/// configured level.
pub fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = if logging.json_format {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_file(debug)
            .with_line_number(debug)
            .try_init()
    };
    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized");
    Ok(())
}

fn default_config_template() -> String {
    format!(
        r#"# RSS Newsroom configuration
# Generated on {}

[secrets]
# Each value can also come from the environment or .streamlit/secrets.toml
# github_token = "ghp_..."
# repo_name = "owner/news-data"
# gemini_api_key = "..."
# admin_password = "..."

[settings]
# Articles older than this many days are skipped
window_days = 3

# At most this many articles go into one report
max_articles = 50

# Article summaries are cut to this many characters in the prompt
summary_chars = 200

model = "gemini-2.5-flash-lite"

# HTTP timeout in seconds
timeout = 30

# Local copies of the JSON documents live under <data_dir>/data
data_dir = "."

# branch = "main"

[server]
bind = "127.0.0.1:8501"

[logging]
level = "info"
json_format = false
"#,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}
