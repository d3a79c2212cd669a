pub mod commands;

use clap::{Parser, Subcommand};
use crate::config::Config;
use crate::error::Result;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rss-newsroom")]
#[command(about = "Daily AI-written IT news reports from RSS feeds")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (default: ./newsroom.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Keep documents in the local data directory only
    #[arg(long, global = true)]
    pub offline: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a template configuration file
    Init {
        /// Where to write it
        #[arg(default_value = "newsroom.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Serve the newsroom and admin dashboard
    Serve {
        /// Address to listen on (overrides [server] bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fetch feeds, generate today's report and store it
    Run,

    /// Add an RSS feed
    AddFeed {
        /// Feed URL
        url: String,
    },

    /// Remove an RSS feed
    RemoveFeed {
        /// Feed URL
        url: String,
    },

    /// List all configured feeds
    ListFeeds,

    /// Show a stored report, or list report dates
    Reports {
        /// Report date (YYYY-MM-DD); the newest report when omitted
        #[arg(long)]
        date: Option<String>,

        /// Only list the available dates
        #[arg(short, long)]
        list: bool,
    },

    /// Show visitor statistics
    Stats,

    /// List Gemini models that support content generation
    ListModels,

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = match &self.command {
            Commands::Init { .. } | Commands::Completions { .. } => Config::default(),
            _ => Config::discover(self.config.as_deref())?,
        };

        commands::init_logging(self.debug, self.verbose, &config.logging)?;

        match self.command {
            Commands::Init { path, force } => commands::init(path, force).await,
            Commands::Serve { bind } => commands::serve(&config, self.offline, bind).await,
            Commands::Run => commands::run(&config, self.offline).await,
            Commands::AddFeed { url } => commands::add_feed(&config, self.offline, &url).await,
            Commands::RemoveFeed { url } => commands::remove_feed(&config, self.offline, &url).await,
            Commands::ListFeeds => commands::list_feeds(&config, self.offline).await,
            Commands::Reports { date, list } => {
                commands::reports(&config, self.offline, date.as_deref(), list).await
            }
            Commands::Stats => commands::stats(&config, self.offline).await,
            Commands::ListModels => commands::list_models(&config).await,
            Commands::Completions { shell } => {
                commands::generate_completions(shell);
                Ok(())
            }
        }
    }
}
