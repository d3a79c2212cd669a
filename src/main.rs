use std::process;
use clap::Parser;

use rss_newsroom::cli::Cli;

#[tokio::main]
async fn main() {
    // a missing .env is fine; the environment and config file still apply
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
