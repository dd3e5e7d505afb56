//! Autolot main entry point
//!
//! This is the command-line interface for the Autolot catalog scraper.

use autolot::config::load_config;
use autolot::crawler::run_pipeline;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Autolot: a used-car catalog scraper
///
/// Autolot walks the paginated AutoRia catalog, collects links to car detail
/// pages, extracts a fixed set of fields per car (including the seller's
/// phone number via a secondary lookup) and stores the records in SQLite.
#[derive(Parser, Debug)]
#[command(name = "autolot")]
#[command(version = "1.0.0")]
#[command(about = "A used-car catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the discovered page count (bounded run)
    #[arg(long, value_name = "N")]
    pages: Option<usize>,

    /// Validate config and show what would be scraped without any network traffic
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // CLI override beats the config value
    if cli.pages.is_some() {
        config.scraper.pages_limit = cli.pages;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    match run_pipeline(config).await {
        Ok(()) => {
            tracing::info!("Scrape completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("autolot=info,warn"),
            1 => EnvFilter::new("autolot=debug,info"),
            2 => EnvFilter::new("autolot=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the plan
fn handle_dry_run(config: &autolot::config::Config) {
    println!("=== Autolot Dry Run ===\n");

    println!("Scraper:");
    println!("  Root URL: {}", config.scraper.root_url);
    println!("  Phone URL: {}", config.scraper.phone_url);
    println!("  Batch size: {}", config.scraper.batch_size);
    match config.scraper.pages_limit {
        Some(limit) => println!("  Pages: {} (override)", limit),
        None => println!("  Pages: discovered from pagination widget"),
    }

    println!("\nHTTP:");
    println!("  Attempts: {}", config.http.attempts_limit);
    println!("  Attempt delay: {}ms", config.http.attempt_delay_ms);
    println!("  Request timeout: {}s", config.http.timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}
