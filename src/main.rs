//! Market-Harvester main entry point
//!
//! This is the command-line interface for the Market-Harvester crawler.

use anyhow::Context;
use clap::Parser;
use market_harvester::config::{load_config_with_hash, validate, Config};
use market_harvester::crawler::{listing_endpoint, CrawlPipeline};
use market_harvester::output::print_statistics;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Market-Harvester: an unattended product-listing crawler
///
/// Market-Harvester walks a market site's search results page by page through
/// a rotating pool of proxies and writes every product it finds to a JSON
/// snapshot.
#[derive(Parser, Debug)]
#[command(name = "market-harvester")]
#[command(version = "1.0.0")]
#[command(about = "An unattended product-listing crawler", long_about = None)]
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

    /// Override the number of listing pages to walk
    #[arg(long, value_name = "N")]
    pages: Option<u32>,

    /// Override the search query
    #[arg(long, value_name = "Q")]
    query: Option<String>,

    /// Override the products snapshot path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = load_config_with_hash(&cli.config)
        .map_err(anyhow::Error::from)
        .and_then(|(config, hash)| {
            let config = apply_overrides(config, &cli)?;
            Ok((config, hash))
        });

    let (config, hash) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            setup_logging(cli.verbose, cli.quiet, None)?;
            tracing::error!("Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    setup_logging(cli.verbose, cli.quiet, config.output.log_path.as_deref())?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        hash
    );

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if let Err(e) = handle_crawl(&config).await {
        tracing::error!("Harvest failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}

/// Applies command-line overrides and re-validates
fn apply_overrides(mut config: Config, cli: &Cli) -> anyhow::Result<Config> {
    if let Some(pages) = cli.pages {
        config.target.pages = pages;
    }
    if let Some(query) = &cli.query {
        config.target.query = query.clone();
    }
    if let Some(output) = &cli.output {
        config.output.products_path = output.display().to_string();
    }

    validate(&config)?;
    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// When a log path is given, events are also appended to that file without
/// ANSI colors.
fn setup_logging(verbose: u8, quiet: bool, log_path: Option<&str>) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("market_harvester=info,warn"),
            1 => EnvFilter::new("market_harvester=debug,info"),
            2 => EnvFilter::new("market_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let file_layer = match log_path {
        Some(path) => {
            let file = open_log_file(Path::new(path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Market-Harvester Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Query: {}", config.target.query);
    println!("  Pages: {}", config.target.pages);
    println!(
        "  First listing: {}",
        listing_endpoint(&config.target.query, 1)
    );
    println!("  CAPTCHA marker: {}", config.target.captcha_marker);
    println!("  Redirector marker: {}", config.target.redirector_marker);
    println!();

    println!("Proxies:");
    println!("  List URL: {}", config.proxy.list_url);
    println!("  Refill wait: {}s", config.proxy.refill_wait_secs);
    match config.proxy.max_refill_rounds {
        Some(rounds) => println!("  Max refill rounds: {}", rounds),
        None => println!("  Max refill rounds: unbounded"),
    }
    println!();

    println!("Identity:");
    println!("  User agents: {}", config.identity.user_agents.len());
    println!("  Accept-Language: {}", config.identity.accept_language);
    println!(
        "  Rate-limit pause: {}s",
        config.identity.rate_limit_pause_secs
    );
    println!(
        "  Request timeout: {}s",
        config.identity.request_timeout_secs
    );
    println!();

    println!("Pacing:");
    println!(
        "  Politeness delay: {}-{} ms",
        config.pacing.politeness_min_ms, config.pacing.politeness_max_ms
    );
    println!(
        "  Retry jitter: soft block {}s, proxy failure {}s, transient {}s",
        config.retry.soft_block_jitter_secs,
        config.retry.proxy_failure_jitter_secs,
        config.retry.transient_jitter_secs
    );
    match config.retry.max_attempts {
        Some(attempts) => println!("  Max attempts per operation: {}", attempts),
        None => println!("  Max attempts per operation: unbounded"),
    }
    println!();

    println!("Output:");
    println!("  Products: {}", config.output.products_path);
    if let Some(log_path) = &config.output.log_path {
        println!("  Log file: {}", log_path);
    }
    println!();

    println!("✓ Configuration is valid");
}

/// Handles the main crawl operation
///
/// Products gathered before a Fatal error are still persisted.
async fn handle_crawl(config: &Config) -> anyhow::Result<()> {
    let output = PathBuf::from(&config.output.products_path);

    let mut pipeline = CrawlPipeline::from_config(config)
        .await
        .context("failed to start the harvest")?;
    let outcome = pipeline.run().await;
    let stats = pipeline.stats().clone();
    let sink = pipeline.into_sink();

    sink.persist(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "✓ {} products written to: {}\n",
        sink.len(),
        output.display()
    );
    print_statistics(&stats);

    outcome.context("harvest stopped")
}
