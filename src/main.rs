//! Crawline main entry point
//!
//! This is the command-line interface for the Crawline web harvester.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use crawline::config::{load_config, Config};
use crawline::crawler::{DispatchTable, LinkParser};
use crawline::Engine;
use futures::StreamExt;
use regex::Regex;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Crawline: a polite, resumable web harvester
///
/// Crawline follows links breadth-first from a seed URL, keeps a versioned
/// compressed copy of every fetched resource and records header and link
/// metadata in SQLite.
#[derive(Parser, Debug)]
#[command(name = "crawline")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resumable web harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl from a seed URL, fetching what is missing or stale
    Crawl {
        seed: String,

        /// Only links matching this regex are followed
        #[arg(long)]
        follow: String,

        /// Refetch cached copies older than this many seconds
        #[arg(long)]
        max_age_secs: Option<i64>,
    },

    /// Re-run extraction over cached data only and print the result as JSON
    Parse {
        seed: String,

        /// Only links matching this regex are followed
        #[arg(long)]
        follow: String,
    },

    /// Show the cached envelope and index record of a URL
    Show { url: String },

    /// List every cached URL
    List,

    /// Delete every cached object and metadata row
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Command::Crawl {
            seed,
            follow,
            max_age_secs,
        } => {
            let max_age = max_age_secs.map(chrono::Duration::seconds);
            handle_crawl(&config, &seed, &follow, max_age).await
        }
        Command::Parse { seed, follow } => handle_parse(&config, &seed, &follow).await,
        Command::Show { url } => handle_show(&config, &url).await,
        Command::List => handle_list(&config).await,
        Command::Purge => handle_purge(&config).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawline=info,warn"),
            1 => EnvFilter::new("crawline=debug,info"),
            2 => EnvFilter::new("crawline=trace,debug"),
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

/// Builds an engine whose single route sends every URL to a `LinkParser`
fn build_engine(
    config: &Config,
    follow: &str,
    max_age: Option<chrono::Duration>,
) -> anyhow::Result<Engine> {
    let follow = Regex::new(follow).with_context(|| format!("invalid --follow regex {follow:?}"))?;
    let dispatch = DispatchTable::builder()
        .route(".*", LinkParser::factory(follow, max_age))
        .build()?;
    Ok(Engine::from_config(config, dispatch)?)
}

async fn handle_crawl(
    config: &Config,
    seed: &str,
    follow: &str,
    max_age: Option<chrono::Duration>,
) -> anyhow::Result<()> {
    let engine = build_engine(config, follow, max_age)?;
    let report = engine.crawl(seed).await?;

    println!("=== Crawl Report ===\n");
    println!("Succeeded: {}", report.succeeded.len());
    println!("Failed:    {}", report.failed.len());
    println!("Pending:   {}", report.pending.len());
    println!("Fetches:   {}", report.fetches);

    if !report.failures.is_empty() {
        println!("\nFailures:");
        for (url, failure) in &report.failures {
            println!("  - {} [{}] {}", url, failure.stage, failure.reason);
        }
    }

    Ok(())
}

async fn handle_parse(config: &Config, seed: &str, follow: &str) -> anyhow::Result<()> {
    let engine = build_engine(config, follow, None)?;
    let context = engine.parse(seed).await?;
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

async fn handle_show(config: &Config, url: &str) -> anyhow::Result<()> {
    let engine = build_engine(config, ".*", None)?;

    match engine.cache().get_object(url).await? {
        Some(object) => {
            println!("URL:        {}", object.url);
            println!("Method:     {}", object.request_method);
            println!("Fetched at: {}", object.fetched_at.to_rfc3339());
            println!("Body:       {} bytes", object.response_body.len());
            println!("Response headers:");
            for (name, value) in &object.response_headers {
                println!("  {}: {}", name, value);
            }
        }
        None => println!("{} is not cached", url),
    }

    if let Some(entry) = engine.index_entry(url)? {
        println!("\nIndex record #{}:", entry.cache_id);
        println!("  Storage path: {}", entry.record.storage_path);
        println!("  Headers:      {}", entry.headers.len());
        println!("  Links:");
        for link in &entry.links {
            println!("    * {}", link.url);
        }
    }

    Ok(())
}

async fn handle_list(config: &Config) -> anyhow::Result<()> {
    let engine = build_engine(config, ".*", None)?;
    let mut objects = Box::pin(engine.cache().list_objects());
    let mut count = 0usize;

    while let Some(object) = objects.next().await {
        match object {
            Ok(object) => {
                println!("{}\t{}", object.fetched_at.to_rfc3339(), object.url);
                count += 1;
            }
            Err(e) => tracing::warn!("Skipping unreadable object: {}", e),
        }
    }

    tracing::info!("Listed {} cached objects", count);
    Ok(())
}

async fn handle_purge(config: &Config) -> anyhow::Result<()> {
    let engine = build_engine(config, ".*", None)?;
    let removed = engine.purge_all().await?;
    println!("✓ Removed {} cached objects and all metadata", removed);
    Ok(())
}
