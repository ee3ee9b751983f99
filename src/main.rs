//! Code Harvest main entry point
//!
//! This is the command-line interface for the Code Harvest crawler.

use anyhow::Context;
use clap::Parser;
use code_harvest::config::{
    load_config_with_hash, load_proxies, load_seeds, load_user_agents, Config,
};
use code_harvest::crawler::{
    watch_ctrl_c, watch_stdin, CrawlComponents, Orchestrator, ProcessSampler,
};
use code_harvest::driver::build_factory;
use code_harvest::extract::HtmlExtractor;
use code_harvest::output::{load_statistics, print_run_summary, print_statistics, VisitedLog};
use code_harvest::robots::RobotsGate;
use code_harvest::storage::{RunStatus, SqliteStorage};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Code Harvest: a documentation and code-sample crawler
///
/// Code Harvest visits a seed list of documentation sites, expands dynamic
/// content, extracts text and code blocks, and stores each unique page in
/// SQLite. Press `q` + Enter, hit Ctrl-C, or create the configured stop file
/// to finish the pages in flight and exit.
#[derive(Parser, Debug)]
#[command(name = "code-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A documentation and code-sample crawler", long_about = None)]
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

    /// Validate config and inputs without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, Path::new(&config.output.log_path))?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, config_hash).await
    }
}

/// Sets up stderr and log-file output based on verbosity level
fn setup_logging(verbose: u8, quiet: bool, log_path: &Path) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("code_harvest=info,warn"),
            1 => EnvFilter::new("code_harvest=debug,info"),
            2 => EnvFilter::new("code_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_target(false),
        )
        .init();

    Ok(())
}

/// Handles the --dry-run mode: validates config and inputs
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let seeds = load_seeds(Path::new(&config.input.seeds_path))?;
    let proxies = load_proxies(config.input.proxies_path.as_deref().map(Path::new))?;
    let user_agents = load_user_agents(config.input.user_agents_path.as_deref().map(Path::new))?;

    println!("=== Code Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.concurrency);
    println!("  Page load timeout: {}ms", config.crawler.page_load_timeout_ms);
    println!("  Load attempts: {}", config.crawler.max_load_attempts);
    println!("  Download delay: {}ms", config.crawler.download_delay_ms);
    println!(
        "  Allowed prefix: {}",
        config
            .crawler
            .allowed_prefix
            .as_deref()
            .unwrap_or("(origin of first seed)")
    );
    println!("  Obey robots.txt: {}", config.crawler.obey_robots);

    println!("\nLimits:");
    println!("  Memory: {} MB", config.limits.memory_limit_mb);
    println!("  CPU: {}%", config.limits.cpu_limit_percent);
    println!("  On exceeded: {:?}", config.limits.on_exceeded);

    println!("\nDriver: {:?}", config.driver.kind);
    println!("  Proxies: {}", proxies.len());
    println!("  User agents: {}", user_agents.len());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Log: {}", config.output.log_path);
    println!("  Visited log: {}", config.output.visited_log_path);

    println!("\nSeeds ({}):", seeds.len());
    for seed in &seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    let seeds = load_seeds(Path::new(&config.input.seeds_path))?;
    let proxies = load_proxies(config.input.proxies_path.as_deref().map(Path::new))
        .context("Failed to read proxy list")?;
    let user_agents = load_user_agents(config.input.user_agents_path.as_deref().map(Path::new))
        .context("Failed to read user-agent list")?;
    tracing::info!(
        "Loaded {} seeds, {} proxies, {} user agents",
        seeds.len(),
        proxies.len(),
        user_agents.len()
    );

    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let run_id = storage.create_run(&config_hash)?;
    tracing::info!("Starting crawl run {}", run_id);
    let storage = Arc::new(Mutex::new(storage));

    let audit = VisitedLog::open(Path::new(&config.output.visited_log_path))
        .context("Failed to open visited log")?;

    let robots = if config.crawler.obey_robots {
        Some(Arc::new(RobotsGate::new().context("Failed to build robots.txt client")?))
    } else {
        None
    };

    let components = CrawlComponents {
        drivers: build_factory(&config.driver, user_agents, proxies),
        extractor: Arc::new(HtmlExtractor::new()),
        sink: storage.clone(),
        audit: Arc::new(audit),
        sampler: Box::new(ProcessSampler::new()),
        hooks: Vec::new(),
        robots,
    };

    let orchestrator = Orchestrator::new(&config, components);
    let cancel = orchestrator.cancel_token();
    let ctrl_c = watch_ctrl_c(cancel.clone());
    watch_stdin(cancel.clone());

    let result = orchestrator.run(&seeds).await;
    let stopped = cancel.is_cancelled();
    ctrl_c.abort();

    let status = match &result {
        Ok(_) if stopped => RunStatus::Interrupted,
        Ok(_) => RunStatus::Completed,
        Err(_) => RunStatus::Failed,
    };
    storage
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .finish_run(status)?;

    match result {
        Ok(snapshot) => {
            print_run_summary(&snapshot);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
