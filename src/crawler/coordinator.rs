//! Crawl orchestrator
//!
//! Seeds the frontier, opens one page driver session per worker, runs the
//! workers behind the admission gate and ticks the stop signal and resource
//! governor until the crawl drains or is stopped. Exit is always graceful:
//! in-flight pages finish, every session is closed and the sink is flushed.

use crate::config::{Config, CrawlerConfig, LimitsConfig};
use crate::crawler::governor::{Governor, GovernorAction, ResourceSampler};
use crate::crawler::state::CrawlState;
use crate::crawler::stats::{CrawlSnapshot, CrawlStats};
use crate::crawler::stop::StopSignal;
use crate::crawler::worker::{Worker, WorkerContext, WorkerSettings};
use crate::driver::{DriverFactory, PageDriver, PageHook};
use crate::extract::Extractor;
use crate::output::VisitedLog;
use crate::robots::RobotsGate;
use crate::storage::SharedSink;
use crate::url::{normalize_prefix, normalize_url};
use crate::HarvestError;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

/// The pluggable parts of a crawl
pub struct CrawlComponents {
    pub drivers: Arc<dyn DriverFactory>,
    pub extractor: Arc<dyn Extractor>,
    pub sink: SharedSink,
    pub audit: Arc<VisitedLog>,
    pub sampler: Box<dyn ResourceSampler>,
    pub hooks: Vec<Arc<dyn PageHook>>,

    /// Present when robots.txt is obeyed
    pub robots: Option<Arc<RobotsGate>>,
}

/// Runs one crawl from seeds to drained frontier
pub struct Orchestrator {
    crawler: CrawlerConfig,
    limits: LimitsConfig,
    stop_signal: StopSignal,
    components: CrawlComponents,
    cancel: CancellationToken,
    stats: Arc<CrawlStats>,
}

impl Orchestrator {
    pub fn new(config: &Config, components: CrawlComponents) -> Self {
        Self {
            crawler: config.crawler.clone(),
            limits: config.limits.clone(),
            stop_signal: StopSignal::new(config.input.stop_file.as_ref().map(PathBuf::from)),
            components,
            cancel: CancellationToken::new(),
            stats: Arc::new(CrawlStats::new()),
        }
    }

    /// Token that requests a cooperative stop when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Live counters, readable while the crawl runs
    pub fn stats(&self) -> Arc<CrawlStats> {
        self.stats.clone()
    }

    /// Crawls from `seeds` until the frontier drains or a stop is requested
    ///
    /// Invalid seeds are skipped with a warning; having none left is an
    /// error. Returns the final counters, or the first fatal error (session
    /// construction or sink failure).
    pub async fn run(self, seeds: &[String]) -> Result<CrawlSnapshot, HarvestError> {
        let started = Instant::now();
        let seeds = parse_seeds(seeds)?;

        let prefix = match &self.crawler.allowed_prefix {
            Some(configured) => normalize_prefix(configured)?,
            None => default_prefix(&seeds[0]),
        };
        tracing::info!("Following links under {}", prefix);

        let state = Arc::new(CrawlState::new(prefix, self.cancel.clone()));
        for url in seeds {
            state.seed(url);
        }
        tracing::info!("Seeded frontier with {} URLs", state.pending_len());

        let concurrency = self.crawler.concurrency.max(1) as usize;
        let gate = Arc::new(Semaphore::new(concurrency));
        let components = self.components;
        let mut governor = Governor::new(components.sampler, self.limits.clone(), gate.clone());

        let drivers = open_sessions(components.drivers.as_ref(), concurrency).await?;

        let ctx = Arc::new(WorkerContext {
            state: state.clone(),
            gate,
            extractor: components.extractor,
            sink: components.sink,
            audit: components.audit,
            hooks: components.hooks,
            robots: components.robots,
            settings: WorkerSettings::from_config(&self.crawler),
            stats: self.stats.clone(),
        });

        let mut workers = JoinSet::new();
        for (id, driver) in drivers.into_iter().enumerate() {
            workers.spawn(Worker::new(id, driver, ctx.clone()).run());
        }
        tracing::info!("Started {} workers", concurrency);

        let mut ticker = tokio::time::interval(Duration::from_millis(self.crawler.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first_error: Option<HarvestError> = None;

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(_pages))) => {}
                    Some(Ok(Err(e))) => {
                        first_error.get_or_insert(e);
                    }
                    Some(Err(e)) => {
                        tracing::error!("Worker task panicked: {}", e);
                        state.stop();
                        first_error.get_or_insert(HarvestError::Worker(e.to_string()));
                    }
                },
                _ = ticker.tick() => {
                    if !state.stopping() && self.stop_signal.requested() {
                        tracing::info!("Stop file found, finishing in-flight pages");
                        state.stop();
                    }

                    if state.stopping() {
                        // Waiting workers must be able to finish their page
                        governor.release_all();
                        continue;
                    }

                    let before = governor.warnings();
                    let action = governor.tick();
                    self.stats.limit_warnings(governor.warnings() - before);
                    if action == GovernorAction::Stop {
                        state.stop();
                        governor.release_all();
                    }
                }
            }
        }
        governor.release_all();

        if state.stopping() {
            tracing::info!(
                "Crawl stopped with {} URLs left in the frontier",
                state.pending_len()
            );
        } else {
            tracing::info!("Frontier is empty, crawl complete");
        }

        let flushed = ctx
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush();
        if let Err(e) = flushed {
            tracing::error!("Failed to flush sink: {}", e);
            first_error.get_or_insert(e.into());
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            "Crawl finished: {} pages visited, {} records stored in {:?}",
            snapshot.pages_visited,
            snapshot.records_stored,
            started.elapsed()
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(snapshot),
        }
    }
}

/// Normalizes the seed list, dropping entries that are not http(s) URLs
fn parse_seeds(seeds: &[String]) -> Result<Vec<Url>, HarvestError> {
    let urls: Vec<Url> = seeds
        .iter()
        .filter_map(|seed| match normalize_url(seed) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Skipping invalid seed {}: {}", seed, e);
                None
            }
        })
        .collect();

    if urls.is_empty() {
        return Err(HarvestError::Seeds("no valid seed URLs".to_string()));
    }
    Ok(urls)
}

/// Origin of the first seed, with a trailing slash
fn default_prefix(seed: &Url) -> String {
    format!("{}/", seed.origin().ascii_serialization())
}

/// Opens one session per worker; on failure closes the ones already open
async fn open_sessions(
    factory: &dyn DriverFactory,
    count: usize,
) -> Result<Vec<Box<dyn PageDriver>>, HarvestError> {
    let mut drivers = Vec::with_capacity(count);

    for _ in 0..count {
        match factory.create().await {
            Ok(driver) => drivers.push(driver),
            Err(e) => {
                tracing::error!("Failed to start page driver session: {}", e);
                for mut driver in drivers {
                    if let Err(close_err) = driver.close().await {
                        tracing::warn!("Failed to close session: {}", close_err);
                    }
                }
                return Err(e.into());
            }
        }
    }

    Ok(drivers)
}
