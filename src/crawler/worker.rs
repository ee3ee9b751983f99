//! Crawl worker
//!
//! A worker owns one page driver session and pulls URLs from the shared
//! [`CrawlState`] until the frontier is exhausted or a stop is requested.
//! Each URL is walked through the [`PageStage`] machine:
//!
//! ```text
//! Pending -> Loading -> Expanding -> Extracting -> Admitted -> LinkDiscovery -> Done
//!               |  ^                      |            |
//!               v  |                      v            v
//!          RetryPending                Rejected ---> Done
//! ```
//!
//! Loading, expansion and extraction happen while holding a permit from the
//! admission gate; the politeness delay and link discovery do not.

use crate::config::CrawlerConfig;
use crate::crawler::dedup::Admission;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::state::CrawlState;
use crate::crawler::stats::CrawlStats;
use crate::driver::{ElementPredicate, LinkCandidate, PageDriver, PageHook};
use crate::extract::{ExtractionRecord, Extractor};
use crate::output::VisitedLog;
use crate::robots::RobotsGate;
use crate::state::PageStage;
use crate::storage::SharedSink;
use crate::url::filter_links;
use crate::HarvestError;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Timing and retry knobs for one worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub page_load_timeout: Duration,
    pub ready_timeout: Duration,
    pub retry: RetryPolicy,
    pub scroll_max_iterations: u32,
    pub scroll_stability_wait: Duration,
    pub click_wait: Duration,
    pub download_delay: Duration,
    pub hook_settle: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            page_load_timeout: Duration::from_millis(config.page_load_timeout_ms),
            ready_timeout: Duration::from_millis(config.ready_timeout_ms),
            retry: RetryPolicy::from_config(config),
            scroll_max_iterations: config.scroll_max_iterations,
            scroll_stability_wait: Duration::from_millis(config.scroll_stability_wait_ms),
            click_wait: Duration::from_millis(config.click_wait_ms),
            download_delay: Duration::from_millis(config.download_delay_ms),
            hook_settle: Duration::from_millis(config.hook_settle_ms),
        }
    }
}

/// Everything workers share
pub struct WorkerContext {
    pub state: Arc<CrawlState>,
    pub gate: Arc<Semaphore>,
    pub extractor: Arc<dyn Extractor>,
    pub sink: SharedSink,
    pub audit: Arc<VisitedLog>,
    pub hooks: Vec<Arc<dyn PageHook>>,
    pub robots: Option<Arc<RobotsGate>>,
    pub settings: WorkerSettings,
    pub stats: Arc<CrawlStats>,
}

/// How a single URL ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Record written; `links` new URLs entered the frontier
    Stored { links: usize },
    Duplicate,
    Empty,
    /// Blocked by robots.txt, never loaded
    Disallowed,
    /// Non-timeout navigation error
    NavigationFailed,
    ExtractionFailed,
    /// Every load attempt timed out
    Abandoned,
}

pub struct Worker {
    id: usize,
    driver: Box<dyn PageDriver>,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub fn new(id: usize, driver: Box<dyn PageDriver>, ctx: Arc<WorkerContext>) -> Self {
        Self { id, driver, ctx }
    }

    /// Crawls until there is no more work, then releases the session
    ///
    /// Returns the number of pages this worker finished. A sink failure
    /// stops the whole crawl and is returned as the error.
    pub async fn run(mut self) -> Result<u64, HarvestError> {
        tracing::debug!("Worker {} started", self.id);
        let result = self.crawl_loop().await;

        if let Err(e) = self.driver.close().await {
            tracing::warn!("Worker {} failed to close its session: {}", self.id, e);
        }

        match &result {
            Ok(pages) => tracing::debug!("Worker {} finished after {} pages", self.id, pages),
            Err(e) => tracing::error!("Worker {} stopped: {}", self.id, e),
        }
        result
    }

    async fn crawl_loop(&mut self) -> Result<u64, HarvestError> {
        let ctx = self.ctx.clone();
        let mut pages = 0;

        while let Some(entry) = ctx.state.next().await {
            let url = entry.url;
            tracing::debug!("Worker {} processing {}", self.id, url);

            let outcome = self.process_page(&url).await;

            ctx.state.finish(&url);
            ctx.audit.record(url.as_str());
            let visited = ctx.stats.page_visited();
            if visited % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                    visited,
                    ctx.state.pending_len(),
                    ctx.stats.rate()
                );
            }

            match outcome {
                Ok(outcome) => tracing::debug!("{} -> {:?}", url, outcome),
                Err(e) => {
                    ctx.state.stop();
                    return Err(e);
                }
            }
            pages += 1;

            self.politeness_delay(&url).await;
        }

        Ok(pages)
    }

    /// Walks one URL through every stage
    pub async fn process_page(&mut self, url: &Url) -> Result<PageOutcome, HarvestError> {
        let ctx = self.ctx.clone();
        let mut stage = PageStage::Pending;

        if let Some(robots) = &ctx.robots {
            if !robots.is_allowed(url).await {
                tracing::info!("URL {} disallowed by robots.txt", url);
                stage.transition(PageStage::Done)?;
                ctx.stats.disallowed();
                return Ok(PageOutcome::Disallowed);
            }
        }

        let policy = ctx.settings.retry;
        let mut attempt = 0;
        let permit = loop {
            attempt += 1;
            stage = stage.transition(PageStage::Loading)?;
            let permit = self.admit().await?;

            match self.load(url).await {
                Ok(()) => break permit,
                Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                    drop(permit);
                    stage = stage.transition(PageStage::RetryPending)?;
                    ctx.stats.retry();

                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        "Timeout loading {} (attempt {}/{}): {}, retrying in {:?}",
                        url,
                        attempt,
                        policy.max_attempts,
                        e,
                        delay
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.state.cancel_token().cancelled() => {
                            tracing::info!("Stop requested, not retrying {}", url);
                            stage.transition(PageStage::Done)?;
                            ctx.stats.abandoned();
                            return Ok(PageOutcome::Abandoned);
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!("Giving up on {} after {} attempts: {}", url, attempt, e);
                    stage.transition(PageStage::Done)?;
                    ctx.stats.abandoned();
                    return Ok(PageOutcome::Abandoned);
                }
                Err(e) => {
                    tracing::error!("Error loading {}: {}", url, e);
                    stage
                        .transition(PageStage::Rejected)?
                        .transition(PageStage::Done)?;
                    ctx.stats.failed();
                    return Ok(PageOutcome::NavigationFailed);
                }
            }
        };

        stage = stage.transition(PageStage::Expanding)?;
        self.expand(url).await;

        stage = stage.transition(PageStage::Extracting)?;
        let extracted = self.extract(url).await;
        drop(permit);

        let (record, links) = match extracted {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::error!("Error extracting data from {}: {}", url, e);
                stage
                    .transition(PageStage::Rejected)?
                    .transition(PageStage::Done)?;
                ctx.stats.failed();
                return Ok(PageOutcome::ExtractionFailed);
            }
        };

        stage = stage.transition(PageStage::Admitted)?;
        match ctx.state.admit(&record) {
            Admission::Accepted => {
                let rows = {
                    let mut sink = ctx.sink.lock().unwrap_or_else(PoisonError::into_inner);
                    sink.write(&record)?
                };
                ctx.stats.record_stored();
                tracing::info!(
                    "Stored {} ({} code blocks, {} rows)",
                    url,
                    record.code_blocks.len(),
                    rows
                );

                stage = stage.transition(PageStage::LinkDiscovery)?;
                let enqueued = self.discover_links(url, &links);
                stage.transition(PageStage::Done)?;
                Ok(PageOutcome::Stored { links: enqueued })
            }
            Admission::Duplicate => {
                tracing::info!("Duplicate content found at {}", url);
                stage
                    .transition(PageStage::Rejected)?
                    .transition(PageStage::Done)?;
                ctx.stats.duplicate();
                Ok(PageOutcome::Duplicate)
            }
            Admission::Empty => {
                tracing::info!("Empty content detected at {}", url);
                stage
                    .transition(PageStage::Rejected)?
                    .transition(PageStage::Done)?;
                ctx.stats.empty_page();
                Ok(PageOutcome::Empty)
            }
        }
    }

    async fn admit(&mut self) -> Result<OwnedSemaphorePermit, HarvestError> {
        self.ctx
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| HarvestError::Worker("admission gate closed".to_string()))
    }

    /// Navigates, waits for readiness and runs the page hooks
    async fn load(&mut self, url: &Url) -> Result<(), crate::driver::DriverError> {
        let settings = &self.ctx.settings;
        self.driver
            .load(url.as_str(), settings.page_load_timeout)
            .await?;
        self.driver.wait_for_ready(settings.ready_timeout).await?;

        for hook in &self.ctx.hooks {
            match hook.run(self.driver.as_mut()).await {
                Ok(true) => {
                    tracing::info!("Hook {} acted on {}, letting the page settle", hook.name(), url);
                    tokio::time::sleep(settings.hook_settle).await;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Hook {} failed on {}: {}", hook.name(), url, e),
            }
        }

        Ok(())
    }

    /// Scrolls and clicks so lazily rendered content is in the DOM
    ///
    /// Every step is best effort; failures are logged and the next step runs.
    async fn expand(&mut self, url: &Url) {
        if !self.driver.is_interactive() {
            return;
        }
        let settings = &self.ctx.settings;

        match self
            .driver
            .scroll_to_bottom_until_stable(
                settings.scroll_max_iterations,
                settings.scroll_stability_wait,
            )
            .await
        {
            Ok(outcome) if !outcome.stable => tracing::debug!(
                "Page height of {} still changing after {} scrolls",
                url,
                outcome.scrolls
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!("Error scrolling {}: {}", url, e),
        }

        for (label, predicate) in [
            ("show more", ElementPredicate::show_more()),
            ("show code", ElementPredicate::code_toggle()),
        ] {
            match self
                .driver
                .click_all_matching(&predicate, settings.click_wait)
                .await
            {
                Ok(summary) if summary.matched > 0 => tracing::debug!(
                    "Clicked {}/{} {} elements on {}",
                    summary.clicked,
                    summary.matched,
                    label,
                    url
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!("Error clicking {} elements on {}: {}", label, url, e),
            }
        }
    }

    async fn extract(
        &mut self,
        url: &Url,
    ) -> Result<(ExtractionRecord, Vec<LinkCandidate>), HarvestError> {
        let dom = self.driver.current_dom_snapshot().await?;
        let record = self
            .ctx
            .extractor
            .extract(url.as_str(), &dom)
            .map_err(|source| HarvestError::Extraction {
                url: url.to_string(),
                source,
            })?;
        let links = self.driver.extract_links().await?;
        Ok((record, links))
    }

    /// Filters the page's links and enqueues the survivors
    fn discover_links(&self, url: &Url, links: &[LinkCandidate]) -> usize {
        let prefix = self.ctx.state.allowed_prefix();
        let enqueued = filter_links(links, url, &prefix)
            .into_iter()
            .filter(|link| self.ctx.state.enqueue(link.clone(), url))
            .count();

        self.ctx.stats.links_enqueued(enqueued as u64);
        tracing::debug!(
            "{} of {} links on {} entered the frontier",
            enqueued,
            links.len(),
            url
        );
        enqueued
    }

    /// Waits between pages, cut short by a stop request
    async fn politeness_delay(&mut self, url: &Url) {
        let mut delay = self.ctx.settings.download_delay;
        if let Some(robots) = &self.ctx.robots {
            if let Some(crawl_delay) = robots.crawl_delay(url).await {
                delay = delay.max(crawl_delay);
            }
        }
        if delay.is_zero() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.ctx.state.cancel_token().cancelled() => {}
        }
    }
}
