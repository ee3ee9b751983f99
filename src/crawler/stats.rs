//! Live run counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters updated by workers as pages finish
#[derive(Debug)]
pub struct CrawlStats {
    started: Instant,
    pages_visited: AtomicU64,
    records_stored: AtomicU64,
    duplicates: AtomicU64,
    empty_pages: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    disallowed: AtomicU64,
    retries: AtomicU64,
    links_enqueued: AtomicU64,
    limit_warnings: AtomicU64,
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlSnapshot {
    pub pages_visited: u64,
    pub records_stored: u64,
    pub duplicates: u64,
    pub empty_pages: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub disallowed: u64,
    pub retries: u64,
    pub links_enqueued: u64,
    pub limit_warnings: u64,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            pages_visited: AtomicU64::new(0),
            records_stored: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            empty_pages: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            disallowed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            links_enqueued: AtomicU64::new(0),
            limit_warnings: AtomicU64::new(0),
        }
    }

    /// Counts a finished page and returns the new total
    pub fn page_visited(&self) -> u64 {
        self.pages_visited.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_stored(&self) {
        self.records_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn empty_page(&self) {
        self.empty_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn disallowed(&self) {
        self.disallowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn links_enqueued(&self, count: u64) {
        self.links_enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn limit_warnings(&self, count: u64) {
        self.limit_warnings.fetch_add(count, Ordering::Relaxed);
    }

    /// Pages finished per second since the run started
    pub fn rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.pages_visited.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> CrawlSnapshot {
        CrawlSnapshot {
            pages_visited: self.pages_visited.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            empty_pages: self.empty_pages.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            disallowed: self.disallowed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            links_enqueued: self.links_enqueued.load(Ordering::Relaxed),
            limit_warnings: self.limit_warnings.load(Ordering::Relaxed),
        }
    }
}
