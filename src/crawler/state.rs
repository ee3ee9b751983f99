//! Shared crawl state
//!
//! One `CrawlState` per run, shared by the orchestrator and every worker.
//! Frontier, visited set and fingerprints sit behind a single mutex so URL
//! admission and content admission are each exactly-once.

use crate::crawler::dedup::{Admission, DedupStore};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::extract::ExtractionRecord;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

struct Inner {
    frontier: Frontier,
    dedup: DedupStore,

    /// Entries handed to workers and not yet finished
    in_flight: usize,
}

/// Frontier, visited set, fingerprints and the stop flag of one run
pub struct CrawlState {
    inner: Mutex<Inner>,
    work_changed: Notify,
    cancel: CancellationToken,
}

impl CrawlState {
    pub fn new(allowed_prefix: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frontier: Frontier::new(allowed_prefix),
                dedup: DedupStore::new(),
                in_flight: 0,
            }),
            work_changed: Notify::new(),
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a seed URL (no prefix filter)
    pub fn seed(&self, url: Url) -> bool {
        let added = self.lock().frontier.seed(url);
        if added {
            self.work_changed.notify_waiters();
        }
        added
    }

    /// Admits a discovered URL under the allowed prefix
    pub fn enqueue(&self, url: Url, origin: &Url) -> bool {
        let added = self.lock().frontier.enqueue(url, origin);
        if added {
            self.work_changed.notify_waiters();
        }
        added
    }

    /// Passes a record through the deduplication gate
    pub fn admit(&self, record: &ExtractionRecord) -> Admission {
        self.lock().dedup.admit(record)
    }

    /// Waits for the next URL to crawl
    ///
    /// Returns None once a stop was requested, or once the frontier is empty
    /// with nothing in flight (no worker can add more links).
    pub async fn next(&self) -> Option<FrontierEntry> {
        loop {
            // Registered before the check so a wakeup in between is not lost
            let changed = self.work_changed.notified();

            {
                let mut inner = self.lock();
                if self.cancel.is_cancelled() {
                    return None;
                }
                if let Some(entry) = inner.frontier.dequeue() {
                    inner.in_flight += 1;
                    return Some(entry);
                }
                if inner.in_flight == 0 {
                    drop(inner);
                    self.work_changed.notify_waiters();
                    return None;
                }
            }

            tokio::select! {
                _ = changed => {}
                _ = self.cancel.cancelled() => return None,
            }
        }
    }

    /// Marks a dequeued URL visited and releases its in-flight slot
    pub fn finish(&self, url: &Url) {
        {
            let mut inner = self.lock();
            inner.frontier.mark_visited(url);
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.work_changed.notify_waiters();
    }

    /// Requests a cooperative stop
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn allowed_prefix(&self) -> String {
        self.lock().frontier.allowed_prefix().to_string()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().frontier.is_visited(url)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().frontier.pending_len()
    }

    pub fn visited_len(&self) -> usize {
        self.lock().frontier.visited_len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }
}
