//! Crawl frontier
//!
//! Holds URLs waiting to be crawled. Every URL is admitted at most once per
//! run: once seeded, enqueued or visited it is never queued again.

use crate::url::is_within_prefix;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting for a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized absolute URL
    pub url: Url,

    /// Page the URL was found on; None for seeds
    pub discovered_from: Option<Url>,
}

/// FIFO queue of pending URLs plus the sets that keep admission exactly-once
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,

    /// Every URL ever admitted (pending, in progress or visited)
    seen: HashSet<String>,

    visited: HashSet<String>,

    allowed_prefix: String,
}

impl Frontier {
    pub fn new(allowed_prefix: impl Into<String>) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            visited: HashSet::new(),
            allowed_prefix: allowed_prefix.into(),
        }
    }

    pub fn allowed_prefix(&self) -> &str {
        &self.allowed_prefix
    }

    /// Admits a seed URL; only the duplicate check applies
    pub fn seed(&mut self, url: Url) -> bool {
        self.admit(FrontierEntry {
            url,
            discovered_from: None,
        })
    }

    /// Admits a discovered URL
    ///
    /// Returns false (and changes nothing) if the URL is outside the allowed
    /// prefix or was already pending or visited.
    pub fn enqueue(&mut self, url: Url, origin: &Url) -> bool {
        if !is_within_prefix(&url, &self.allowed_prefix) {
            return false;
        }

        self.admit(FrontierEntry {
            url,
            discovered_from: Some(origin.clone()),
        })
    }

    fn admit(&mut self, entry: FrontierEntry) -> bool {
        if !self.seen.insert(entry.url.as_str().to_string()) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Records that a dequeued URL is finished
    ///
    /// Returns false if it was already marked.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn frontier() -> Frontier {
        Frontier::new("https://docs.example.com/")
    }

    #[test]
    fn test_double_enqueue_yields_one_entry() {
        let mut frontier = frontier();
        let origin = url("https://docs.example.com/a");

        assert!(frontier.enqueue(url("https://docs.example.com/b"), &origin));
        assert!(!frontier.enqueue(url("https://docs.example.com/b"), &origin));
        assert_eq!(frontier.pending_len(), 1);
    }

    #[test]
    fn test_visited_url_not_requeued() {
        let mut frontier = frontier();
        let origin = url("https://docs.example.com/a");
        frontier.seed(origin.clone());

        let entry = frontier.dequeue().unwrap();
        assert!(frontier.mark_visited(&entry.url));

        assert!(!frontier.enqueue(origin.clone(), &origin));
        assert!(frontier.is_empty());
        assert!(frontier.is_visited("https://docs.example.com/a"));
    }

    #[test]
    fn test_in_progress_url_not_requeued() {
        let mut frontier = frontier();
        let a = url("https://docs.example.com/a");
        frontier.seed(a.clone());
        frontier.dequeue().unwrap();

        // Dequeued but not yet visited
        assert!(!frontier.enqueue(a.clone(), &a));
    }

    #[test]
    fn test_enqueue_applies_prefix() {
        let mut frontier = frontier();
        let origin = url("https://docs.example.com/a");
        assert!(!frontier.enqueue(url("https://other.com/c"), &origin));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_seed_skips_prefix() {
        let mut frontier = frontier();
        assert!(frontier.seed(url("https://other.com/start")));
        assert!(!frontier.seed(url("https://other.com/start")));
        assert_eq!(frontier.pending_len(), 1);
    }

    #[test]
    fn test_fifo_order_and_origin() {
        let mut frontier = frontier();
        let a = url("https://docs.example.com/a");
        frontier.seed(a.clone());
        frontier.enqueue(url("https://docs.example.com/b"), &a);

        let first = frontier.dequeue().unwrap();
        assert_eq!(first.url, a);
        assert!(first.discovered_from.is_none());

        let second = frontier.dequeue().unwrap();
        assert_eq!(second.discovered_from, Some(a));
        assert!(frontier.dequeue().is_none());
    }
}
