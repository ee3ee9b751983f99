//! Random rotation over proxy and user-agent pools

use rand::seq::SliceRandom;

/// A pool of strings picked uniformly at random
#[derive(Debug, Clone, Default)]
pub struct RotationPool {
    entries: Vec<String>,
}

impl RotationPool {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// Picks one entry, or None if the pool is empty
    pub fn choose(&self) -> Option<&str> {
        self.entries
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
