//! Append-only audit log of visited URLs
//!
//! Separate from the operational log: one `"<timestamp> - <url>"` line per
//! URL, written as soon as the URL is marked visited.

use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Writer for the visited-URL audit file
#[derive(Debug)]
pub struct VisitedLog {
    file: Option<Mutex<File>>,
}

impl VisitedLog {
    /// Opens (or creates) the audit file for appending
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// An audit log that discards everything
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Records that `url` was visited
    ///
    /// Write failures are logged and otherwise ignored; losing an audit line
    /// must not stop the crawl.
    pub fn record(&self, url: &str) {
        let Some(file) = &self.file else {
            return;
        };

        let line = format_line(&Utc::now().to_rfc3339(), url);
        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            tracing::warn!("Failed to write visited log entry for {}: {}", url, e);
        }
    }
}

fn format_line(timestamp: &str, url: &str) -> String {
    format!("{} - {}\n", timestamp, url)
}
