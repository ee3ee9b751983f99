//! Storage traits and error types
//!
//! This module defines the `Sink` interface accepted records are written
//! through, and the storage error type.

use crate::extract::ExtractionRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for accepted extraction records
///
/// Writes are insert-only. A failing write is fatal for the crawl, so
/// implementations should not swallow errors.
pub trait Sink: Send {
    /// Persists one record, returning the number of rows written
    fn write(&mut self, record: &ExtractionRecord) -> StorageResult<usize>;

    /// Makes previous writes durable
    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
