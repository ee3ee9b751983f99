//! Content deduplication
//!
//! The single admission gate between extraction and the sink. Pages are
//! fingerprinted over their cleaned text plus all code; the first page with
//! a given fingerprint is accepted and every later one is a duplicate.

use crate::extract::ExtractionRecord;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// 128-bit content fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint([u8; 16]);

impl ContentFingerprint {
    /// Fingerprints `content` followed by every code block, in order
    pub fn of(record: &ExtractionRecord) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(record.content.as_bytes());
        for block in &record.code_blocks {
            hasher.update(block.code.as_bytes());
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Result of passing a record through the admission gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First time this content was seen; persist it
    Accepted,

    /// No text and no code
    Empty,

    /// Same fingerprint as an earlier page
    Duplicate,
}

/// Set of fingerprints seen this run
#[derive(Debug, Default)]
pub struct DedupStore {
    fingerprints: HashSet<ContentFingerprint>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a record, remembering its fingerprint if accepted
    pub fn admit(&mut self, record: &ExtractionRecord) -> Admission {
        if record.is_empty() {
            return Admission::Empty;
        }

        if self.fingerprints.insert(ContentFingerprint::of(record)) {
            Admission::Accepted
        } else {
            Admission::Duplicate
        }
    }

    /// Checks and inserts in one step; true for duplicates
    ///
    /// Empty records are not fingerprinted and report false; use
    /// [`DedupStore::admit`] to tell them apart.
    pub fn is_duplicate_content(&mut self, record: &ExtractionRecord) -> bool {
        self.admit(record) == Admission::Duplicate
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CodeBlock, SourceType};

    fn record(url: &str, content: &str, code: &[&str]) -> ExtractionRecord {
        ExtractionRecord {
            url: url.to_string(),
            title: String::new(),
            content: content.to_string(),
            code_blocks: code.iter().map(|c| CodeBlock::analyze(*c, None)).collect(),
            source_type: SourceType::Website,
        }
    }

    #[test]
    fn test_identical_content_is_duplicate() {
        let mut store = DedupStore::new();
        let a = record("https://docs.example.com/a", "same text", &[]);
        let b = record("https://docs.example.com/b", "same text", &[]);

        assert_eq!(store.admit(&a), Admission::Accepted);
        assert_eq!(store.admit(&b), Admission::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_code_changes_fingerprint() {
        let mut store = DedupStore::new();
        let a = record("https://docs.example.com/a", "text", &["fn a() {}"]);
        let b = record("https://docs.example.com/b", "text", &["fn b() {}"]);

        assert!(!store.is_duplicate_content(&a));
        assert!(!store.is_duplicate_content(&b));
        assert!(store.is_duplicate_content(&a));
    }

    #[test]
    fn test_url_and_title_do_not_matter() {
        let mut a = record("https://docs.example.com/a", "text", &[]);
        a.title = "A".to_string();
        let b = record("https://blog.example.com/b", "text", &[]);
        assert_eq!(ContentFingerprint::of(&a), ContentFingerprint::of(&b));
    }

    #[test]
    fn test_empty_record_rejected() {
        let mut store = DedupStore::new();
        let empty = record("https://docs.example.com/a", "", &[]);

        assert_eq!(store.admit(&empty), Admission::Empty);
        assert_eq!(store.admit(&empty), Admission::Empty);
        assert!(store.is_empty());
    }

    #[test]
    fn test_fingerprint_is_128_bits_hex() {
        let fp = ContentFingerprint::of(&record("https://a.example.com/", "x", &[]));
        assert_eq!(fp.to_hex().len(), 32);
        assert_eq!(fp.to_string(), fp.to_hex());
    }
}
