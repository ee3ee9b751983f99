//! Extraction module
//!
//! Turns a DOM snapshot into an [`ExtractionRecord`]: page title, cleaned
//! body text and every code block with its detected language and tokens.
//! Extraction is synchronous and works on a serialized snapshot, so it never
//! touches the page driver.

mod html;
mod language;

pub use html::{clean_text, HtmlExtractor};
pub use language::{detect_language, tokenize, KNOWN_LANGUAGES, UNKNOWN_LANGUAGE};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while extracting a record
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("Document has no body")]
    MissingBody,
}

/// Coarse classification of where a page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Documentation,
    Blog,
    Book,
    Website,
}

impl SourceType {
    /// Classifies a page by substrings of its URL
    ///
    /// Rules are checked in order: `docs`/`documentation`, `blog`, `book`,
    /// otherwise `website`.
    pub fn from_url(url: &str) -> Self {
        if url.contains("docs") || url.contains("documentation") {
            Self::Documentation
        } else if url.contains("blog") {
            Self::Blog
        } else if url.contains("book") {
            Self::Book
        } else {
            Self::Website
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documentation => "documentation",
            Self::Blog => "blog",
            Self::Book => "book",
            Self::Website => "website",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One code sample found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub code: String,
    pub language: String,
    pub tokens: Vec<String>,
}

impl CodeBlock {
    /// Builds a block, detecting its language and tokenizing it
    pub fn analyze(code: impl Into<String>, class_hint: Option<&str>) -> Self {
        let code = code.into();
        let language = detect_language(&code, class_hint);
        let tokens = tokenize(&code);
        Self {
            code,
            language,
            tokens,
        }
    }
}

/// Everything extracted from one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub code_blocks: Vec<CodeBlock>,
    pub source_type: SourceType,
}

impl ExtractionRecord {
    /// True when the page carried neither text nor code
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.code_blocks.is_empty()
    }
}

/// Produces a record from a DOM snapshot
pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str, dom: &str) -> Result<ExtractionRecord, ExtractError>;
}
