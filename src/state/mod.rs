//! State module for tracking per-URL progress
//!
//! - `PageStage`: where a URL is in the worker pipeline, with checked transitions

mod page_stage;

pub use page_stage::PageStage;
