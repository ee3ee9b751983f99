//! Output module for crawl reporting
//!
//! This module handles:
//! - The append-only visited-URL audit log
//! - Database statistics for `--stats`
//! - The end-of-run summary

mod audit;
pub mod stats;

pub use audit::VisitedLog;
pub use stats::{load_statistics, print_run_summary, print_statistics, DatabaseStatistics};
