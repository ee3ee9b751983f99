//! Configuration module for Code Harvest
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file, plus the line-oriented input files it points at (seeds, proxies,
//! user agents).
//!
//! # Example
//!
//! ```no_run
//! use code_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Workers: {}", config.crawler.concurrency);
//! ```

mod inputs;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DriverConfig, DriverKind, InputConfig, LimitPolicy, LimitsConfig,
    OutputConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use inputs::{
    load_proxies, load_seeds, load_user_agents, read_lines, DEFAULT_PROXIES, DEFAULT_USER_AGENTS,
};
