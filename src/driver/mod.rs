//! Page driver module
//!
//! This module contains everything that executes pages:
//! - `PageDriver`: the capability trait the crawl is written against
//! - `HttpPageDriver`: static fetches with reqwest + scraper
//! - `BrowserSession`: headless Chrome driven through chromiumoxide
//! - Rotation pools for user agents and proxies

mod browser;
mod http;
mod rotation;
mod traits;

pub use browser::{BrowserFactory, BrowserOptions, BrowserSession};
pub use http::{HttpDriverFactory, HttpPageDriver};
pub use rotation::RotationPool;
pub use traits::{
    ClickSummary, DriverError, DriverFactory, DriverResult, ElementHandle, ElementPredicate,
    LinkCandidate, PageDriver, PageHook, ScrollOutcome,
};

use crate::config::{DriverConfig, DriverKind};
use std::path::PathBuf;
use std::sync::Arc;

/// Builds the session factory selected by the `[driver]` section
pub fn build_factory(
    config: &DriverConfig,
    user_agents: Vec<String>,
    proxies: Vec<String>,
) -> Arc<dyn DriverFactory> {
    let user_agents = RotationPool::new(user_agents);

    match config.kind {
        DriverKind::Static => Arc::new(HttpDriverFactory::new(user_agents, proxies)),
        DriverKind::Browser => Arc::new(BrowserFactory::new(
            config.headless,
            config.chrome_executable.as_ref().map(PathBuf::from),
            user_agents,
            RotationPool::new(proxies),
        )),
    }
}
