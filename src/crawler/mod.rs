//! Crawler module: the crawl controller
//!
//! This module contains the core crawling logic, including:
//! - The frontier and content deduplication behind one shared `CrawlState`
//! - Workers that walk each URL through load, expansion and extraction
//! - Bounded retries for timed-out loads
//! - The resource governor and cooperative stop signals
//! - The orchestrator tying them together

mod coordinator;
mod dedup;
mod frontier;
mod governor;
mod retry;
mod state;
mod stats;
mod stop;
mod worker;

pub use coordinator::{CrawlComponents, Orchestrator};
pub use dedup::{Admission, ContentFingerprint, DedupStore};
pub use frontier::{Frontier, FrontierEntry};
pub use governor::{
    check_limits, Governor, GovernorAction, LimitCheck, ProcessSampler, ResourceSampler,
    ResourceSample,
};
pub use retry::RetryPolicy;
pub use state::CrawlState;
pub use stats::{CrawlSnapshot, CrawlStats};
pub use stop::{watch_ctrl_c, watch_stdin, StopSignal};
pub use worker::{PageOutcome, Worker, WorkerContext, WorkerSettings};
