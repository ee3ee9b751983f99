//! Robots.txt handling module
//!
//! Optional politeness gate: when enabled, every URL is checked against its
//! host's robots.txt before it is loaded. Files are fetched once per origin
//! and cached for a day.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::RobotsRules;

use reqwest::{Client, StatusCode};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// Product token matched against robots.txt user-agent groups
pub const ROBOTS_AGENT: &str = "code-harvest";

/// Fetches, caches and applies robots.txt rules
pub struct RobotsGate {
    client: Client,
    cache: Mutex<RobotsCache>,
}

impl RobotsGate {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("code-harvest/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            cache: Mutex::new(RobotsCache::new()),
        })
    }

    /// Returns true if `url` may be crawled
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.rules_for(url)
            .await
            .is_allowed(url.as_str(), ROBOTS_AGENT)
    }

    /// Crawl-delay requested by the host of `url`, if any
    pub async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.rules_for(url).await.crawl_delay(ROBOTS_AGENT)
    }

    async fn rules_for(&self, url: &Url) -> RobotsRules {
        let origin = url.origin().ascii_serialization();

        let cached = self.lock_cache().get(&origin).cloned();
        if let Some(rules) = cached {
            return rules;
        }

        // Two workers may fetch the same file concurrently; the later insert wins
        let rules = self.fetch(&origin).await;
        self.lock_cache().insert(origin, rules.clone());
        rules
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, RobotsCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{}/robots.txt", origin);

        let response = match self.client.get(&robots_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Could not fetch {}: {}. Allowing all.", robots_url, e);
                return RobotsRules::allow_all();
            }
        };

        match response.status() {
            status if status.is_success() => match response.text().await {
                Ok(body) => {
                    tracing::debug!("Loaded {}", robots_url);
                    RobotsRules::from_content(&body)
                }
                Err(e) => {
                    tracing::warn!("Could not read {}: {}. Allowing all.", robots_url, e);
                    RobotsRules::allow_all()
                }
            },
            StatusCode::NOT_FOUND | StatusCode::GONE => RobotsRules::allow_all(),
            status => {
                tracing::warn!(
                    "{} answered HTTP {}. Allowing all.",
                    robots_url,
                    status.as_u16()
                );
                RobotsRules::allow_all()
            }
        }
    }
}
