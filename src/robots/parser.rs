//! Robots.txt rules
//!
//! Allow/disallow matching is delegated to the robotstxt crate; only the
//! `Crawl-delay` directive, which that crate does not expose, is read here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// The rules of one host's robots.txt
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt body; empty means everything is allowed
    content: String,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules that allow everything (missing or unreadable robots.txt)
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks a full URL against the rules for `agent`
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// Crawl-delay for `agent`, preferring its own group over `*`
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let agent = agent.to_ascii_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                // A user-agent line after rules starts a new group
                if in_rules {
                    group.clear();
                    in_rules = false;
                }
                group.push(value.to_ascii_lowercase());
                continue;
            }

            in_rules = true;
            if key != "crawl-delay" {
                continue;
            }

            let Some(delay) = value
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite() && *d >= 0.0)
            else {
                continue;
            };

            for member in &group {
                if member == "*" {
                    wildcard = wildcard.or(Some(delay));
                } else if agent.contains(member.as_str()) {
                    specific = specific.or(Some(delay));
                }
            }
        }

        specific.or(wildcard).map(Duration::from_secs_f64)
    }
}
