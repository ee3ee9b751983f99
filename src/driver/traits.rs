//! Page driver traits and error types
//!
//! `PageDriver` is the capability boundary between the crawl algorithm and
//! whatever executes pages. Implementations only provide the primitive
//! operations; scroll stabilization and bulk clicking are built on top of
//! them here so their termination rules hold for every backend.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a page
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Page not ready after {timeout_ms}ms")]
    ReadinessTimeout { timeout_ms: u64 },

    #[error("Element interaction failed: {0}")]
    ElementInteraction(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DriverError {
    /// Returns true for failures worth another load attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NavigationTimeout { .. } | Self::ReadinessTimeout { .. }
        )
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// A link as found in the DOM, before any filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Raw href attribute (may be relative)
    pub href: String,

    /// Class names on the anchor element
    pub css_classes: Vec<String>,
}

impl LinkCandidate {
    /// Builds a candidate from an href and a raw `class` attribute value
    pub fn new(href: impl Into<String>, class_attr: &str) -> Self {
        Self {
            href: href.into(),
            css_classes: class_attr.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Opaque reference to an element inside the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// Matches elements by tag name and visible text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPredicate {
    /// Tag name, lowercase (e.g. "button")
    pub tag: String,

    /// The element matches if its text contains any of these
    pub text_contains: Vec<String>,
}

impl ElementPredicate {
    pub fn new(tag: &str, text_contains: &[&str]) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            text_contains: text_contains.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// "Show more" style pagination buttons
    pub fn show_more() -> Self {
        Self::new("button", &["Show more"])
    }

    /// Buttons that reveal hidden code samples
    pub fn code_toggle() -> Self {
        Self::new("button", &["Code", "Show Code", "View Code"])
    }

    /// Evaluates the predicate against an element's tag and text
    pub fn matches(&self, tag: &str, text: &str) -> bool {
        tag.eq_ignore_ascii_case(&self.tag)
            && self.text_contains.iter().any(|needle| text.contains(needle.as_str()))
    }

    /// Renders the predicate as an XPath union expression
    pub fn to_xpath(&self) -> String {
        self.text_contains
            .iter()
            .map(|needle| {
                format!(
                    "//{}[contains(text(), {})]",
                    self.tag,
                    xpath_literal(needle)
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Quotes a string for use inside an XPath expression
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// What happened during scroll stabilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOutcome {
    /// Number of scroll actions performed
    pub scrolls: u32,

    /// Number of height measurements taken (initial one included)
    pub measurements: u32,

    /// True if two consecutive measurements were equal
    pub stable: bool,
}

/// What happened during a bulk click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickSummary {
    /// Elements that matched the predicate
    pub matched: usize,

    /// Clicks that succeeded
    pub clicked: usize,

    /// Clicks that failed and were skipped
    pub failed: usize,
}

/// A browser-automation session (or something standing in for one)
///
/// A session is used by one worker at a time; implementations do not need
/// interior synchronization.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigates to `url`, failing with `NavigationTimeout` after `timeout`
    async fn load(&mut self, url: &str, timeout: Duration) -> DriverResult<()>;

    /// Waits until the document body is present
    async fn wait_for_ready(&mut self, timeout: Duration) -> DriverResult<()>;

    /// Current scrollable height of the document
    async fn page_height(&mut self) -> DriverResult<u64>;

    /// Scrolls to the bottom of the document once
    async fn scroll_to_bottom(&mut self) -> DriverResult<()>;

    /// Finds every element matching the predicate
    async fn find_matching(
        &mut self,
        predicate: &ElementPredicate,
    ) -> DriverResult<Vec<ElementHandle>>;

    /// Clicks one element
    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Serialized DOM of the current page
    async fn current_dom_snapshot(&mut self) -> DriverResult<String>;

    /// All anchors on the current page
    async fn extract_links(&mut self) -> DriverResult<Vec<LinkCandidate>>;

    /// Releases the session
    async fn close(&mut self) -> DriverResult<()>;

    /// False for drivers serving static markup, where scrolling and
    /// clicking cannot reveal anything new
    fn is_interactive(&self) -> bool {
        true
    }

    /// Scrolls until the page height stops changing
    ///
    /// Measures the height, then repeatedly scrolls, waits `stability_wait`
    /// and measures again. Returns when two consecutive measurements are
    /// equal or after `max_iterations` scrolls, whichever comes first, so a
    /// page that keeps growing (ad injection, endless feeds) cannot hold the
    /// worker forever. A page that stabilizes after k scrolls is measured
    /// exactly k + 1 times.
    async fn scroll_to_bottom_until_stable(
        &mut self,
        max_iterations: u32,
        stability_wait: Duration,
    ) -> DriverResult<ScrollOutcome> {
        let mut last_height = self.page_height().await?;
        let mut outcome = ScrollOutcome {
            scrolls: 0,
            measurements: 1,
            stable: false,
        };

        while outcome.scrolls < max_iterations {
            self.scroll_to_bottom().await?;
            outcome.scrolls += 1;

            if !stability_wait.is_zero() {
                tokio::time::sleep(stability_wait).await;
            }

            let height = self.page_height().await?;
            outcome.measurements += 1;

            if height == last_height {
                outcome.stable = true;
                break;
            }
            last_height = height;
        }

        Ok(outcome)
    }

    /// Clicks every element matching `predicate`
    ///
    /// A failed click is logged and counted; the remaining elements are
    /// still clicked.
    async fn click_all_matching(
        &mut self,
        predicate: &ElementPredicate,
        per_click_wait: Duration,
    ) -> DriverResult<ClickSummary> {
        let elements = self.find_matching(predicate).await?;
        let mut summary = ClickSummary {
            matched: elements.len(),
            ..ClickSummary::default()
        };

        for element in &elements {
            match self.click(element).await {
                Ok(()) => {
                    summary.clicked += 1;
                    if !per_click_wait.is_zero() {
                        tokio::time::sleep(per_click_wait).await;
                    }
                }
                Err(DriverError::ElementInteraction(message)) => {
                    tracing::warn!("Element click intercepted: {}", message);
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Error clicking element: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Creates page driver sessions, one per worker
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Opens a new session; failure here is fatal for the crawl
    async fn create(&self) -> DriverResult<Box<dyn PageDriver>>;
}

/// Login / CAPTCHA style interception run right after a page loads
#[async_trait]
pub trait PageHook: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Inspects (and possibly acts on) the loaded page
    ///
    /// Returns true if the hook acted and the page needs time to settle.
    async fn run(&self, driver: &mut dyn PageDriver) -> DriverResult<bool>;
}
