//! Integration tests for the crawler
//!
//! Most tests drive the orchestrator against a scripted in-memory site so
//! retries, deduplication and stopping can be checked without a browser.
//! The last ones use wiremock to run the static driver and SQLite sink
//! end-to-end.

use async_trait::async_trait;
use code_harvest::config::{parse_config, Config, LimitPolicy};
use code_harvest::crawler::{CrawlComponents, Orchestrator, ResourceSampler, ResourceSample};
use code_harvest::driver::{
    build_factory, DriverError, DriverFactory, DriverResult, ElementHandle, ElementPredicate,
    LinkCandidate, PageDriver,
};
use code_harvest::extract::{ExtractionRecord, HtmlExtractor};
use code_harvest::output::VisitedLog;
use code_harvest::robots::RobotsGate;
use code_harvest::storage::{
    RunStatus, SharedSink, Sink, SqliteStorage, StorageError, StorageResult,
};
use code_harvest::HarvestError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Scripted site =====

struct Page {
    html: String,
    links: Vec<LinkCandidate>,
    /// Number of initial loads that time out
    timeouts: u32,
}

#[derive(Default)]
struct Site {
    pages: HashMap<String, Page>,
    loads: Mutex<HashMap<String, u32>>,
    closed: AtomicUsize,
    /// How long a successful load takes
    load_delay: Duration,
    /// Pages between a successful load and link extraction, and the peak
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl Site {
    fn page(mut self, url: &str, text: &str, links: &[(&str, &str)]) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                html: format!("<html><head><title>{0}</title></head><body><p>{0}</p></body></html>", text),
                links: links
                    .iter()
                    .map(|(href, class)| LinkCandidate::new(*href, class))
                    .collect(),
                timeouts: 0,
            },
        );
        self
    }

    fn timing_out(mut self, url: &str, timeouts: u32) -> Self {
        if let Some(page) = self.pages.get_mut(url) {
            page.timeouts = timeouts;
        }
        self
    }

    fn slow(mut self, load_delay: Duration) -> Self {
        self.load_delay = load_delay;
        self
    }

    fn loads(&self, url: &str) -> u32 {
        self.loads.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

struct ScriptedDriver {
    site: Arc<Site>,
    current: Option<String>,
}

impl ScriptedDriver {
    fn page(&self) -> DriverResult<&Page> {
        self.current
            .as_ref()
            .and_then(|url| self.site.pages.get(url))
            .ok_or_else(|| DriverError::Session("no page loaded".to_string()))
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn load(&mut self, url: &str, timeout: Duration) -> DriverResult<()> {
        self.current = None;
        let attempt = {
            let mut loads = self.site.loads.lock().unwrap();
            let count = loads.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let page = self.site.pages.get(url).ok_or_else(|| DriverError::Navigation {
            url: url.to_string(),
            message: "HTTP 404".to_string(),
        })?;
        if attempt <= page.timeouts {
            return Err(DriverError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        let active = self.site.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.site.peak_active.fetch_max(active, Ordering::SeqCst);
        if !self.site.load_delay.is_zero() {
            tokio::time::sleep(self.site.load_delay).await;
        }

        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_ready(&mut self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn page_height(&mut self) -> DriverResult<u64> {
        Ok(1000)
    }

    async fn scroll_to_bottom(&mut self) -> DriverResult<()> {
        Ok(())
    }

    async fn find_matching(&mut self, _p: &ElementPredicate) -> DriverResult<Vec<ElementHandle>> {
        Ok(Vec::new())
    }

    async fn click(&mut self, _element: &ElementHandle) -> DriverResult<()> {
        Ok(())
    }

    async fn current_dom_snapshot(&mut self) -> DriverResult<String> {
        Ok(self.page()?.html.clone())
    }

    async fn extract_links(&mut self) -> DriverResult<Vec<LinkCandidate>> {
        let links = self.page()?.links.clone();
        self.site.active.fetch_sub(1, Ordering::SeqCst);
        Ok(links)
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.site.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedFactory {
    site: Arc<Site>,
    /// Sessions that open successfully before `create` starts failing
    max_sessions: Option<usize>,
    created: AtomicUsize,
}

impl ScriptedFactory {
    fn new(site: Arc<Site>) -> Self {
        Self {
            site,
            max_sessions: None,
            created: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DriverFactory for ScriptedFactory {
    async fn create(&self) -> DriverResult<Box<dyn PageDriver>> {
        let created = self.created.fetch_add(1, Ordering::SeqCst);
        if self.max_sessions.is_some_and(|max| created >= max) {
            return Err(DriverError::Session("browser failed to start".to_string()));
        }
        Ok(Box::new(ScriptedDriver {
            site: self.site.clone(),
            current: None,
        }))
    }
}

// ===== Sinks and samplers =====

#[derive(Default)]
struct RecordingSink {
    records: Vec<ExtractionRecord>,
    fail: bool,
}

impl Sink for RecordingSink {
    fn write(&mut self, record: &ExtractionRecord) -> StorageResult<usize> {
        if self.fail {
            return Err(StorageError::Serialization("disk full".to_string()));
        }
        self.records.push(record.clone());
        Ok(1)
    }
}

struct FixedSampler {
    memory_mb: f64,
}

impl ResourceSampler for FixedSampler {
    fn sample(&mut self) -> ResourceSample {
        ResourceSample::new(self.memory_mb, 0.0)
    }
}

// ===== Helpers =====

fn test_config() -> Config {
    let mut config = parse_config(
        r#"
[input]
seeds-path = "seeds.txt"

[output]
database-path = "harvest.db"
"#,
    )
    .unwrap();

    config.crawler.concurrency = 2;
    config.crawler.download_delay_ms = 0;
    config.crawler.retry_backoff_ms = 0;
    config.crawler.scroll_stability_wait_ms = 0;
    config.crawler.click_wait_ms = 0;
    config.crawler.hook_settle_ms = 0;
    config.crawler.tick_interval_ms = 10;
    config.crawler.page_load_timeout_ms = 1_000;
    config.crawler.ready_timeout_ms = 1_000;
    config.limits.memory_limit_mb = 1_000_000.0;
    config.limits.cpu_limit_percent = 1_000_000.0;
    config.limits.on_exceeded = LimitPolicy::Warn;
    config
}

fn components(
    drivers: Arc<dyn DriverFactory>,
    sink: SharedSink,
    audit: VisitedLog,
    memory_mb: f64,
) -> CrawlComponents {
    CrawlComponents {
        drivers,
        extractor: Arc::new(HtmlExtractor::new()),
        sink,
        audit: Arc::new(audit),
        sampler: Box::new(FixedSampler { memory_mb }),
        hooks: Vec::new(),
        robots: None,
    }
}

fn seeds(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|url| url.to_string()).collect()
}

/// URLs recorded in a visited log, in order
fn visited_urls(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter_map(|line| line.split(" - ").nth(1))
        .map(str::to_string)
        .collect()
}

// ===== Scenarios =====

#[tokio::test]
async fn test_links_followed_only_under_prefix() {
    let site = Arc::new(
        Site::default()
            .page(
                "https://docs.example.com/a",
                "Page A intro",
                &[("/b", ""), ("https://other.com/c", "")],
            )
            .page("https://docs.example.com/b", "Page B details", &[])
            .page("https://other.com/c", "Other site", &[]),
    );
    let dir = TempDir::new().unwrap();
    let visited_path = dir.path().join("visited.log");
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::open(&visited_path).unwrap(),
            10.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert_eq!(snapshot.records_stored, 2);
    assert_eq!(snapshot.pages_visited, 2);
    assert_eq!(sink.lock().unwrap().records.len(), 2);
    assert_eq!(site.loads("https://other.com/c"), 0);

    let mut visited = visited_urls(&visited_path);
    visited.sort();
    assert_eq!(
        visited,
        vec!["https://docs.example.com/a", "https://docs.example.com/b"]
    );

    // Every session was released
    assert_eq!(site.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_identical_pages_written_once() {
    let site = Arc::new(
        Site::default()
            .page("https://docs.example.com/a", "Same words", &[])
            .page("https://docs.example.com/b", "Same words", &[]),
    );
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&[
            "https://docs.example.com/a",
            "https://docs.example.com/b",
        ]))
        .await
        .unwrap();

    assert_eq!(sink.lock().unwrap().records.len(), 1);
    assert_eq!(snapshot.duplicates, 1);
    assert_eq!(snapshot.pages_visited, 2);
}

#[tokio::test]
async fn test_duplicate_seed_crawled_once() {
    let site = Arc::new(Site::default().page("https://docs.example.com/a", "Only page", &[("/a", "")]));
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&[
            "https://docs.example.com/a",
            "https://docs.example.com/a#intro",
        ]))
        .await
        .unwrap();

    assert_eq!(site.loads("https://docs.example.com/a"), 1);
    assert_eq!(snapshot.pages_visited, 1);
}

#[tokio::test]
async fn test_timeouts_retried_then_abandoned() {
    let site = Arc::new(
        Site::default()
            .page("https://docs.example.com/a", "Slow page", &[])
            .timing_out("https://docs.example.com/a", 10),
    );
    let dir = TempDir::new().unwrap();
    let visited_path = dir.path().join("visited.log");
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::open(&visited_path).unwrap(),
            10.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert_eq!(site.loads("https://docs.example.com/a"), 3);
    assert_eq!(snapshot.retries, 2);
    assert_eq!(snapshot.abandoned, 1);
    assert!(sink.lock().unwrap().records.is_empty());
    assert_eq!(visited_urls(&visited_path), vec!["https://docs.example.com/a"]);
}

#[tokio::test]
async fn test_transient_timeout_recovers() {
    let site = Arc::new(
        Site::default()
            .page("https://docs.example.com/a", "Flaky page", &[])
            .timing_out("https://docs.example.com/a", 1),
    );
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert_eq!(site.loads("https://docs.example.com/a"), 2);
    assert_eq!(snapshot.records_stored, 1);
}

#[tokio::test]
async fn test_sidebar_links_not_followed() {
    let site = Arc::new(
        Site::default()
            .page(
                "https://docs.example.com/a",
                "Guide start",
                &[("/nav", "menu sidebar-item"), ("/next", "pagination")],
            )
            .page("https://docs.example.com/nav", "Navigation", &[])
            .page("https://docs.example.com/next", "Next chapter", &[]),
    );
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert_eq!(site.loads("https://docs.example.com/nav"), 0);
    assert_eq!(site.loads("https://docs.example.com/next"), 1);
}

#[tokio::test]
async fn test_navigation_error_contained() {
    let site = Arc::new(Site::default().page(
        "https://docs.example.com/a",
        "Has a dead link",
        &[("/missing", "")],
    ));
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert_eq!(site.loads("https://docs.example.com/missing"), 1);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.pages_visited, 2);
}

// ===== Stopping =====

#[tokio::test]
async fn test_cancelled_before_start_visits_nothing() {
    let site = Arc::new(Site::default().page("https://docs.example.com/a", "Never seen", &[]));
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    orchestrator.cancel_token().cancel();
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert_eq!(snapshot.pages_visited, 0);
    assert_eq!(site.loads("https://docs.example.com/a"), 0);
    assert_eq!(site.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stop_file_interrupts_politeness_delay() {
    let site = Arc::new(
        Site::default()
            .page("https://docs.example.com/a", "First", &[])
            .page("https://docs.example.com/b", "Second", &[])
            .page("https://docs.example.com/c", "Third", &[]),
    );
    let dir = TempDir::new().unwrap();
    let stop_file = dir.path().join("STOP");
    std::fs::write(&stop_file, "").unwrap();

    let mut config = test_config();
    config.crawler.concurrency = 1;
    config.crawler.download_delay_ms = 30_000;
    config.input.stop_file = Some(stop_file.to_string_lossy().into_owned());

    let sink = Arc::new(Mutex::new(RecordingSink::default()));
    let orchestrator = Orchestrator::new(
        &config,
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );

    let started = Instant::now();
    let snapshot = orchestrator
        .run(&seeds(&[
            "https://docs.example.com/a",
            "https://docs.example.com/b",
            "https://docs.example.com/c",
        ]))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(snapshot.pages_visited <= 1);
}

// ===== Resource limits =====

#[tokio::test]
async fn test_memory_over_limit_warns_without_exit() {
    let site = Arc::new(
        Site::default()
            .page("https://docs.example.com/a", "Alpha", &[("/b", "")])
            .page("https://docs.example.com/b", "Beta", &[]),
    );
    let mut config = test_config();
    config.crawler.concurrency = 1;
    config.crawler.download_delay_ms = 50;
    config.limits.memory_limit_mb = 100.0;

    let sink = Arc::new(Mutex::new(RecordingSink::default()));
    let orchestrator = Orchestrator::new(
        &config,
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            500.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert!(snapshot.limit_warnings >= 1);
    assert_eq!(snapshot.records_stored, 2);
}

#[tokio::test]
async fn test_stop_policy_ends_crawl_early() {
    let mut site = Site::default();
    let links: Vec<(String, String)> = (0..20).map(|i| (format!("/p{}", i), String::new())).collect();
    let link_refs: Vec<(&str, &str)> = links.iter().map(|(h, c)| (h.as_str(), c.as_str())).collect();
    site = site.page("https://docs.example.com/", "Index", &link_refs);
    for i in 0..20 {
        site = site.page(&format!("https://docs.example.com/p{}", i), &format!("Page {}", i), &[]);
    }
    let site = Arc::new(site);

    let mut config = test_config();
    config.crawler.concurrency = 1;
    config.crawler.download_delay_ms = 50;
    config.limits.memory_limit_mb = 100.0;
    config.limits.on_exceeded = LimitPolicy::Stop;

    let sink = Arc::new(Mutex::new(RecordingSink::default()));
    let orchestrator = Orchestrator::new(
        &config,
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            500.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/"]))
        .await
        .unwrap();

    assert!(snapshot.pages_visited < 21);
}

// ===== Fatal errors =====

#[tokio::test]
async fn test_session_failure_is_fatal_and_closes_open_sessions() {
    let site = Arc::new(Site::default().page("https://docs.example.com/a", "A", &[]));
    let factory = ScriptedFactory {
        site: site.clone(),
        max_sessions: Some(1),
        created: AtomicUsize::new(0),
    };
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(Arc::new(factory), sink, VisitedLog::disabled(), 10.0),
    );
    let result = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await;

    assert!(matches!(result, Err(HarvestError::Driver(_))));
    assert_eq!(site.closed.load(Ordering::SeqCst), 1);
    assert_eq!(site.loads("https://docs.example.com/a"), 0);
}

#[tokio::test]
async fn test_sink_failure_is_fatal() {
    let site = Arc::new(
        Site::default()
            .page("https://docs.example.com/a", "A", &[("/b", "")])
            .page("https://docs.example.com/b", "B", &[]),
    );
    let sink = Arc::new(Mutex::new(RecordingSink {
        records: Vec::new(),
        fail: true,
    }));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink,
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let result = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await;

    assert!(matches!(result, Err(HarvestError::Storage(_))));
    assert_eq!(site.loads("https://docs.example.com/b"), 0);
}

#[tokio::test]
async fn test_concurrency_caps_pages_in_flight() {
    let mut site = Site::default().slow(Duration::from_millis(30));
    let mut seed_urls = Vec::new();
    for n in 0..6 {
        let url = format!("https://docs.example.com/page{}", n);
        site = site.page(&url, &format!("Page number {}", n), &[]);
        seed_urls.push(url);
    }
    let site = Arc::new(site);
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let seed_refs: Vec<&str> = seed_urls.iter().map(String::as_str).collect();
    let snapshot = orchestrator.run(&seeds(&seed_refs)).await.unwrap();

    assert_eq!(snapshot.records_stored, 6);
    assert_eq!(site.peak_active.load(Ordering::SeqCst), 2);
    assert_eq!(site.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_configured_prefix_is_normalized() {
    let site = Arc::new(
        Site::default()
            .page(
                "https://docs.example.com/a",
                "Page A intro",
                &[("/b", ""), ("https://docs.example.com.evil.com/c", "")],
            )
            .page("https://docs.example.com/b", "Page B details", &[])
            .page("https://docs.example.com.evil.com/c", "Lookalike", &[]),
    );
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let mut config = test_config();
    config.crawler.allowed_prefix = Some("https://DOCS.Example.com".to_string());

    let orchestrator = Orchestrator::new(
        &config,
        components(
            Arc::new(ScriptedFactory::new(site.clone())),
            sink.clone(),
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let snapshot = orchestrator
        .run(&seeds(&["https://docs.example.com/a"]))
        .await
        .unwrap();

    assert_eq!(snapshot.records_stored, 2);
    assert_eq!(site.loads("https://docs.example.com/b"), 1);
    assert_eq!(site.loads("https://docs.example.com.evil.com/c"), 0);
}

#[tokio::test]
async fn test_no_valid_seeds() {
    let site = Arc::new(Site::default());
    let sink = Arc::new(Mutex::new(RecordingSink::default()));

    let orchestrator = Orchestrator::new(
        &test_config(),
        components(
            Arc::new(ScriptedFactory::new(site)),
            sink,
            VisitedLog::disabled(),
            10.0,
        ),
    );
    let result = orchestrator.run(&seeds(&["mailto:docs@example.com"])).await;

    assert!(matches!(result, Err(HarvestError::Seeds(_))));
}

// ===== End-to-end over HTTP =====

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_static_crawl_into_sqlite() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
            <p>Welcome to the docs</p>
            <a href="/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a class="sidebar" href="/nav">Nav</a>
            </body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(
            r#"<html><head><title>Page 1</title></head><body>
            <p>Install the crate</p>
            <pre><code class="language-rust">fn main() { println!("hi"); }</code></pre>
            <code>cargo add serde</code>
            </body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html(
            r#"<html><head><title>Page 2</title></head><body><p>Second page</p></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/nav"))
        .respond_with(html("<html><body>nav</body></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let visited_path = dir.path().join("visited.log");
    let mut storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    let run_id = storage.create_run("test").unwrap();
    let storage = Arc::new(Mutex::new(storage));

    let config = test_config();
    let drivers = build_factory(&config.driver, Vec::new(), Vec::new());
    let orchestrator = Orchestrator::new(
        &config,
        components(
            drivers,
            storage.clone(),
            VisitedLog::open(&visited_path).unwrap(),
            10.0,
        ),
    );
    let snapshot = orchestrator.run(&seeds(&[base_url.as_str()])).await.unwrap();

    assert_eq!(snapshot.pages_visited, 3);
    assert_eq!(snapshot.records_stored, 3);

    let mut storage = storage.lock().unwrap();
    assert_eq!(storage.count_pages().unwrap(), 3);
    // Home and page 2 have no code (one row each); page 1 has two blocks
    assert_eq!(storage.count_rows().unwrap(), 4);

    let languages = storage.count_by_language().unwrap();
    assert!(languages.iter().any(|(language, _)| language == "rust"));

    storage.finish_run(RunStatus::Completed).unwrap();
    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.records_written, 3);
    assert_eq!(run.status, RunStatus::Completed);

    assert_eq!(visited_urls(&visited_path).len(), 3);
}

#[tokio::test]
async fn test_robots_disallowed_pages_not_loaded() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><p>Public index</p><a href="/private/secret">Secret</a></body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("<html><body>secret</body></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.crawler.obey_robots = true;
    let sink = Arc::new(Mutex::new(RecordingSink::default()));
    let mut parts = components(
        build_factory(&config.driver, Vec::new(), Vec::new()),
        sink.clone(),
        VisitedLog::disabled(),
        10.0,
    );
    parts.robots = Some(Arc::new(RobotsGate::new().unwrap()));

    let snapshot = Orchestrator::new(&config, parts)
        .run(&seeds(&[base_url.as_str()]))
        .await
        .unwrap();

    assert_eq!(snapshot.records_stored, 1);
    assert_eq!(snapshot.disallowed, 1);
    assert_eq!(snapshot.pages_visited, 2);
}

#[tokio::test]
async fn test_links_resolved_after_redirect() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/guide"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/guide/", base_url).as_str()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/guide/"))
        .respond_with(html(
            r#"<html><head><title>Guide</title></head><body>
            <p>Getting started</p>
            <a href="intro">Introduction</a>
            </body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/guide/intro"))
        .respond_with(html(
            r#"<html><head><title>Intro</title></head><body><p>Introduction</p></body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/intro"))
        .respond_with(html("<html><body><p>wrong page</p></body></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = test_config();
    let drivers = build_factory(&config.driver, Vec::new(), Vec::new());
    let sink = Arc::new(Mutex::new(RecordingSink::default()));
    let orchestrator = Orchestrator::new(
        &config,
        components(drivers, sink.clone(), VisitedLog::disabled(), 10.0),
    );
    let snapshot = orchestrator
        .run(&seeds(&[format!("{}/guide", base_url).as_str()]))
        .await
        .unwrap();

    assert_eq!(snapshot.failed, 0);
    assert_eq!(snapshot.records_stored, 2);
    assert_eq!(sink.lock().unwrap().records.len(), 2);
}
