use serde::Deserialize;

/// Main configuration structure for Code Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of workers inside the load/expand/extract path at once
    pub concurrency: u32,

    /// Navigation timeout per load attempt (milliseconds)
    pub page_load_timeout_ms: u64,

    /// How long to wait for the document to become ready (milliseconds)
    pub ready_timeout_ms: u64,

    /// Total load attempts per URL, including the first
    pub max_load_attempts: u32,

    /// Base delay between load attempts (milliseconds)
    pub retry_backoff_ms: u64,

    /// Upper bound on infinite-scroll iterations
    pub scroll_max_iterations: u32,

    /// Settle time after each scroll (milliseconds)
    pub scroll_stability_wait_ms: u64,

    /// Settle time after each expansion click (milliseconds)
    pub click_wait_ms: u64,

    /// Politeness delay after each page (milliseconds)
    pub download_delay_ms: u64,

    /// Settle time after a login/CAPTCHA hook fired (milliseconds)
    pub hook_settle_ms: u64,

    /// Orchestrator tick interval (milliseconds)
    pub tick_interval_ms: u64,

    /// Discovered links must start with this prefix; defaults to the first seed
    pub allowed_prefix: Option<String>,

    /// Consult robots.txt before loading a page
    pub obey_robots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            page_load_timeout_ms: 30_000,
            ready_timeout_ms: 10_000,
            max_load_attempts: 3,
            retry_backoff_ms: 1_000,
            scroll_max_iterations: 20,
            scroll_stability_wait_ms: 2_000,
            click_wait_ms: 1_000,
            download_delay_ms: 10_000,
            hook_settle_ms: 5_000,
            tick_interval_ms: 1_000,
            allowed_prefix: None,
            obey_robots: false,
        }
    }
}

/// What the orchestrator does while a resource limit is exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    /// Log a warning and carry on
    Warn,
    /// Withhold admission permits until usage drops
    Throttle,
    /// Request a cooperative stop
    Stop,
}

/// Process resource ceilings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LimitsConfig {
    /// Resident memory ceiling (megabytes)
    pub memory_limit_mb: f64,

    /// CPU usage ceiling (percent of one core)
    pub cpu_limit_percent: f64,

    /// Policy applied while a limit is exceeded
    pub on_exceeded: LimitPolicy,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: 2048.0,
            cpu_limit_percent: 70.0,
            on_exceeded: LimitPolicy::Throttle,
        }
    }
}

/// External input files
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InputConfig {
    /// Newline-delimited list of seed URLs
    pub seeds_path: String,

    /// Optional newline-delimited proxy list
    #[serde(default)]
    pub proxies_path: Option<String>,

    /// Optional newline-delimited user-agent pool
    #[serde(default)]
    pub user_agents_path: Option<String>,

    /// A stop is requested as soon as this file exists
    #[serde(default)]
    pub stop_file: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Operational log file
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Append-only audit log of visited URLs
    #[serde(default = "default_visited_log_path")]
    pub visited_log_path: String,
}

fn default_log_path() -> String {
    "scraper.log".to_string()
}

fn default_visited_log_path() -> String {
    "scraped_urls.log".to_string()
}

/// Which page driver backs the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Plain HTTP fetch, no script execution
    Static,
    /// Headless Chrome launched per worker session
    Browser,
}

/// Page driver configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DriverConfig {
    pub kind: DriverKind,

    /// Chrome binary; detected from the usual install locations when unset
    pub chrome_executable: Option<String>,

    /// Run the browser without a window
    pub headless: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::Static,
            chrome_executable: None,
            headless: true,
        }
    }
}
