//! Headless Chrome page driver
//!
//! Each session launches its own Chrome process through chromiumoxide and
//! drives a single tab over the DevTools protocol. The user agent and proxy
//! are fixed for the lifetime of a session, so both go in as launch
//! arguments.

use super::rotation::RotationPool;
use super::traits::{
    DriverError, DriverFactory, DriverResult, ElementHandle, ElementPredicate, LinkCandidate,
    PageDriver,
};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// How often readiness is polled
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

const READY_SCRIPT: &str = "document.readyState === 'complete' && document.body !== null";
const HEIGHT_SCRIPT: &str = "document.body ? document.body.scrollHeight : 0";
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";
const LINKS_SCRIPT: &str = "Array.from(document.querySelectorAll('a[href]'))\
    .map(a => [a.href, a.getAttribute('class') || ''])";

/// Launch options for one browser session
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,

    /// Chrome binary; detected from the usual install locations when unset
    pub executable: Option<PathBuf>,
}

impl BrowserOptions {
    /// Command-line switches passed to Chrome on top of chromiumoxide's own
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        if let Some(agent) = &self.user_agent {
            args.push(format!("--user-agent={}", agent));
        }
        if let Some(proxy) = &self.proxy {
            args.push(format!("--proxy-server={}", proxy));
        }
        args
    }

    fn browser_config(&self) -> DriverResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder();
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        for arg in self.launch_args() {
            builder = builder.arg(arg);
        }

        builder.build().map_err(DriverError::Session)
    }
}

fn session_error(error: CdpError) -> DriverError {
    DriverError::Session(error.to_string())
}

fn script_error(error: CdpError) -> DriverError {
    DriverError::Script(error.to_string())
}

/// Looks up the element a handle from `find_matching` refers to
fn resolve_handle<'a, T>(elements: &'a [T], handle: &ElementHandle) -> DriverResult<&'a T> {
    handle
        .0
        .parse::<usize>()
        .ok()
        .and_then(|index| elements.get(index))
        .ok_or_else(|| DriverError::ElementInteraction(format!("stale element {}", handle.0)))
}

/// One Chrome process with one tab
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    /// Elements from the last `find_matching`, addressed by index
    elements: Vec<Element>,
    closed: bool,
}

impl BrowserSession {
    /// Launches Chrome and opens a blank tab
    pub async fn launch(options: &BrowserOptions) -> DriverResult<Self> {
        let config = options.browser_config()?;
        let (mut browser, mut events) = Browser::launch(config).await.map_err(session_error)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser connection closed: {}", e);
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    tracing::warn!("Failed to shut down browser: {}", close_err);
                }
                handler.abort();
                return Err(session_error(e));
            }
        };

        tracing::debug!("Launched browser session");

        Ok(Self {
            browser,
            page,
            handler,
            elements: Vec::new(),
            closed: false,
        })
    }

    async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> DriverResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(script_error)?
            .into_value()
            .map_err(|e| DriverError::Script(format!("unexpected result of `{}`: {}", script, e)))
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn load(&mut self, url: &str, timeout: Duration) -> DriverResult<()> {
        self.elements.clear();

        let timeout_error = || DriverError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(CdpError::Timeout)) | Err(_) => Err(timeout_error()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn wait_for_ready(&mut self, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.evaluate::<bool>(READY_SCRIPT).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::ReadinessTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn page_height(&mut self) -> DriverResult<u64> {
        let height: f64 = self.evaluate(HEIGHT_SCRIPT).await?;
        Ok(height.max(0.0) as u64)
    }

    async fn scroll_to_bottom(&mut self) -> DriverResult<()> {
        self.page
            .evaluate(SCROLL_SCRIPT)
            .await
            .map(|_| ())
            .map_err(script_error)
    }

    async fn find_matching(
        &mut self,
        predicate: &ElementPredicate,
    ) -> DriverResult<Vec<ElementHandle>> {
        self.elements = self
            .page
            .find_xpaths(predicate.to_xpath())
            .await
            .map_err(script_error)?;

        Ok((0..self.elements.len())
            .map(|index| ElementHandle(index.to_string()))
            .collect())
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        resolve_handle(&self.elements, element)?
            .click()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::ElementInteraction(e.to_string()))
    }

    async fn current_dom_snapshot(&mut self) -> DriverResult<String> {
        self.page.content().await.map_err(script_error)
    }

    async fn extract_links(&mut self) -> DriverResult<Vec<LinkCandidate>> {
        // `a.href` is already resolved against the document's base URL
        let pairs: Vec<(String, String)> = self.evaluate(LINKS_SCRIPT).await?;

        Ok(pairs
            .into_iter()
            .map(|(href, classes)| LinkCandidate::new(href, &classes))
            .collect())
    }

    async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.elements.clear();

        let result = self.browser.close().await.map(|_| ()).map_err(session_error);
        if result.is_ok() {
            if let Err(e) = self.browser.wait().await {
                tracing::debug!("Browser process did not exit cleanly: {}", e);
            }
        }
        self.handler.abort();
        result
    }
}

/// Launches browser sessions with rotating user agents and proxies
pub struct BrowserFactory {
    headless: bool,
    executable: Option<PathBuf>,
    user_agents: RotationPool,
    proxies: RotationPool,
}

impl BrowserFactory {
    pub fn new(
        headless: bool,
        executable: Option<PathBuf>,
        user_agents: RotationPool,
        proxies: RotationPool,
    ) -> Self {
        Self {
            headless,
            executable,
            user_agents,
            proxies,
        }
    }

    /// Picks this session's user agent and proxy
    pub fn session_options(&self) -> BrowserOptions {
        BrowserOptions {
            headless: self.headless,
            user_agent: self.user_agents.choose().map(str::to_string),
            proxy: self.proxies.choose().map(str::to_string),
            executable: self.executable.clone(),
        }
    }
}

#[async_trait]
impl DriverFactory for BrowserFactory {
    async fn create(&self) -> DriverResult<Box<dyn PageDriver>> {
        let options = self.session_options();

        if let Some(proxy) = &options.proxy {
            tracing::info!("Opening browser session via proxy {}", proxy);
        }

        let session = BrowserSession::launch(&options).await?;
        Ok(Box::new(session))
    }
}
