//! Static HTTP page driver
//!
//! Fetches pages with reqwest and reads them with scraper. There is no
//! JavaScript engine behind it, so scrolling never changes the page height
//! and nothing is clickable. That makes it a good fit for server-rendered
//! documentation and for running the crawler without a browser.

use super::rotation::RotationPool;
use super::traits::{
    DriverError, DriverFactory, DriverResult, ElementHandle, ElementPredicate, LinkCandidate,
    PageDriver,
};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// A page fetched by the static driver
#[derive(Debug, Clone)]
struct LoadedPage {
    /// Where the request ended up after redirects
    url: Url,
    html: String,
}

/// Page driver backed by plain HTTP requests
///
/// One client is built per proxy; every request goes through a randomly
/// chosen one. Without proxies a single direct client is used.
pub struct HttpPageDriver {
    clients: Vec<(Option<String>, Client)>,
    current: Option<LoadedPage>,
}

impl HttpPageDriver {
    /// Builds the driver's clients
    ///
    /// # Arguments
    ///
    /// * `user_agent` - User-Agent header sent with every request
    /// * `proxies` - Proxy URLs (http, https or socks5); empty for direct
    pub fn new(user_agent: &str, proxies: &[String]) -> DriverResult<Self> {
        let mut clients = Vec::with_capacity(proxies.len().max(1));

        if proxies.is_empty() {
            clients.push((None, build_client(user_agent, None)?));
        } else {
            for proxy in proxies {
                let client = build_client(user_agent, Some(proxy))?;
                clients.push((Some(proxy.clone()), client));
            }
        }

        Ok(Self {
            clients,
            current: None,
        })
    }

    fn pick_client(&self) -> DriverResult<&(Option<String>, Client)> {
        use rand::seq::SliceRandom;
        self.clients
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| DriverError::Session("no HTTP client available".to_string()))
    }

    fn page(&self) -> DriverResult<&LoadedPage> {
        self.current
            .as_ref()
            .ok_or_else(|| DriverError::Session("no page loaded".to_string()))
    }
}

fn build_client(user_agent: &str, proxy: Option<&str>) -> DriverResult<Client> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| DriverError::Session(format!("invalid proxy '{}': {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Classifies a reqwest failure for `url`
fn navigation_error(url: &str, timeout: Duration, error: reqwest::Error) -> DriverError {
    if error.is_timeout() {
        DriverError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        DriverError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Collects every `<a href>` with its class list
fn parse_links(html: &str) -> Vec<LinkCandidate> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let classes = element.value().attr("class").unwrap_or("");
            Some(LinkCandidate::new(href, classes))
        })
        .collect()
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    fn is_interactive(&self) -> bool {
        false
    }

    async fn load(&mut self, url: &str, timeout: Duration) -> DriverResult<()> {
        self.current = None;

        let (proxy, client) = self.pick_client()?;
        if let Some(proxy) = proxy {
            tracing::debug!("Fetching {} via proxy {}", url, proxy);
        }

        let response = client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| navigation_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.is_empty() && !content_type.contains("html") {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                message: format!("not an HTML page ({})", content_type),
            });
        }

        let final_url = response.url().clone();
        if final_url.as_str() != url {
            tracing::debug!("{} redirected to {}", url, final_url);
        }
        let html = response
            .text()
            .await
            .map_err(|e| navigation_error(url, timeout, e))?;

        self.current = Some(LoadedPage {
            url: final_url,
            html,
        });
        Ok(())
    }

    async fn wait_for_ready(&mut self, _timeout: Duration) -> DriverResult<()> {
        // A fully received response is as ready as it will ever be
        self.page().map(|_| ())
    }

    async fn page_height(&mut self) -> DriverResult<u64> {
        Ok(self.page()?.html.len() as u64)
    }

    async fn scroll_to_bottom(&mut self) -> DriverResult<()> {
        self.page().map(|_| ())
    }

    async fn find_matching(
        &mut self,
        predicate: &ElementPredicate,
    ) -> DriverResult<Vec<ElementHandle>> {
        let page = self.page()?;
        tracing::trace!(
            "Static driver skips interactive lookup of <{}> on {}",
            predicate.tag,
            page.url
        );
        Ok(Vec::new())
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        Err(DriverError::ElementInteraction(format!(
            "element {} cannot be clicked on a static page",
            element.0
        )))
    }

    async fn current_dom_snapshot(&mut self) -> DriverResult<String> {
        Ok(self.page()?.html.clone())
    }

    /// Anchors with hrefs resolved against the post-redirect URL
    async fn extract_links(&mut self) -> DriverResult<Vec<LinkCandidate>> {
        let page = self.page()?;
        Ok(parse_links(&page.html)
            .into_iter()
            .map(|mut link| {
                if let Ok(absolute) = page.url.join(&link.href) {
                    link.href = absolute.to_string();
                }
                link
            })
            .collect())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.current = None;
        Ok(())
    }
}

/// Creates static drivers, each with its own randomly chosen user agent
pub struct HttpDriverFactory {
    user_agents: RotationPool,
    proxies: Vec<String>,
}

impl HttpDriverFactory {
    pub fn new(user_agents: RotationPool, proxies: Vec<String>) -> Self {
        Self {
            user_agents,
            proxies,
        }
    }
}

#[async_trait]
impl DriverFactory for HttpDriverFactory {
    async fn create(&self) -> DriverResult<Box<dyn PageDriver>> {
        let user_agent = self
            .user_agents
            .choose()
            .unwrap_or(concat!("code-harvest/", env!("CARGO_PKG_VERSION")));
        tracing::debug!("Opening static session with user agent {}", user_agent);

        let driver = HttpPageDriver::new(user_agent, &self.proxies)?;
        Ok(Box::new(driver))
    }
}
