//! Line-oriented input files: seeds, proxies and user agents

use crate::url::normalize_url;
use crate::HarvestError;
use std::io::ErrorKind;
use std::path::Path;

/// Proxies used when no proxy list is available
pub const DEFAULT_PROXIES: &[&str] = &["http://127.0.0.1:8080", "socks5://127.0.0.1:9050"];

/// Built-in user-agent pool
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.5790.170 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/116.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36 Edg/116.0.1938.81",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/116.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 13) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.5845.166 Mobile Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/116.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:102.0) Gecko/20100101 Firefox/102.0",
];

/// Reads non-empty, non-comment lines from a text file
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_lines(&content))
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Loads the seed list, normalizing every URL
///
/// An empty list or an unparseable URL is an error: the crawl has nothing
/// sensible to do without valid seeds.
pub fn load_seeds(path: &Path) -> Result<Vec<String>, HarvestError> {
    let lines = read_lines(path).map_err(|e| {
        HarvestError::Seeds(format!("cannot read {}: {}", path.display(), e))
    })?;

    let mut seeds = Vec::with_capacity(lines.len());
    for line in lines {
        let url = normalize_url(&line)
            .map_err(|e| HarvestError::Seeds(format!("invalid seed '{}': {}", line, e)))?;
        seeds.push(url.to_string());
    }

    if seeds.is_empty() {
        return Err(HarvestError::Seeds(format!(
            "{} contains no seed URLs",
            path.display()
        )));
    }

    Ok(seeds)
}

/// Loads the proxy list
///
/// No configured path means direct connections (an empty list). A configured
/// file that is missing or empty falls back to [`DEFAULT_PROXIES`].
pub fn load_proxies(path: Option<&Path>) -> std::io::Result<Vec<String>> {
    let defaults = || DEFAULT_PROXIES.iter().map(|p| p.to_string()).collect();

    let Some(path) = path else {
        return Ok(Vec::new());
    };

    match read_lines(path) {
        Ok(proxies) if !proxies.is_empty() => Ok(proxies),
        Ok(_) => {
            tracing::warn!("{} is empty. Using default proxies.", path.display());
            Ok(defaults())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!("{} not found. Using default proxies.", path.display());
            Ok(defaults())
        }
        Err(e) => Err(e),
    }
}

/// Loads the user-agent pool, falling back to [`DEFAULT_USER_AGENTS`]
pub fn load_user_agents(path: Option<&Path>) -> std::io::Result<Vec<String>> {
    let agents = match path {
        Some(path) => read_lines(path)?,
        None => Vec::new(),
    };

    if agents.is_empty() {
        return Ok(DEFAULT_USER_AGENTS.iter().map(|a| a.to_string()).collect());
    }

    Ok(agents)
}
