//! URL handling module for Code Harvest
//!
//! This module provides URL normalization, href resolution and the link
//! filter that decides which discovered links may enter the frontier.

mod normalize;

use crate::driver::LinkCandidate;
use crate::UrlError;
use url::Url;

// Re-export main functions
pub use normalize::{normalize_url, resolve_href};

/// Class marker identifying navigation chrome that should not be followed
pub const SIDEBAR_MARKER: &str = "sidebar";

/// Returns true if `url` lies under the allowed prefix
///
/// The comparison is a literal prefix match on the normalized URL text, so a
/// prefix of `https://docs.example.com/guide/` admits every page below that
/// path and nothing on sibling paths or other hosts.
pub fn is_within_prefix(url: &Url, allowed_prefix: &str) -> bool {
    url.as_str().starts_with(allowed_prefix)
}

/// Canonical form of a configured allowed prefix
///
/// Parsing lowercases the host and gives a bare origin its `/` path, so
/// `https://Docs.Example.com` becomes `https://docs.example.com/` and no
/// longer admits `https://docs.example.com.evil.com/`. A path without a
/// trailing slash is kept as written but still matches siblings sharing its
/// text (`/guide` admits `/guide-old`), which is logged.
pub fn normalize_prefix(prefix: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(prefix.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }
    url.set_fragment(None);

    if !url.path().ends_with('/') {
        tracing::warn!(
            "Allowed prefix {} does not end in '/', sibling paths sharing its text will match",
            url
        );
    }

    Ok(url.to_string())
}

/// Returns true if any class on the link carries the sidebar marker
pub fn is_sidebar_link(candidate: &LinkCandidate) -> bool {
    candidate
        .css_classes
        .iter()
        .any(|class| class.to_ascii_lowercase().contains(SIDEBAR_MARKER))
}

/// Decides whether a single extracted link should be followed
///
/// The href is resolved against `page_url`; the link is kept only if it
/// resolves to an http(s) URL under `allowed_prefix` and is not sidebar
/// navigation.
pub fn follow_link(candidate: &LinkCandidate, page_url: &Url, allowed_prefix: &str) -> Option<Url> {
    if is_sidebar_link(candidate) {
        return None;
    }

    let resolved = resolve_href(&candidate.href, page_url)?;
    if !is_within_prefix(&resolved, allowed_prefix) {
        return None;
    }

    Some(resolved)
}

/// Applies [`follow_link`] to every link extracted from a page
///
/// Duplicates within the page are collapsed, first occurrence wins.
pub fn filter_links(links: &[LinkCandidate], page_url: &Url, allowed_prefix: &str) -> Vec<Url> {
    let mut kept: Vec<Url> = Vec::new();
    for candidate in links {
        if let Some(url) = follow_link(candidate, page_url, allowed_prefix) {
            if !kept.contains(&url) {
                kept.push(url);
            }
        }
    }
    kept
}
