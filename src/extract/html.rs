//! HTML extractor built on scraper

use super::{CodeBlock, ExtractError, ExtractionRecord, Extractor, SourceType};
use scraper::{ElementRef, Html, Selector};

/// Elements whose text is never visible on the page
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Default extractor: title, visible body text and `<code>` elements
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, url: &str, dom: &str) -> Result<ExtractionRecord, ExtractError> {
        if dom.trim().is_empty() {
            return Err(ExtractError::Parse("empty document".to_string()));
        }

        let document = Html::parse_document(dom);

        let body_selector = selector("body")?;
        let body = document
            .select(&body_selector)
            .next()
            .ok_or(ExtractError::MissingBody)?;

        let mut raw_text = String::new();
        collect_visible_text(body, &mut raw_text);

        Ok(ExtractionRecord {
            url: url.to_string(),
            title: extract_title(&document)?,
            content: clean_text(&raw_text),
            code_blocks: extract_code_blocks(&document)?,
            source_type: SourceType::from_url(url),
        })
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Parse(format!("selector '{}': {:?}", css, e)))
}

fn extract_title(document: &Html) -> Result<String, ExtractError> {
    let title_selector = selector("title")?;
    Ok(document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default())
}

/// Appends the text a reader would see, separated by spaces
fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if INVISIBLE_TAGS.contains(&child_element.value().name()) {
                continue;
            }
            collect_visible_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

/// Every non-empty `<code>` element, in document order
fn extract_code_blocks(document: &Html) -> Result<Vec<CodeBlock>, ExtractError> {
    let code_selector = selector("code")?;

    Ok(document
        .select(&code_selector)
        .filter_map(|element| {
            let code = element.text().collect::<String>().trim().to_string();
            if code.is_empty() {
                return None;
            }
            Some(CodeBlock::analyze(code, class_hint(element).as_deref()))
        })
        .collect())
}

/// Class attribute of the code element, falling back to an enclosing `<pre>`
fn class_hint(element: ElementRef<'_>) -> Option<String> {
    let own = element.value().attr("class").map(str::to_string);
    if own.is_some() {
        return own;
    }

    element
        .parent()
        .and_then(ElementRef::wrap)
        .filter(|parent| parent.value().name() == "pre")
        .and_then(|parent| parent.value().attr("class"))
        .map(str::to_string)
}

/// Normalizes page text for storage and fingerprinting
///
/// Punctuation is dropped (word characters and whitespace survive), runs of
/// whitespace collapse to one space and the result is lowercased.
pub fn clean_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
