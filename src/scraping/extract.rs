//! HTML text and outlink extraction.
//!
//! The [`Extractor`] trait is the seam between the crawl core and any
//! concrete HTML library; the core never imports one directly. The default
//! implementation walks the parsed tree once, dropping boilerplate subtrees
//! (`script`, `style`, `meta`, `link`, `noscript`, `header`, `footer`,
//! `nav`) and normalizing whitespace runs to single spaces.

use std::collections::HashSet;

use anyhow::Result;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extraction output: boilerplate-free text and absolute, defragmented,
/// page-deduplicated outlinks.
pub struct ExtractedPage {
    pub text: String,
    pub links: Vec<String>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, base: &Url, body: &[u8]) -> Result<ExtractedPage>;
}

/// Tags whose entire subtree carries no readable content.
const EXCLUDED_TAGS: [&str; 8] = [
    "script", "style", "meta", "link", "noscript", "header", "footer", "nav",
];

/// Default extractor built on the `scraper` crate.
pub struct HtmlExtractor {
    whitespace: Regex,
    anchors: Selector,
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self {
            whitespace: Regex::new(r"\s+").expect("whitespace regex"),
            anchors: Selector::parse("a[href]").expect("anchor selector"),
        }
    }

    /// Collect text nodes, skipping excluded subtrees.
    fn collect_text(&self, element: &ElementRef, parts: &mut Vec<String>) {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                if EXCLUDED_TAGS.contains(&child_element.value().name()) {
                    continue;
                }
                self.collect_text(&child_element, parts);
            } else if let Some(text) = child.value().as_text() {
                let trimmed = text.text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
        }
    }

    fn extract_text(&self, document: &Html) -> String {
        let mut parts = Vec::new();
        self.collect_text(&document.root_element(), &mut parts);
        let joined = parts.join(" ");
        self.whitespace.replace_all(&joined, " ").trim().to_string()
    }

    fn extract_links(&self, document: &Html, base: &Url) -> Vec<String> {
        let mut self_reference = base.clone();
        self_reference.set_fragment(None);

        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&self.anchors) {
            let href = element.value().attr("href").unwrap_or("").trim();
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            let mut resolved = match base.join(href) {
                Ok(u) => u,
                Err(_) => continue,
            };
            resolved.set_fragment(None);

            if resolved == self_reference {
                continue;
            }

            let url = resolved.to_string();
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }

        links
    }
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, base: &Url, body: &[u8]) -> Result<ExtractedPage> {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        Ok(ExtractedPage {
            text: self.extract_text(&document),
            links: self.extract_links(&document, base),
        })
    }
}
