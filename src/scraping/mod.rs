//! The per-page processing pipeline.
//!
//! `process` takes a fetched response and produces the list of admitted
//! outlinks, with every skip condition logged and counted along the way.
//! Duplicate pages still have their links harvested; the link graph is
//! worth keeping even when the content is not.

pub mod extract;
pub mod fetch;
pub mod pages;

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::core::log::ProcessingLog;
use crate::core::stats::{CrawlStats, DuplicateReport};
use crate::dedup::{DuplicateDetector, Verdict};
use crate::filter::ContentFilter;
use self::extract::Extractor;
use self::fetch::FetchedPage;
use self::pages::PageStore;

/// Bodies smaller than this carry no indexable page.
const MIN_BODY_BYTES: usize = 100;
/// Bodies larger than this are download traps, not pages.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
/// Minimum words for a page to be worth processing at all.
const MIN_WORDS: usize = 50;
/// Pages with no outlinks are only saved above this word count.
const SAVE_WORD_THRESHOLD: usize = 200;

/// Why a response was skipped without producing outlinks.
#[derive(thiserror::Error, Debug)]
pub enum PageError {
    #[error("fetch failed with status {0}")]
    FetchFailed(u16),

    #[error("response body empty or too small ({0} bytes)")]
    BodyEmpty(usize),

    #[error("response body too large ({0} bytes)")]
    BodyTooLarge(usize),

    #[error("too few words ({0})")]
    LowWordCount(usize),

    #[error("extraction failed: {0}")]
    Extract(String),
}

impl PageError {
    /// Stable label for counters and the processing log.
    fn label(&self) -> &'static str {
        match self {
            PageError::FetchFailed(_) => "fetch_failure",
            PageError::BodyEmpty(_) => "body_empty",
            PageError::BodyTooLarge(_) => "body_too_large",
            PageError::LowWordCount(_) => "low_words",
            PageError::Extract(_) => "parse_exception",
        }
    }
}

/// One shared pipeline instance, used concurrently by every worker.
pub struct PageScraper {
    filter: Arc<ContentFilter>,
    dedup: Arc<DuplicateDetector>,
    pages: PageStore,
    extractor: Box<dyn Extractor>,
    stats: Arc<CrawlStats>,
    log: Arc<ProcessingLog>,
    duplicates: Arc<DuplicateReport>,
}

impl PageScraper {
    pub fn new(
        filter: Arc<ContentFilter>,
        dedup: Arc<DuplicateDetector>,
        pages: PageStore,
        extractor: Box<dyn Extractor>,
        stats: Arc<CrawlStats>,
        log: Arc<ProcessingLog>,
        duplicates: Arc<DuplicateReport>,
    ) -> Self {
        Self {
            filter,
            dedup,
            pages,
            extractor,
            stats,
            log,
            duplicates,
        }
    }

    /// Process one fetched page and return the admitted outlinks.
    ///
    /// Never fails: every skip condition is logged and reported as an empty
    /// link list so the worker can mark the URL complete and move on.
    pub fn process(&self, url: &str, resp: &FetchedPage) -> Vec<String> {
        CrawlStats::bump(&self.stats.pages_processed);

        match self.process_inner(url, resp) {
            Ok(links) => links,
            Err(e) => {
                // Truncate noisy parser messages; thirty characters is enough
                // to recognize the failure class in the log.
                let msg: String = e.to_string().chars().take(30).collect();
                warn!("skipping {}: {}", url, msg);
                self.log.event(e.label(), url, &msg);
                match e {
                    PageError::FetchFailed(_) => CrawlStats::bump(&self.stats.fetch_failures),
                    PageError::Extract(_) => CrawlStats::bump(&self.stats.parse_failures),
                    _ => CrawlStats::bump(&self.stats.skipped_pages),
                }
                Vec::new()
            }
        }
    }

    fn process_inner(&self, url: &str, resp: &FetchedPage) -> Result<Vec<String>, PageError> {
        if resp.status != 200 {
            return Err(PageError::FetchFailed(resp.status));
        }
        if resp.body.len() < MIN_BODY_BYTES {
            return Err(PageError::BodyEmpty(resp.body.len()));
        }
        if resp.body.len() > MAX_BODY_BYTES {
            return Err(PageError::BodyTooLarge(resp.body.len()));
        }

        let base = Url::parse(url).map_err(|e| PageError::Extract(e.to_string()))?;
        let page = self
            .extractor
            .extract(&base, &resp.body)
            .map_err(|e| PageError::Extract(e.to_string()))?;

        let word_count = page.text.split_whitespace().count();
        if word_count < MIN_WORDS {
            return Err(PageError::LowWordCount(word_count));
        }

        let verdict = self.dedup.check(url, &page.text);
        match &verdict {
            Verdict::Unique => {
                if !page.links.is_empty() || word_count > SAVE_WORD_THRESHOLD {
                    let content_hash = DuplicateDetector::content_hash(&page.text);
                    if let Err(e) = self.pages.save(url, &page.text, &content_hash) {
                        warn!("failed to save page record for {}: {}", url, e);
                    } else {
                        CrawlStats::bump(&self.stats.pages_saved);
                        self.log.event("saved", url, &format!("words={}", word_count));
                    }
                }
            }
            Verdict::Exact => {
                CrawlStats::bump(&self.stats.duplicate_pages);
                self.duplicates.record("exact", url, "");
                self.log.event("duplicate_exact", url, "");
            }
            Verdict::Similar {
                distance,
                matched_url,
            } => {
                CrawlStats::bump(&self.stats.duplicate_pages);
                let detail = format!("distance={} of {}", distance, matched_url);
                self.duplicates.record("similar", url, &detail);
                self.log.event("duplicate_similar", url, &detail);
            }
            Verdict::TooShort => {
                CrawlStats::bump(&self.stats.duplicate_pages);
                self.duplicates.record("too_short", url, "");
                self.log.event("too_short", url, "");
            }
        }

        CrawlStats::add(&self.stats.links_discovered, page.links.len() as u64);
        let admitted: Vec<String> = page
            .links
            .into_iter()
            .filter(|link| self.filter.is_valid(link))
            .collect();
        CrawlStats::add(&self.stats.links_admitted, admitted.len() as u64);

        info!(
            "processed {} ({} words, {} links admitted, {})",
            url,
            word_count,
            admitted.len(),
            verdict.label()
        );
        Ok(admitted)
    }

    pub fn saved_page_count(&self) -> usize {
        self.pages.count()
    }

    #[cfg(test)]
    fn page_store(&self) -> &PageStore {
        &self.pages
    }
}
