pub mod core;
pub mod dedup;
pub mod filter;
pub mod frontier;
pub mod scraping;
pub mod urls;
pub mod worker;

// --- Primary core exports ---
pub use self::core::config;
pub use self::core::CrawlContext;

// --- Convenience re-exports for embedders and tests ---
pub use self::dedup::{DuplicateDetector, Verdict};
pub use self::filter::ContentFilter;
pub use self::frontier::Frontier;
pub use self::scraping::fetch::{FetchedPage, Fetcher};
pub use self::scraping::PageScraper;
pub use self::worker::Worker;
