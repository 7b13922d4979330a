pub mod config;
pub mod log;
pub mod stats;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::dedup::DuplicateDetector;
use crate::filter::ContentFilter;
use crate::frontier::Frontier;
use crate::scraping::extract::HtmlExtractor;
use crate::scraping::fetch::{Fetcher, HttpFetcher};
use crate::scraping::pages::PageStore;
use crate::scraping::PageScraper;
use self::config::CrawlConfig;
use self::log::ProcessingLog;
use self::stats::{CrawlStats, DuplicateReport, RejectionStats};

/// Everything a worker needs, built once at launch and shared by reference.
/// There is no hidden global state: the frontier, the duplicate detector,
/// the trap counters, and the stats all live here.
pub struct CrawlContext {
    pub delay: Duration,
    pub worker_count: usize,
    pub data_dir: PathBuf,
    pub frontier: Frontier,
    pub fetcher: Arc<dyn Fetcher>,
    pub scraper: PageScraper,
    pub stats: Arc<CrawlStats>,
    pub rejections: Arc<RejectionStats>,
    stop: AtomicBool,
}

impl CrawlContext {
    /// Wire up the full crawl core from config. `restart` wipes any existing
    /// save file and starts over from the seeds.
    pub fn new(config: &CrawlConfig, restart: bool) -> Result<Self> {
        let data_dir = config.resolve_data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("cannot create data dir {}", data_dir.display()))?;

        let delay = config.resolve_time_delay();
        let worker_count = config.resolve_workers();

        let rejections = Arc::new(RejectionStats::new());
        let filter = Arc::new(ContentFilter::new(Arc::clone(&rejections)));
        let dedup = Arc::new(DuplicateDetector::new());
        let stats = Arc::new(CrawlStats::new());

        let save_file = config.resolve_save_file(&data_dir);
        let frontier = Frontier::new(
            &save_file,
            &config.resolve_seed_urls(),
            delay,
            &filter,
            restart,
        )?;

        let pages = PageStore::new(data_dir.join("pages"))?;
        let processing_log = Arc::new(ProcessingLog::open(&data_dir.join("processing.jsonl"))?);
        let duplicates = Arc::new(DuplicateReport::open(&data_dir.join("duplicates.txt"))?);

        let scraper = PageScraper::new(
            filter,
            dedup,
            pages,
            Box::new(HtmlExtractor::new()),
            Arc::clone(&stats),
            processing_log,
            duplicates,
        );

        let fetcher: Arc<dyn Fetcher> =
            Arc::new(HttpFetcher::new(config.resolve_cache_server())?);

        info!(
            "crawl context ready: {} workers, {:?} politeness delay, data in {}",
            worker_count,
            delay,
            data_dir.display()
        );

        Ok(Self {
            delay,
            worker_count,
            data_dir,
            frontier,
            fetcher,
            scraper,
            stats,
            rejections,
            stop: AtomicBool::new(false),
        })
    }

    /// Swap the fetcher, e.g. for a scripted one in tests.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Ask every worker to exit after finishing its current URL.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Write the shutdown reports: rejection summary plus a crawl summary
    /// with per-host completion counts.
    pub async fn write_reports(&self) -> Result<()> {
        self.rejections
            .write_report(&self.data_dir.join("rejections.txt"))?;

        let (discovered, completed) = self.frontier.totals().await;
        let pending = self.frontier.pending_count().await;
        let mut out = String::new();
        out.push_str("CRAWL SUMMARY\n");
        out.push_str(&"=".repeat(60));
        out.push('\n');
        out.push_str(&format!(
            "urls discovered: {}\nurls completed:  {}\nurls pending:    {}\npages saved:     {}\n",
            discovered,
            completed,
            pending,
            self.scraper.saved_page_count(),
        ));
        out.push_str(&format!("{}\n", self.stats.progress_line()));
        out.push_str("\nPER-HOST PROGRESS\n");
        for (host, host_completed, host_total) in self.frontier.host_summary().await {
            out.push_str(&format!(
                "{:<40} {:>6}/{:<6}\n",
                host, host_completed, host_total
            ));
        }
        std::fs::write(self.data_dir.join("summary.txt"), out)?;
        Ok(())
    }
}
