//! Observational counters and plain-text reports.
//!
//! None of this is load-bearing for crawl correctness; it exists so an
//! operator can see where the admission boundary bit, how much duplication
//! the detector absorbed, and whether the crawl is still moving.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};

/// How many example URLs to keep per rejection reason.
const SAMPLES_PER_REASON: usize = 5;

#[derive(Default)]
struct ReasonStat {
    count: u64,
    samples: Vec<String>,
}

/// Per-reason rejection counters with a few sample URLs each.
pub struct RejectionStats {
    reasons: Mutex<HashMap<String, ReasonStat>>,
}

impl RejectionStats {
    pub fn new() -> Self {
        Self {
            reasons: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, reason: &str, url: &str) {
        let mut reasons = self.reasons.lock().expect("rejection stats mutex poisoned");
        let stat = reasons.entry(reason.to_string()).or_default();
        stat.count += 1;
        if stat.samples.len() < SAMPLES_PER_REASON {
            stat.samples.push(url.to_string());
        }
    }

    /// `(reason, count, samples)` rows sorted by count, highest first.
    pub fn snapshot(&self) -> Vec<(String, u64, Vec<String>)> {
        let reasons = self.reasons.lock().expect("rejection stats mutex poisoned");
        let mut rows: Vec<(String, u64, Vec<String>)> = reasons
            .iter()
            .map(|(reason, stat)| (reason.clone(), stat.count, stat.samples.clone()))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows
    }

    /// Write the plain-text rejection report.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(
            File::create(path)
                .with_context(|| format!("cannot create rejection report {}", path.display()))?,
        );
        writeln!(out, "REJECTED URLS BY REASON")?;
        writeln!(out, "{}", "=".repeat(60))?;
        for (reason, count, samples) in self.snapshot() {
            writeln!(out, "{:<20} {}", reason, count)?;
            for sample in samples {
                writeln!(out, "    {}", sample)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

impl Default for RejectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic progress counters shared by all workers.
#[derive(Default)]
pub struct CrawlStats {
    pub pages_processed: AtomicU64,
    pub pages_saved: AtomicU64,
    pub duplicate_pages: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub skipped_pages: AtomicU64,
    pub parse_failures: AtomicU64,
    pub links_discovered: AtomicU64,
    pub links_admitted: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn progress_line(&self) -> String {
        format!(
            "processed={} saved={} duplicates={} fetch_failures={} skipped={} links {}/{} admitted",
            Self::get(&self.pages_processed),
            Self::get(&self.pages_saved),
            Self::get(&self.duplicate_pages),
            Self::get(&self.fetch_failures),
            Self::get(&self.skipped_pages),
            Self::get(&self.links_admitted),
            Self::get(&self.links_discovered),
        )
    }
}

/// Append-only plain-text log of duplicate verdicts: one
/// `kind<TAB>url<TAB>detail` line per duplicate or too-short page.
pub struct DuplicateReport {
    file: Mutex<BufWriter<File>>,
}

impl DuplicateReport {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open duplicate report {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn record(&self, kind: &str, url: &str, detail: &str) {
        let mut file = self.file.lock().expect("duplicate report mutex poisoned");
        let _ = writeln!(file, "{}\t{}\t{}", kind, url, detail);
        let _ = file.flush();
    }
}
