//! The URL frontier: per-host FIFO queues, a politeness clock, and the
//! durable seen-set.
//!
//! All shared state lives behind one coarse mutex: the seen set, the host
//! queues, and the save file must mutate together or the "every accepted
//! URL is queued or completed, forever" invariant breaks.
//! Critical sections never block on the network; the only I/O inside the
//! lock is the synced append to the save file.

pub mod store;

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::filter::ContentFilter;
use crate::urls;
use self::store::FrontierStore;

struct FrontierInner {
    store: FrontierStore,
    /// Hosts in first-seen order. Scanning this instead of a hash map makes
    /// `get_tbd_url` deterministic and starvation-free.
    host_order: Vec<String>,
    queues: HashMap<String, VecDeque<String>>,
    last_access: HashMap<String, Instant>,
    /// Canonical URLs ever accepted, mirroring the durable store.
    seen: HashSet<String>,
    /// urlhash -> (url, completed); in-memory mirror used for restart checks
    /// and the shutdown summary.
    records: HashMap<String, (String, bool)>,
}

impl FrontierInner {
    fn enqueue(&mut self, url: &str) {
        let host = match urls::host_of(url) {
            Some(h) => h,
            None => {
                warn!("url without host reached the frontier: {}", url);
                return;
            }
        };
        if !self.queues.contains_key(&host) {
            self.host_order.push(host.clone());
        }
        self.queues.entry(host).or_default().push_back(url.to_string());
    }

    /// Accept a URL: persist it, mirror it, queue it. Returns `false` when it
    /// was already known.
    fn accept(&mut self, url: &str) -> Result<bool> {
        let normalized = match urls::normalize(url) {
            Ok(n) => n,
            Err(e) => {
                warn!("dropping unparseable url: {}", e);
                return Ok(false);
            }
        };

        if self.seen.contains(&normalized) {
            return Ok(false);
        }

        let hash = urls::urlhash(&normalized);
        self.store.put(&hash, &normalized, false)?;
        self.seen.insert(normalized.clone());
        self.records.insert(hash, (normalized.clone(), false));
        self.enqueue(&normalized);
        Ok(true)
    }

    fn pending(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }
}

/// Thread-safe, durable URL scheduler enforcing a per-host politeness delay.
pub struct Frontier {
    delay: Duration,
    inner: Mutex<FrontierInner>,
}

impl Frontier {
    /// Open (or reset, when `restart` is set) the save file at `save_file`
    /// and rebuild the in-memory frontier.
    ///
    /// Without `restart`, every incomplete URL that still passes the
    /// admission filter is re-enqueued; an empty store falls back to the
    /// seeds. With `restart`, any existing save file is deleted first.
    pub fn new(
        save_file: &Path,
        seeds: &[String],
        delay: Duration,
        filter: &ContentFilter,
        restart: bool,
    ) -> Result<Self> {
        match (save_file.exists(), restart) {
            (false, false) => {
                info!(
                    "did not find save file {}, starting from seeds",
                    save_file.display()
                );
            }
            (true, true) => {
                info!("found save file {}, deleting it", save_file.display());
                std::fs::remove_file(save_file)?;
            }
            _ => {}
        }

        let (store, entries) = FrontierStore::open(save_file)?;

        let mut inner = FrontierInner {
            store,
            host_order: Vec::new(),
            queues: HashMap::new(),
            last_access: HashMap::new(),
            seen: HashSet::new(),
            records: HashMap::new(),
        };

        if restart || entries.is_empty() {
            for seed in seeds {
                inner.accept(seed)?;
            }
            info!("seeded frontier with {} urls", inner.pending());
        } else {
            let total = entries.len();
            let mut tbd = 0usize;
            for (hash, (url, completed)) in entries {
                inner.seen.insert(url.clone());
                if !completed && filter.is_valid(&url) {
                    inner.enqueue(&url);
                    tbd += 1;
                }
                inner.records.insert(hash, (url, completed));
            }
            info!(
                "found {} urls to be downloaded from {} total urls discovered",
                tbd, total
            );
        }

        Ok(Self {
            delay,
            inner: Mutex::new(inner),
        })
    }

    /// Add a discovered URL. Deduplicates against everything ever seen and
    /// persists the new entry before it becomes visible to any worker.
    /// Returns `true` when the URL was new.
    pub async fn add_url(&self, url: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        inner.accept(url)
    }

    /// Persist completion. An unknown URL is an invariant violation; it is
    /// logged loudly but still written, so a restart will not retry it.
    pub async fn mark_url_complete(&self, url: &str) -> Result<()> {
        let normalized = urls::normalize(url).unwrap_or_else(|_| url.to_string());
        let hash = urls::urlhash(&normalized);

        let mut inner = self.inner.lock().await;
        if !inner.seen.contains(&normalized) {
            error!("completed url {} was never added to the frontier", url);
            inner.seen.insert(normalized.clone());
        }
        inner.store.put(&hash, &normalized, true)?;
        inner.records.insert(hash, (normalized, true));
        Ok(())
    }

    /// Pop the next URL whose host has cooled down for at least the
    /// politeness delay.
    ///
    /// Returns `None` both when every non-empty host is still cooling down
    /// (caller retries after a short sleep) and when the frontier is empty
    /// (caller checks [`pending_count`](Self::pending_count) to tell the two
    /// apart).
    pub async fn get_tbd_url(&self) -> Option<String> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let now = Instant::now();

        for i in 0..inner.host_order.len() {
            let host = inner.host_order[i].clone();
            let ready = inner
                .last_access
                .get(&host)
                .map_or(true, |last| now.duration_since(*last) >= self.delay);
            if !ready {
                continue;
            }
            if let Some(queue) = inner.queues.get_mut(&host) {
                if let Some(url) = queue.pop_front() {
                    inner.last_access.insert(host, now);
                    return Some(url);
                }
            }
        }

        None
    }

    /// Number of URLs currently queued across all hosts.
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending()
    }

    /// (discovered, completed) totals over the lifetime of the store.
    pub async fn totals(&self) -> (usize, usize) {
        let inner = self.inner.lock().await;
        let completed = inner.records.values().filter(|(_, done)| *done).count();
        (inner.records.len(), completed)
    }

    /// Per-host `(host, completed, total)` rows for the shutdown summary,
    /// sorted by host name.
    pub async fn host_summary(&self) -> Vec<(String, usize, usize)> {
        let inner = self.inner.lock().await;
        let mut rows: HashMap<String, (usize, usize)> = HashMap::new();
        for (url, completed) in inner.records.values() {
            if let Some(host) = urls::host_of(url) {
                let row = rows.entry(host).or_insert((0, 0));
                row.1 += 1;
                if *completed {
                    row.0 += 1;
                }
            }
        }
        let mut out: Vec<(String, usize, usize)> = rows
            .into_iter()
            .map(|(host, (completed, total))| (host, completed, total))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stats::RejectionStats;
    use std::sync::Arc;

    fn test_filter() -> ContentFilter {
        ContentFilter::new(Arc::new(RejectionStats::new()))
    }

    fn open(dir: &Path, seeds: &[&str], delay_ms: u64, restart: bool) -> Frontier {
        let seeds: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();
        Frontier::new(
            &dir.join("frontier.save"),
            &seeds,
            Duration::from_millis(delay_ms),
            &test_filter(),
            restart,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_url_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let f = open(dir.path(), &[], 0, true);

        assert!(f.add_url("https://ics.uci.edu/a").await.unwrap());
        assert!(!f.add_url("https://ics.uci.edu/a").await.unwrap());
        // Same page, different spelling of host and a fragment.
        assert!(!f.add_url("https://ICS.uci.edu/a#top").await.unwrap());
        assert_eq!(f.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_frontier_returns_none_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let f = open(dir.path(), &[], 0, true);
        assert_eq!(f.pending_count().await, 0);
        assert!(f.get_tbd_url().await.is_none());
    }

    #[tokio::test]
    async fn test_politeness_gates_same_host_dequeues() {
        let dir = tempfile::tempdir().unwrap();
        let f = open(dir.path(), &[], 200, true);
        f.add_url("https://cs.uci.edu/1").await.unwrap();
        f.add_url("https://cs.uci.edu/2").await.unwrap();

        let first = f.get_tbd_url().await;
        assert!(first.is_some());
        // Host is cooling down; the queue is non-empty but nothing is ready.
        assert!(f.get_tbd_url().await.is_none());
        assert_eq!(f.pending_count().await, 1);

        tokio::time::sleep(Duration::from_millis(220)).await;
        assert!(f.get_tbd_url().await.is_some());
    }

    #[tokio::test]
    async fn test_distinct_hosts_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let f = open(dir.path(), &[], 60_000, true);
        f.add_url("https://cs.uci.edu/a").await.unwrap();
        f.add_url("https://stat.uci.edu/b").await.unwrap();

        assert!(f.get_tbd_url().await.is_some());
        assert!(f.get_tbd_url().await.is_some());
        assert!(f.get_tbd_url().await.is_none());
    }

    #[tokio::test]
    async fn test_same_host_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let f = open(dir.path(), &[], 0, true);
        for i in 0..4 {
            f.add_url(&format!("https://cs.uci.edu/{}", i)).await.unwrap();
        }
        for i in 0..4 {
            assert_eq!(
                f.get_tbd_url().await,
                Some(format!("https://cs.uci.edu/{}", i))
            );
        }
    }

    #[tokio::test]
    async fn test_restart_false_preserves_progress() {
        let dir = tempfile::tempdir().unwrap();
        let urls: Vec<String> = (0..10)
            .map(|i| format!("https://ics.uci.edu/page{}", i))
            .collect();

        {
            let f = open(dir.path(), &[], 0, true);
            for u in &urls {
                f.add_url(u).await.unwrap();
            }
            for u in urls.iter().take(3) {
                f.mark_url_complete(u).await.unwrap();
            }
        }

        let f = open(dir.path(), &["https://ics.uci.edu/seed"], 0, false);
        assert_eq!(f.pending_count().await, 7);

        let mut remaining = Vec::new();
        while let Some(u) = f.get_tbd_url().await {
            remaining.push(u);
        }
        for u in urls.iter().take(3) {
            assert!(!remaining.contains(u), "completed url re-enqueued: {}", u);
        }
        // The seed was not used: the store already had entries.
        assert!(!remaining.iter().any(|u| u.contains("seed")));
    }

    #[tokio::test]
    async fn test_restart_true_wipes_store_and_reseeds() {
        let dir = tempfile::tempdir().unwrap();
        {
            let f = open(dir.path(), &[], 0, true);
            for i in 0..5 {
                f.add_url(&format!("https://ics.uci.edu/old{}", i))
                    .await
                    .unwrap();
            }
        }

        let f = open(dir.path(), &["https://ics.uci.edu/fresh"], 0, true);
        assert_eq!(f.pending_count().await, 1);
        assert_eq!(
            f.get_tbd_url().await,
            Some("https://ics.uci.edu/fresh".to_string())
        );
    }

    #[tokio::test]
    async fn test_reload_drops_urls_that_no_longer_pass_admission() {
        let dir = tempfile::tempdir().unwrap();
        {
            let f = open(dir.path(), &[], 0, true);
            // The frontier itself does not filter; callers do. A blocked URL
            // can therefore be present in the store (e.g. an old seed).
            f.add_url("https://physics.uci.edu/x").await.unwrap();
            f.add_url("https://ics.uci.edu/ok").await.unwrap();
        }

        let f = open(dir.path(), &[], 0, false);
        assert_eq!(f.pending_count().await, 1);
        assert_eq!(
            f.get_tbd_url().await,
            Some("https://ics.uci.edu/ok".to_string())
        );
    }

    #[tokio::test]
    async fn test_mark_complete_on_unknown_url_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let f = open(dir.path(), &[], 0, true);
            f.mark_url_complete("https://ics.uci.edu/ghost").await.unwrap();
        }

        let f = open(dir.path(), &[], 0, false);
        let (discovered, completed) = f.totals().await;
        assert_eq!((discovered, completed), (1, 1));
        assert_eq!(f.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_totals_and_host_summary() {
        let dir = tempfile::tempdir().unwrap();
        let f = open(dir.path(), &[], 0, true);
        f.add_url("https://cs.uci.edu/a").await.unwrap();
        f.add_url("https://cs.uci.edu/b").await.unwrap();
        f.add_url("https://stat.uci.edu/c").await.unwrap();
        f.mark_url_complete("https://cs.uci.edu/a").await.unwrap();

        assert_eq!(f.totals().await, (3, 1));
        let summary = f.host_summary().await;
        assert_eq!(
            summary,
            vec![
                ("cs.uci.edu".to_string(), 1, 2),
                ("stat.uci.edu".to_string(), 0, 1),
            ]
        );
    }
}
