//! The worker loop: dequeue, fetch, process, enqueue outlinks, mark
//! complete.
//!
//! Workers are plain tokio tasks sharing one [`CrawlContext`]. A worker only
//! exits when the frontier has been empty for a sustained idle window, or
//! when a stop was requested; either way the URL in flight is always marked
//! complete first, so nothing is lost across a shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::CrawlContext;

/// Consecutive empty polls before the idle clock is consulted.
const MAX_IDLE_STREAK: u32 = 100;
/// Wall-clock idle time that, together with the streak, triggers the
/// empty-frontier check.
const MAX_IDLE_TIME: Duration = Duration::from_secs(30);
/// Sleep between empty polls; politeness cooldowns resolve on this scale.
const POLL_SLEEP: Duration = Duration::from_millis(100);
/// Sleep after each processed URL to damp frontier lock contention.
const CONTENTION_SLEEP: Duration = Duration::from_millis(50);
/// Longer sleep when the frontier is non-empty but nothing is ready.
const STUCK_SLEEP: Duration = Duration::from_secs(1);

pub struct Worker {
    id: usize,
    ctx: Arc<CrawlContext>,
}

impl Worker {
    pub fn spawn(id: usize, ctx: Arc<CrawlContext>) -> JoinHandle<()> {
        tokio::spawn(async move { Worker { id, ctx }.run().await })
    }

    async fn run(self) {
        info!("worker-{} started", self.id);

        let mut idle_streak: u32 = 0;
        let mut last_progress = Instant::now();

        loop {
            let url = match self.ctx.frontier.get_tbd_url().await {
                Some(url) => url,
                None => {
                    if self.ctx.stop_requested() {
                        break;
                    }

                    idle_streak += 1;
                    if idle_streak >= MAX_IDLE_STREAK
                        && last_progress.elapsed() > MAX_IDLE_TIME
                    {
                        if self.ctx.frontier.pending_count().await == 0 {
                            info!("worker-{}: frontier is empty, stopping", self.id);
                            break;
                        }
                        // URLs exist but every host is cooling down; back off
                        // harder and keep waiting.
                        idle_streak = 0;
                        tokio::time::sleep(STUCK_SLEEP).await;
                        continue;
                    }

                    tokio::time::sleep(POLL_SLEEP).await;
                    continue;
                }
            };

            idle_streak = 0;
            last_progress = Instant::now();

            self.process_one(&url).await;

            if self.ctx.stop_requested() {
                info!("worker-{}: stop requested, exiting", self.id);
                break;
            }

            tokio::time::sleep(CONTENTION_SLEEP).await;
        }

        info!("worker-{} stopped", self.id);
    }

    /// Fetch and process one URL. Every failure path still marks the URL
    /// complete; a transient error must not put the URL back into rotation
    /// forever.
    async fn process_one(&self, url: &str) {
        let links = match self.ctx.fetcher.fetch(url).await {
            Ok(resp) => {
                info!("worker-{}: downloaded {} <{}>", self.id, url, resp.status);
                self.ctx.scraper.process(url, &resp)
            }
            Err(e) => {
                warn!("worker-{}: fetch failed for {}: {:#}", self.id, url, e);
                crate::core::stats::CrawlStats::bump(&self.ctx.stats.fetch_failures);
                Vec::new()
            }
        };

        for link in &links {
            if let Err(e) = self.ctx.frontier.add_url(link).await {
                error!("worker-{}: failed to add {}: {:#}", self.id, link, e);
            }
        }

        if let Err(e) = self.ctx.frontier.mark_url_complete(url).await {
            error!(
                "worker-{}: failed to mark {} complete: {:#}",
                self.id, url, e
            );
        }
    }
}
