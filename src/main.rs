use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use scopecrawl::{config, CrawlContext, Worker};

fn restart_requested() -> bool {
    std::env::args().any(|a| a == "--restart")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let restart = restart_requested();
    info!(
        "starting scopecrawl v{}{}",
        env!("CARGO_PKG_VERSION"),
        if restart { " (restart)" } else { "" }
    );

    let cfg = config::load_crawl_config();
    let ctx = Arc::new(CrawlContext::new(&cfg, restart)?);

    // Periodic progress line for anyone tailing the logs.
    let monitor_ctx = Arc::clone(&ctx);
    let monitor = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        ticker.tick().await; // first tick is immediate; skip it
        loop {
            ticker.tick().await;
            if monitor_ctx.stop_requested() {
                break;
            }
            let (discovered, completed) = monitor_ctx.frontier.totals().await;
            let pending = monitor_ctx.frontier.pending_count().await;
            info!(
                "progress: {}/{} urls completed, {} queued, {}",
                completed,
                discovered,
                pending,
                monitor_ctx.stats.progress_line()
            );
        }
    });

    // Translate SIGINT/SIGTERM into a stop request; workers finish their
    // current URL and exit cleanly.
    let signal_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("shutdown signal received, asking workers to stop");
        signal_ctx.request_stop();
    });

    let workers: Vec<_> = (0..ctx.worker_count)
        .map(|id| Worker::spawn(id, Arc::clone(&ctx)))
        .collect();

    for (id, handle) in workers.into_iter().enumerate() {
        if let Err(e) = handle.await {
            warn!("worker-{} task failed: {}", id, e);
        }
    }

    ctx.request_stop();
    monitor.abort();

    ctx.write_reports().await?;
    let (discovered, completed) = ctx.frontier.totals().await;
    info!(
        "crawl finished: {}/{} urls completed, {} pages saved, reports in {}",
        completed,
        discovered,
        ctx.scraper.saved_page_count(),
        ctx.data_dir.display()
    );

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
