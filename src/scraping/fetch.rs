//! Fetcher capability interface.
//!
//! The crawl core never talks HTTP directly; it goes through [`Fetcher`] so
//! tests can script responses and deployments can swap transports. The
//! production implementation is a thin `reqwest` client that optionally
//! routes through a caching proxy, which is also where robots.txt policy and
//! rate shaping beyond per-host politeness live.

use anyhow::{Context, Result};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::debug;

/// Status plus raw body bytes. The body may be empty; the pipeline treats
/// anything other than a 200 with a usable body as zero outlinks.
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("scopecrawl/", env!("CARGO_PKG_VERSION"));

/// Direct (or cache-routed) HTTP fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    cache_server: Option<String>,
}

impl HttpFetcher {
    /// Build the shared client. Timeouts are tunable through
    /// `HTTP_TIMEOUT_SECS` / `HTTP_CONNECT_TIMEOUT_SECS`.
    pub fn new(cache_server: Option<String>) -> Result<Self> {
        let timeout = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let connect_timeout = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .connect_timeout(std::time::Duration::from_secs(connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            cache_server,
        })
    }

    /// The URL actually requested: either the target itself or the cache
    /// server's fetch endpoint with the target passed as a query parameter.
    fn request_url(&self, url: &str) -> String {
        match &self.cache_server {
            Some(cache) => format!(
                "{}/fetch?url={}",
                cache.trim_end_matches('/'),
                utf8_percent_encode(url, NON_ALPHANUMERIC)
            ),
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let target = self.request_url(url);
        debug!("fetching {}", target);

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .with_context(|| format!("request failed for {}", url))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read body for {}", url))?
            .to_vec();

        Ok(FetchedPage { status, body })
    }
}
