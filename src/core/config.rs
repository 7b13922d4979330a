//! Crawl configuration — `scopecrawl.json` loader with env-var fallback.
//!
//! Every field is optional in the file; each resolver falls back to an
//! environment variable and then to a built-in default, so a bare checkout
//! crawls the standard seed set with sane politeness.

use std::path::{Path, PathBuf};

/// Top-level config loaded from `scopecrawl.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CrawlConfig {
    /// URLs added on a fresh start (or `--restart`). Defaults to the four
    /// allow-listed site roots.
    pub seed_urls: Option<Vec<String>>,
    /// Path of the durable frontier store. Default: `<data_dir>/frontier.save`.
    pub save_file: Option<String>,
    /// Per-host politeness delay in seconds. Fractional values allowed.
    pub time_delay: Option<f64>,
    /// Optional caching fetch proxy; when set, all requests route through it.
    pub cache_server: Option<String>,
    /// Number of concurrent workers.
    pub workers: Option<usize>,
    /// Directory for the save file, page store, and reports.
    pub data_dir: Option<String>,
}

const DEFAULT_SEEDS: [&str; 4] = [
    "https://www.ics.uci.edu",
    "https://www.cs.uci.edu",
    "https://www.informatics.uci.edu",
    "https://www.stat.uci.edu",
];

const DEFAULT_TIME_DELAY_SECS: f64 = 0.5;
const DEFAULT_WORKERS: usize = 8;

impl CrawlConfig {
    /// Seeds: JSON field → `SCOPECRAWL_SEEDS` (comma-separated) → defaults.
    pub fn resolve_seed_urls(&self) -> Vec<String> {
        if let Some(seeds) = &self.seed_urls {
            return seeds.clone();
        }
        if let Ok(v) = std::env::var("SCOPECRAWL_SEEDS") {
            let seeds: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !seeds.is_empty() {
                return seeds;
            }
        }
        DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect()
    }

    /// Data directory: JSON field → `SCOPECRAWL_DATA_DIR` → `~/.scopecrawl`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        if let Ok(v) = std::env::var("SCOPECRAWL_DATA_DIR") {
            if !v.trim().is_empty() {
                return PathBuf::from(v);
            }
        }
        dirs::home_dir()
            .map(|home| home.join(".scopecrawl"))
            .unwrap_or_else(|| PathBuf::from(".scopecrawl"))
    }

    /// Save file: JSON field → `<data_dir>/frontier.save`.
    pub fn resolve_save_file(&self, data_dir: &Path) -> PathBuf {
        if let Some(path) = &self.save_file {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        data_dir.join("frontier.save")
    }

    /// Politeness delay: JSON field → `SCOPECRAWL_TIME_DELAY` → 0.5 s.
    /// Negative values are clamped to zero.
    pub fn resolve_time_delay(&self) -> std::time::Duration {
        let secs = self
            .time_delay
            .or_else(|| {
                std::env::var("SCOPECRAWL_TIME_DELAY")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_TIME_DELAY_SECS);
        std::time::Duration::from_secs_f64(secs.max(0.0))
    }

    /// Cache server: JSON field → `SCOPECRAWL_CACHE_SERVER` → none (direct).
    pub fn resolve_cache_server(&self) -> Option<String> {
        if let Some(c) = &self.cache_server {
            let c = c.trim();
            if !c.is_empty() {
                return Some(c.to_string());
            }
            // An explicit empty string means "direct", overriding the env.
            return None;
        }
        std::env::var("SCOPECRAWL_CACHE_SERVER")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Worker count: JSON field → `SCOPECRAWL_WORKERS` → 8. At least one.
    pub fn resolve_workers(&self) -> usize {
        self.workers
            .or_else(|| {
                std::env::var("SCOPECRAWL_WORKERS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_WORKERS)
            .max(1)
    }
}

/// Load `scopecrawl.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `SCOPECRAWL_CONFIG` env var path
/// 2. `./scopecrawl.json`
/// 3. `../scopecrawl.json`
///
/// Missing file → defaults (env-var fallbacks still apply per field).
/// Parse error → warn and use defaults.
pub fn load_crawl_config() -> CrawlConfig {
    let mut candidates = vec![
        PathBuf::from("scopecrawl.json"),
        PathBuf::from("../scopecrawl.json"),
    ];
    if let Ok(env_path) = std::env::var("SCOPECRAWL_CONFIG") {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<CrawlConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("scopecrawl.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "scopecrawl.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return CrawlConfig::default();
                }
            },
            Err(_) => continue,
        }
    }

    CrawlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.resolve_seed_urls().len(), 4);
        assert_eq!(
            cfg.resolve_time_delay(),
            std::time::Duration::from_millis(500)
        );
        assert_eq!(cfg.resolve_workers(), 8);
    }

    #[test]
    fn test_json_fields_win() {
        let cfg: CrawlConfig = serde_json::from_str(
            r#"{
                "seed_urls": ["https://ics.uci.edu/start"],
                "time_delay": 1.25,
                "workers": 3,
                "cache_server": "http://cache:9000",
                "data_dir": "/tmp/crawl"
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.resolve_seed_urls(), vec!["https://ics.uci.edu/start"]);
        assert_eq!(
            cfg.resolve_time_delay(),
            std::time::Duration::from_millis(1250)
        );
        assert_eq!(cfg.resolve_workers(), 3);
        assert_eq!(
            cfg.resolve_cache_server(),
            Some("http://cache:9000".to_string())
        );
        let data_dir = cfg.resolve_data_dir();
        assert_eq!(data_dir, PathBuf::from("/tmp/crawl"));
        assert_eq!(
            cfg.resolve_save_file(&data_dir),
            PathBuf::from("/tmp/crawl/frontier.save")
        );
    }

    #[test]
    fn test_worker_floor_and_delay_clamp() {
        let cfg: CrawlConfig =
            serde_json::from_str(r#"{"workers": 0, "time_delay": -2.0}"#).unwrap();
        assert_eq!(cfg.resolve_workers(), 1);
        assert_eq!(cfg.resolve_time_delay(), std::time::Duration::ZERO);
    }
}
