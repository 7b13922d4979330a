//! Append-only JSON-lines processing log.
//!
//! One event per line, flushed as written, so the log survives a crash up to
//! the last processed page and stays greppable / `jq`-able while the crawl
//! runs.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Serialize)]
struct LogEvent<'a> {
    ts: String,
    event: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    detail: &'a str,
}

pub struct ProcessingLog {
    file: Mutex<BufWriter<File>>,
}

impl ProcessingLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open processing log {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Record one event. Logging failures are swallowed; the log is an
    /// observational artifact and must never take a worker down.
    pub fn event(&self, event: &str, url: &str, detail: &str) {
        let record = LogEvent {
            ts: chrono::Utc::now().to_rfc3339(),
            event,
            url,
            detail,
        };
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        let mut file = self.file.lock().expect("processing log mutex poisoned");
        let _ = writeln!(file, "{}", line);
        let _ = file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processing.jsonl");
        let log = ProcessingLog::open(&path).unwrap();

        log.event("fetched", "https://ics.uci.edu/a", "status=200");
        log.event("saved", "https://ics.uci.edu/a", "");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "fetched");
        assert_eq!(first["url"], "https://ics.uci.edu/a");
        assert_eq!(first["detail"], "status=200");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second.get("detail").is_none());
    }
}
