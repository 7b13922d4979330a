//! Durable save file backing the frontier.
//!
//! Append-only JSON-lines log of `{hash, url, completed}` records, synced
//! after every write so a crash never loses an acknowledged mutation. The
//! latest record for a hash wins on load; when superseded records outnumber
//! live ones two to one the log is compacted into a fresh file on open.
//! Restart semantics are the contract; the format itself is internal.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreRecord {
    hash: String,
    url: String,
    completed: bool,
}

/// The durable store plus an exclusive lock on the save file, so two crawler
/// processes cannot interleave writes into the same log.
pub struct FrontierStore {
    path: PathBuf,
    file: File,
}

impl FrontierStore {
    /// Open `path` (creating it when absent) and load every surviving entry,
    /// keyed by urlhash. Torn trailing records from a crash are skipped with
    /// a warning rather than failing the whole load.
    pub fn open(path: &Path) -> Result<(Self, HashMap<String, (String, bool)>)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open save file {}", path.display()))?;
        file.try_lock_exclusive().with_context(|| {
            format!(
                "save file {} is locked by another crawler process",
                path.display()
            )
        })?;

        let (entries, total_records) = Self::read_entries(path)?;

        let mut store = Self {
            path: path.to_path_buf(),
            file,
        };

        if total_records > entries.len().saturating_mul(2) {
            store = store.compact(&entries)?;
        }

        Ok((store, entries))
    }

    fn read_entries(path: &Path) -> Result<(HashMap<String, (String, bool)>, usize)> {
        let mut entries = HashMap::new();
        let mut total = 0usize;

        let reader = BufReader::new(
            File::open(path).with_context(|| format!("cannot read {}", path.display()))?,
        );
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoreRecord>(&line) {
                Ok(record) => {
                    total += 1;
                    entries.insert(record.hash, (record.url, record.completed));
                }
                Err(e) => {
                    // Most likely a torn tail write from a crash mid-append.
                    warn!("skipping unreadable save record: {}", e);
                }
            }
        }

        Ok((entries, total))
    }

    /// Rewrite the log with only the latest record per hash, then swap it in
    /// atomically and move the lock to the new file.
    fn compact(self, entries: &HashMap<String, (String, bool)>) -> Result<Self> {
        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = File::create(&tmp_path)
                .with_context(|| format!("cannot create {}", tmp_path.display()))?;
            for (hash, (url, completed)) in entries {
                let record = StoreRecord {
                    hash: hash.clone(),
                    url: url.clone(),
                    completed: *completed,
                };
                serde_json::to_writer(&mut tmp, &record)?;
                tmp.write_all(b"\n")?;
            }
            tmp.sync_data()?;
        }
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("cannot swap compacted save file into {}", self.path.display()))?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        file.try_lock_exclusive()
            .context("cannot re-lock compacted save file")?;

        info!(
            "compacted save file {} down to {} entries",
            self.path.display(),
            entries.len()
        );

        // The old handle (and its lock on the unlinked inode) drops here.
        Ok(Self {
            path: self.path,
            file,
        })
    }

    /// Append one mutation and sync it to disk before returning.
    pub fn put(&mut self, hash: &str, url: &str, completed: bool) -> Result<()> {
        let record = StoreRecord {
            hash: hash.to_string(),
            url: url.to_string(),
            completed,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_roundtrip_and_latest_record_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.save");

        {
            let (mut store, entries) = FrontierStore::open(&path).unwrap();
            assert!(entries.is_empty());
            store.put("h1", "https://ics.uci.edu/a", false).unwrap();
            store.put("h2", "https://ics.uci.edu/b", false).unwrap();
            store.put("h1", "https://ics.uci.edu/a", true).unwrap();
        }

        let (_store, entries) = FrontierStore::open(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries.get("h1"),
            Some(&("https://ics.uci.edu/a".to_string(), true))
        );
        assert_eq!(
            entries.get("h2"),
            Some(&("https://ics.uci.edu/b".to_string(), false))
        );
    }

    #[test]
    fn test_corrupt_tail_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.save");

        {
            let (mut store, _) = FrontierStore::open(&path).unwrap();
            store.put("h1", "https://ics.uci.edu/a", false).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"{\"hash\":\"h2\",\"url\":\"https://i").unwrap();
        }

        let (_store, entries) = FrontierStore::open(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("h1"));
    }

    #[test]
    fn test_compaction_preserves_latest_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.save");

        {
            let (mut store, _) = FrontierStore::open(&path).unwrap();
            // One live entry, many superseded records.
            for _ in 0..10 {
                store.put("h1", "https://ics.uci.edu/a", false).unwrap();
            }
            store.put("h1", "https://ics.uci.edu/a", true).unwrap();
        }

        let before = std::fs::metadata(&path).unwrap().len();
        let (_store, entries) = FrontierStore::open(&path).unwrap();
        let after = std::fs::metadata(&path).unwrap().len();

        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries.get("h1"),
            Some(&("https://ics.uci.edu/a".to_string(), true))
        );
        assert!(after < before, "log should shrink: {} -> {}", before, after);
    }

    #[test]
    fn test_writes_after_compaction_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontier.save");

        {
            let (mut store, _) = FrontierStore::open(&path).unwrap();
            for _ in 0..10 {
                store.put("h1", "https://ics.uci.edu/a", false).unwrap();
            }
        }
        {
            // This open compacts; the follow-up write must land in the new file.
            let (mut store, _) = FrontierStore::open(&path).unwrap();
            store.put("h2", "https://ics.uci.edu/b", false).unwrap();
        }

        let (_store, entries) = FrontierStore::open(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
