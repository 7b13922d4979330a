//! On-disk page store.
//!
//! One JSON file per saved page, named by the MD5 of the page URL. Records
//! keep the first thousand words so post-crawl analytics (word frequencies,
//! longest page) can run without re-fetching anything.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::urls;

/// How many leading words of the extracted text are persisted.
const STORED_WORD_LIMIT: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub word_count: usize,
    pub words: Vec<String>,
    pub content_hash: String,
}

pub struct PageStore {
    dir: PathBuf,
}

impl PageStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create page store at {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn record_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urls::urlhash(url)))
    }

    /// Persist one page. Overwrites any previous record for the same URL.
    pub fn save(&self, url: &str, text: &str, content_hash: &str) -> Result<()> {
        let all_words: Vec<&str> = text.split_whitespace().collect();
        let record = PageRecord {
            url: url.to_string(),
            word_count: all_words.len(),
            words: all_words
                .iter()
                .take(STORED_WORD_LIMIT)
                .map(|w| w.to_string())
                .collect(),
            content_hash: content_hash.to_string(),
        };

        let path = self.record_path(url);
        let file = File::create(&path)
            .with_context(|| format!("cannot create page record {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &record)?;
        Ok(())
    }

    pub fn load(&self, url: &str) -> Result<Option<PageRecord>> {
        let path = self.record_path(url);
        if !path.exists() {
            return Ok(None);
        }
        let file =
            File::open(&path).with_context(|| format!("cannot open {}", path.display()))?;
        Ok(Some(serde_json::from_reader(file)?))
    }

    /// Number of saved pages, for progress reporting.
    pub fn count(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }
}
