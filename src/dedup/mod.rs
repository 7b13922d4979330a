//! Two-level duplicate detection over extracted page text.
//!
//! Level one is exact equality via MD5. Level two is a near-duplicate scan:
//! the page's SimHash is compared against a bounded ring of the most recent
//! fingerprints, so template-heavy sites are caught without the memory of a
//! full pairwise index. Duplicates more than `SIMHASH_WINDOW` unique pages
//! apart go undetected.

pub mod simhash;

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tracing::debug;

/// Ring capacity: how many recent fingerprints the near-duplicate scan sees.
pub const SIMHASH_WINDOW: usize = 1000;

/// Hamming distance at or below which two pages count as near-duplicates.
pub const SIMHASH_THRESHOLD: u32 = 10;

/// Minimum meaningful text length; anything shorter is noise, not content.
const MIN_TEXT_LEN: usize = 100;

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// First sighting; the text was registered in both levels.
    Unique,
    /// Below the minimum text length; not registered.
    TooShort,
    /// Byte-identical extracted text was seen before.
    Exact,
    /// A fingerprint within the threshold is still in the ring.
    Similar { distance: u32, matched_url: String },
}

impl Verdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Verdict::Exact | Verdict::Similar { .. })
    }

    /// Stable label used in duplicate reports and the processing log.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Unique => "unique",
            Verdict::TooShort => "too_short",
            Verdict::Exact => "exact",
            Verdict::Similar { .. } => "similar",
        }
    }
}

struct DetectorState {
    exact_hashes: HashSet<String>,
    ring: VecDeque<(u64, String)>,
}

/// Shared duplicate detector. Hashing happens outside the mutex; the critical
/// section is the set lookup plus an O(window) ring scan.
pub struct DuplicateDetector {
    window: usize,
    threshold: u32,
    state: Mutex<DetectorState>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::with_window(SIMHASH_WINDOW, SIMHASH_THRESHOLD)
    }

    pub fn with_window(window: usize, threshold: u32) -> Self {
        Self {
            window,
            threshold,
            state: Mutex::new(DetectorState {
                exact_hashes: HashSet::new(),
                ring: VecDeque::with_capacity(window),
            }),
        }
    }

    /// Classify `text` (already whitespace-normalized) for the page at `url`.
    ///
    /// Unique text is registered in the exact set and appended to the ring,
    /// evicting the oldest fingerprint when the ring is full. Duplicate text
    /// is *not* re-registered, so a burst of copies all match the original.
    pub fn check(&self, url: &str, text: &str) -> Verdict {
        if text.trim().len() < MIN_TEXT_LEN {
            return Verdict::TooShort;
        }

        let content_hash = format!("{:x}", md5::compute(text.as_bytes()));
        let fingerprint = simhash::simhash64(text);

        let mut state = self.state.lock().expect("duplicate detector mutex poisoned");

        if state.exact_hashes.contains(&content_hash) {
            return Verdict::Exact;
        }
        state.exact_hashes.insert(content_hash);

        for (seen, seen_url) in state.ring.iter() {
            let distance = simhash::hamming(fingerprint, *seen);
            if distance <= self.threshold {
                debug!(
                    "near-duplicate: {} within {} bits of {}",
                    url, distance, seen_url
                );
                return Verdict::Similar {
                    distance,
                    matched_url: seen_url.clone(),
                };
            }
        }

        if state.ring.len() == self.window {
            state.ring.pop_front();
        }
        state.ring.push_back((fingerprint, url.to_string()));

        Verdict::Unique
    }

    /// Exact hex digest of `text`, as stored in page records.
    pub fn content_hash(text: &str) -> String {
        format!("{:x}", md5::compute(text.as_bytes()))
    }

    #[cfg(test)]
    fn ring_len(&self) -> usize {
        self.state.lock().unwrap().ring.len()
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}
