//! Dynamic trap detection over observed URL shapes.
//!
//! Calendars, filter grids, and unbounded pagination generate effectively
//! infinite URL spaces with negligible content. The detector tracks how often
//! each *shape* of URL recurs (digits collapsed to `N`, dates to `DATE`,
//! query keys sorted) and starts rejecting once a shape repeats past its
//! threshold. Counters are process-local on purpose: dangerous shapes are
//! rediscovered within a few hundred fetches after a restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;

use super::patterns::PatternSet;

/// Maximum path depth before a URL is considered machine-generated.
const MAX_PATH_DEPTH: usize = 12;
const MAX_PATH_DEPTH_LEGITIMATE: usize = 15;

/// A path segment repeating more often than this within one URL is a cycle.
const MAX_SEGMENT_REPEAT: usize = 3;

/// How many times one URL shape may recur before rejection.
const PATTERN_LIMIT: u32 = 75;
const PATTERN_LIMIT_LEGITIMATE: u32 = 150;

/// Upper bound on `page= / p= / offset= / start=` values.
const MAX_PAGINATION_VALUE: i64 = 200;

/// Upper bound on raw query-string length.
const MAX_QUERY_LENGTH: usize = 200;

/// Distinct filter-style keys in one query that signal a filter-combination
/// explosion.
const FILTER_COMBO_LIMIT: usize = 4;
const FILTER_KEYS: [&str; 5] = ["sort", "order", "filter", "view", "display"];

/// How many times the exact same host+path may recur.
const PATH_REPEAT_LIMIT: u32 = 15;
const PATH_REPEAT_LIMIT_LEGITIMATE: u32 = 25;

const PAGINATION_KEYS: [&str; 4] = ["page", "p", "offset", "start"];

#[derive(Default)]
struct TrapState {
    /// URL shape -> times observed.
    url_patterns: HashMap<String, u32>,
    /// host -> path -> times observed.
    host_paths: HashMap<String, HashMap<String, u32>>,
}

/// Stateful trap heuristics shared by every worker through one mutex.
pub struct TrapDetector {
    patterns: Arc<PatternSet>,
    state: Mutex<TrapState>,
}

impl TrapDetector {
    pub fn new(patterns: Arc<PatternSet>) -> Self {
        Self {
            patterns,
            state: Mutex::new(TrapState::default()),
        }
    }

    /// Run every heuristic against `url`. Returns `true` when the URL should
    /// be rejected as a trap. `legitimate` relaxes depth, repetition, and
    /// frequency thresholds for content areas like wikis and course listings.
    pub fn is_trap(&self, url: &Url, legitimate: bool) -> bool {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let max_depth = if legitimate {
            MAX_PATH_DEPTH_LEGITIMATE
        } else {
            MAX_PATH_DEPTH
        };
        if segments.len() > max_depth {
            return true;
        }

        if !legitimate && has_repeated_segment(&segments) {
            return true;
        }

        let pattern = self.pattern_key(url, legitimate);
        let pattern_limit = if legitimate {
            PATTERN_LIMIT_LEGITIMATE
        } else {
            PATTERN_LIMIT
        };
        let path_limit = if legitimate {
            PATH_REPEAT_LIMIT_LEGITIMATE
        } else {
            PATH_REPEAT_LIMIT
        };

        let mut state = self.state.lock().expect("trap detector mutex poisoned");

        let seen = state.url_patterns.entry(pattern).or_insert(0);
        *seen += 1;
        if *seen > pattern_limit {
            return true;
        }

        if pagination_out_of_bounds(url) {
            return true;
        }

        let query = url.query().unwrap_or("");
        if query.len() > MAX_QUERY_LENGTH {
            return true;
        }

        if filter_combo_count(url) >= FILTER_COMBO_LIMIT {
            return true;
        }

        let host = url.host_str().unwrap_or("unknown").to_ascii_lowercase();
        let count = state
            .host_paths
            .entry(host)
            .or_default()
            .entry(url.path().to_string())
            .or_insert(0);
        *count += 1;
        *count > path_limit
    }

    /// Shape key for frequency counting: host + path with digit runs
    /// collapsed to `N` and dates to `DATE`, plus the sorted query keys.
    /// Legitimate areas drop the query keys so archives with varied
    /// parameters are not over-counted.
    fn pattern_key(&self, url: &Url, legitimate: bool) -> String {
        let host = url.host_str().unwrap_or("unknown").to_ascii_lowercase();
        let path = self.patterns.date_segment.replace_all(url.path(), "DATE");
        let path = self.patterns.digit_run.replace_all(&path, "N");

        if legitimate {
            return format!("{}{}", host, path);
        }

        let mut keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        keys.sort();
        keys.dedup();
        format!("{}{}?{}", host, path, keys.join(","))
    }
}

fn has_repeated_segment(segments: &[&str]) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for seg in segments {
        let c = counts.entry(seg).or_insert(0);
        *c += 1;
        if *c > MAX_SEGMENT_REPEAT {
            return true;
        }
    }
    false
}

fn pagination_out_of_bounds(url: &Url) -> bool {
    url.query_pairs().any(|(k, v)| {
        PAGINATION_KEYS.contains(&k.as_ref())
            && v.parse::<i64>()
                .map(|n| n > MAX_PAGINATION_VALUE)
                .unwrap_or(false)
    })
}

fn filter_combo_count(url: &Url) -> usize {
    let mut present: Vec<&str> = Vec::new();
    for (k, _) in url.query_pairs() {
        if let Some(key) = FILTER_KEYS.iter().find(|f| **f == k.as_ref()) {
            if !present.contains(key) {
                present.push(key);
            }
        }
    }
    present.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> TrapDetector {
        TrapDetector::new(Arc::new(PatternSet::compile()))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_pagination_beyond_bound_is_trap() {
        let d = detector();
        assert!(d.is_trap(&url("https://stat.uci.edu/news?page=250"), false));
        assert!(d.is_trap(&url("https://stat.uci.edu/news?offset=1000"), false));
        assert!(!d.is_trap(&url("https://stat.uci.edu/news?page=3"), false));
        // Non-numeric pagination values are not bounded.
        assert!(!d.is_trap(&url("https://stat.uci.edu/news?page=abc"), false));
    }

    #[test]
    fn test_pattern_frequency_rejects_on_76th_shape_hit() {
        let d = detector();
        for i in 0..75 {
            let u = url(&format!("https://stat.uci.edu/x/{}?", i));
            assert!(!d.is_trap(&u, false), "hit {} should pass", i);
        }
        assert!(d.is_trap(&url("https://stat.uci.edu/x/9999?"), false));
    }

    #[test]
    fn test_legitimate_pattern_limit_is_higher() {
        let d = detector();
        for i in 0..150 {
            let u = url(&format!("https://ics.uci.edu/wiki/page{}", i));
            assert!(!d.is_trap(&u, true), "hit {} should pass", i);
        }
        assert!(d.is_trap(&url("https://ics.uci.edu/wiki/page9999"), true));
    }

    #[test]
    fn test_excessive_depth_is_trap() {
        let d = detector();
        let deep = format!("https://ics.uci.edu/{}", vec!["a"; 13].join("/"));
        // 13 segments of "a" also trip segment repetition; use distinct names.
        let segs: Vec<String> = (0..13).map(|i| format!("s{}", i)).collect();
        let deep_distinct = format!("https://ics.uci.edu/{}", segs.join("/"));
        assert!(d.is_trap(&url(&deep), false));
        assert!(d.is_trap(&url(&deep_distinct), false));
        let ok = format!("https://ics.uci.edu/{}", segs[..10].join("/"));
        assert!(!d.is_trap(&url(&ok), false));
    }

    #[test]
    fn test_segment_repetition_is_trap_unless_legitimate() {
        let d = detector();
        let u = url("https://ics.uci.edu/a/b/a/c/a/d/a");
        assert!(d.is_trap(&u, false));
        let v = url("https://ics.uci.edu/wiki/a/b/a/c/a/d/a");
        assert!(!d.is_trap(&v, true));
    }

    #[test]
    fn test_filter_combo_explosion_is_trap() {
        let d = detector();
        let u = url("https://ics.uci.edu/list?sort=asc&order=name&filter=x&view=grid");
        assert!(d.is_trap(&u, false));
        let v = url("https://ics.uci.edu/list?sort=asc&order=name");
        assert!(!d.is_trap(&v, false));
    }

    #[test]
    fn test_long_query_is_trap() {
        let d = detector();
        let long = format!("https://ics.uci.edu/page?q={}", "x".repeat(201));
        assert!(d.is_trap(&url(&long), false));
    }

    #[test]
    fn test_same_path_repetition_is_trap() {
        let d = detector();
        // Same path, varying query: each hit shares host+path but has a
        // distinct shape, so only the path counter accumulates.
        for i in 0..15 {
            let u = url(&format!("https://ics.uci.edu/item?id{}={}", i, i));
            assert!(!d.is_trap(&u, false), "hit {} should pass", i);
        }
        assert!(d.is_trap(&url("https://ics.uci.edu/item?zz=1"), false));
    }

    #[test]
    fn test_date_and_digit_shapes_collapse_together() {
        let d = detector();
        // Dated archive pages collapse onto one shape.
        for day in 1..=75 {
            let u = url(&format!("https://ics.uci.edu/news/2024-01-{:02}", day));
            assert!(!d.is_trap(&u, false), "day {} unexpectedly trapped", day);
        }
        assert!(d.is_trap(&url("https://ics.uci.edu/news/2023-12-31"), false));
    }
}
