//! URL admission policy.
//!
//! `is_valid` is the single gate every discovered link passes before it may
//! enter the frontier. Checks run in a fixed order and short-circuit on the
//! first rejection; each rejection is recorded with a reason label so the
//! rejection report can explain where the crawl boundary actually bit.

pub mod patterns;
pub mod traps;

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::core::stats::RejectionStats;
use self::patterns::{PatternSet, ALLOWED_DOMAINS, ALLOWED_EXTENSIONS, BLOCKED_HOST_PREFIXES,
    INVALID_EXTENSIONS, MAX_URL_LENGTH};
use self::traps::TrapDetector;

/// Why a URL was refused admission. `label()` is the stable string used in
/// rejection reports and counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Malformed,
    InvalidScheme,
    InvalidDomain,
    BlockedDomain,
    UrlTooLong,
    CalendarTrap,
    KnownTrap,
    DynamicTrap,
    Extension(String),
    FormatParam,
    ActionEndpoint,
}

impl RejectReason {
    pub fn label(&self) -> String {
        match self {
            RejectReason::Malformed => "malformed_url".to_string(),
            RejectReason::InvalidScheme => "invalid_scheme".to_string(),
            RejectReason::InvalidDomain => "invalid_domain".to_string(),
            RejectReason::BlockedDomain => "blocked_domain".to_string(),
            RejectReason::UrlTooLong => "url_too_long".to_string(),
            RejectReason::CalendarTrap => "calendar_trap".to_string(),
            RejectReason::KnownTrap => "known_trap".to_string(),
            RejectReason::DynamicTrap => "url_trap".to_string(),
            RejectReason::Extension(ext) => format!("ext_{}", ext),
            RejectReason::FormatParam => "format_param".to_string(),
            RejectReason::ActionEndpoint => "action_endpoint".to_string(),
        }
    }
}

/// The admission filter: allow-list, deny-list, pattern tables, and the
/// stateful trap detector behind one `check` entry point.
pub struct ContentFilter {
    patterns: Arc<PatternSet>,
    traps: TrapDetector,
    stats: Arc<RejectionStats>,
}

impl ContentFilter {
    pub fn new(stats: Arc<RejectionStats>) -> Self {
        let patterns = Arc::new(PatternSet::compile());
        let traps = TrapDetector::new(Arc::clone(&patterns));
        Self {
            patterns,
            traps,
            stats,
        }
    }

    /// Predicate form of [`check`](Self::check); records the rejection reason
    /// (with up to five sample URLs per reason) as a side effect.
    pub fn is_valid(&self, url: &str) -> bool {
        match self.check(url) {
            Ok(()) => true,
            Err(reason) => {
                debug!("rejected {} ({})", url, reason.label());
                self.stats.record(&reason.label(), url);
                false
            }
        }
    }

    /// Run the full admission sequence and return the first failing check.
    ///
    /// The deny-list runs before the allow-list so sibling academic hosts
    /// such as `physics.uci.edu` are reported as `blocked_domain` rather
    /// than folding into the generic out-of-scope bucket.
    pub fn check(&self, url: &str) -> Result<(), RejectReason> {
        let parsed = Url::parse(url).map_err(|_| RejectReason::Malformed)?;

        match parsed.scheme() {
            "http" | "https" => {}
            _ => return Err(RejectReason::InvalidScheme),
        }

        let host = parsed
            .host_str()
            .ok_or(RejectReason::InvalidDomain)?
            .to_ascii_lowercase();

        if BLOCKED_HOST_PREFIXES.iter().any(|name| {
            let blocked = format!("{}.uci.edu", name);
            host == blocked || host.ends_with(&format!(".{}", blocked))
        }) {
            return Err(RejectReason::BlockedDomain);
        }

        if !ALLOWED_DOMAINS
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
        {
            return Err(RejectReason::InvalidDomain);
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(RejectReason::UrlTooLong);
        }

        let lower = url.to_ascii_lowercase();

        if self.patterns.calendar.is_match(&lower) {
            return Err(RejectReason::CalendarTrap);
        }

        if self.patterns.known_traps.is_match(&lower) {
            return Err(RejectReason::KnownTrap);
        }

        if self.traps.is_trap(&parsed, self.patterns.is_legitimate(&lower)) {
            return Err(RejectReason::DynamicTrap);
        }

        if let Some(ext) = path_extension(&parsed) {
            if INVALID_EXTENSIONS.contains(&ext.as_str())
                && !ALLOWED_EXTENSIONS.contains(&ext.as_str())
            {
                return Err(RejectReason::Extension(ext));
            }
        }

        if self.patterns.format_params.is_match(&lower) {
            return Err(RejectReason::FormatParam);
        }

        if self.patterns.action_endpoints.is_match(&lower) {
            return Err(RejectReason::ActionEndpoint);
        }

        Ok(())
    }
}

/// Extension of the last path segment, lowercased. URLs without a dot in the
/// final segment have no extension and pass the extension check.
fn path_extension(url: &Url) -> Option<String> {
    let last = url.path().rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
