//! Compiled URL pattern tables for the admission filter.
//!
//! All patterns match as substrings against the *lowercased* URL string, so
//! none of them need `(?i)`. Compiled once at filter construction and shared
//! read-only afterwards.

use regex::{Regex, RegexSet};

/// Hostnames the crawl is allowed to touch (exact match or subdomain).
pub const ALLOWED_DOMAINS: [&str; 4] = [
    "ics.uci.edu",
    "cs.uci.edu",
    "informatics.uci.edu",
    "stat.uci.edu",
];

/// Sibling academic subdomains explicitly kept out of the crawl even though
/// some are technically subdomains of an allowed zone.
pub const BLOCKED_HOST_PREFIXES: [&str; 9] = [
    "physics", "economics", "chem", "bio", "math", "engineering", "cecs", "eecs", "nacs",
];

/// Extensions that never carry crawlable HTML (media, archives, binaries,
/// datasets, office formats).
pub const INVALID_EXTENSIONS: [&str; 65] = [
    "css", "js", "bmp", "gif", "jpe", "jpeg", "jpg", "ico", "png", "tif", "tiff", "mid", "mp2",
    "mp3", "mp4", "wav", "avi", "mov", "mpeg", "ram", "m4v", "mkv", "ogg", "ogv", "pdf", "ps",
    "eps", "tex", "ppt", "pptx", "doc", "docx", "xls", "xlsx", "names", "data", "dat", "exe",
    "bz2", "tar", "msi", "bin", "7z", "psd", "dmg", "iso", "epub", "dll", "cnf", "tgz", "sha1",
    "thmx", "mso", "arff", "rtf", "jar", "csv", "rm", "smil", "wmv", "swf", "wma", "zip", "rar",
    "gz",
];

/// Extensions that *do* carry pages, overriding the invalid set.
pub const ALLOWED_EXTENSIONS: [&str; 8] = [
    "html", "htm", "php", "asp", "aspx", "jsp", "shtml", "xhtml",
];

pub const MAX_URL_LENGTH: usize = 600;

/// Pre-compiled regex tables used by `ContentFilter` and `TrapDetector`.
pub struct PatternSet {
    /// Calendar / event / date-driven URL spaces.
    pub calendar: RegexSet,
    /// Login, admin, and account surfaces that lead nowhere useful.
    pub known_traps: RegexSet,
    /// Content areas where deeper paths and more repetition are expected;
    /// these relax several trap thresholds.
    pub legitimate: RegexSet,
    /// Query parameters that request a non-HTML rendering of the page.
    pub format_params: RegexSet,
    /// Search / print style action endpoints.
    pub action_endpoints: RegexSet,
    /// Date-like path segments, replaced by `DATE` in trap pattern keys.
    pub date_segment: Regex,
    /// Digit runs, replaced by `N` in trap pattern keys.
    pub digit_run: Regex,
}

impl PatternSet {
    pub fn compile() -> Self {
        let calendar = RegexSet::new([
            r"/calendar",
            r"/events?/",
            r"/event-calendar",
            r"/ical",
            r"\.ics$",
            r"[?&]calendar",
            r"[?&]event",
            r"[?&]date=",
            r"[?&]month=",
            r"[?&]year=",
            r"/\d{4}/\d{1,2}/\d{1,2}",
        ])
        .expect("calendar pattern set must compile");

        let known_traps = RegexSet::new([
            r"/wp-admin",
            r"/wp-login",
            r"/login",
            r"/logout",
            r"/signin",
            r"/signout",
            r"/register",
            r"/signup",
            r"/user/",
            r"/account",
            r"/profile",
            r"/dashboard",
            r"/admin",
        ])
        .expect("trap pattern set must compile");

        let legitimate = RegexSet::new([
            r"/wiki/",
            r"/archive/",
            r"/docs/",
            r"/pub/",
            r"/repository/",
            r"/faculty/",
            r"/courses?/",
            r"/research/",
            r"/projects?/",
            r"/publications?/",
        ])
        .expect("legitimate pattern set must compile");

        let format_params = RegexSet::new([
            r"[?&]format=(txt|pdf|csv)",
            r"[?&]export=(txt|pdf)",
            r"[?&]download=",
        ])
        .expect("format param set must compile");

        let action_endpoints = RegexSet::new([r"/search\?", r"\?search=", r"/print/", r"\?print="])
            .expect("action endpoint set must compile");

        let date_segment =
            Regex::new(r"\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{4}-\d{1,2}").expect("date regex");
        let digit_run = Regex::new(r"\d+").expect("digit regex");

        Self {
            calendar,
            known_traps,
            legitimate,
            format_params,
            action_endpoints,
            date_segment,
            digit_run,
        }
    }

    /// True when the URL sits under a content area that earns relaxed trap
    /// thresholds (wikis, archives, course listings, publication indexes).
    pub fn is_legitimate(&self, lower_url: &str) -> bool {
        self.legitimate.is_match(lower_url)
    }
}
