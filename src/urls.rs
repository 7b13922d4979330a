//! URL canonicalization and identity hashing.
//!
//! Every URL entering the frontier goes through [`normalize`] first so the
//! seen-set and the durable store agree on a single spelling per page.
//! Identity is the MD5 of the canonical string; collisions are treated as
//! equality, which is acceptable at the scale of a four-host allow-list.

use anyhow::{anyhow, Result};
use url::Url;

/// Canonicalize an absolute HTTP(S) URL.
///
/// Lowercases scheme and host, strips the fragment, and drops default ports
/// (the `url` crate does the latter two during parsing). Path case and query
/// order are left intact, since they are part of the page's identity. Percent
/// escapes are re-normalized to uppercase hex so `%2f` and `%2F` hash the
/// same.
///
/// Relative references must be resolved against their base *before* calling
/// this (the extractor joins hrefs against the page URL).
pub fn normalize(url: &str) -> Result<String> {
    let mut parsed =
        Url::parse(url.trim()).map_err(|e| anyhow!("unparseable url '{}': {}", url, e))?;

    if parsed.cannot_be_a_base() {
        return Err(anyhow!("non-hierarchical url '{}'", url));
    }

    parsed.set_fragment(None);
    Ok(uppercase_percent_escapes(parsed.as_str()))
}

/// 32-char lowercase hex MD5 digest of the canonical form of `url`.
///
/// Callers pass an already-normalized URL; un-normalized input still hashes,
/// it just hashes the raw string.
pub fn urlhash(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

/// Lowercase host of `url`, or `None` when it does not parse or has no host.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

/// Uppercase the two hex digits following every `%` in a URL string.
///
/// The WHATWG parser preserves escape casing as given, so this pass is what
/// makes `normalize` idempotent over mixed-case escapes.
fn uppercase_percent_escapes(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        out.push(c);
        if c == '%' && i + 2 < bytes.len() {
            out.push((bytes[i + 1] as char).to_ascii_uppercase());
            out.push((bytes[i + 2] as char).to_ascii_uppercase());
            i += 2;
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_host_keeps_path_case() {
        let n = normalize("HTTPS://WWW.ICS.UCI.EDU/About/Index.html").unwrap();
        assert_eq!(n, "https://www.ics.uci.edu/About/Index.html");
    }

    #[test]
    fn test_normalize_strips_fragment_and_default_port() {
        let n = normalize("http://cs.uci.edu:80/page#section-3").unwrap();
        assert_eq!(n, "http://cs.uci.edu/page");
        let n = normalize("https://cs.uci.edu:443/page").unwrap();
        assert_eq!(n, "https://cs.uci.edu/page");
    }

    #[test]
    fn test_normalize_keeps_explicit_port_and_query_order() {
        let n = normalize("http://cs.uci.edu:8080/a?z=1&a=2").unwrap();
        assert_eq!(n, "http://cs.uci.edu:8080/a?z=1&a=2");
    }

    #[test]
    fn test_normalize_uppercases_percent_escapes() {
        let n = normalize("https://ics.uci.edu/a%2fb%3Fc").unwrap();
        assert_eq!(n, "https://ics.uci.edu/a%2Fb%3Fc");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let urls = [
            "HTTP://ICS.UCI.EDU/Path/File.HTML?Query=Value#frag",
            "https://stat.uci.edu/a%2fb?x=%2e",
            "https://cs.uci.edu",
        ];
        for u in urls {
            let once = normalize(u).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalize not idempotent for {}", u);
        }
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize("not a url").is_err());
        assert!(normalize("mailto:someone@uci.edu").is_err());
    }

    #[test]
    fn test_urlhash_is_32_hex_chars() {
        let h = urlhash("https://www.ics.uci.edu/");
        assert_eq!(h.len(), 32);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, urlhash("https://www.ics.uci.edu/"));
        assert_ne!(h, urlhash("https://www.ics.uci.edu/other"));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://Vision.ICS.uci.edu/papers/x"),
            Some("vision.ics.uci.edu".to_string())
        );
        assert_eq!(host_of("garbage"), None);
    }
}
