// src/normalize.rs
//! URL canonicalization for identity comparison: lowercase scheme and host,
//! strip `www.` and tracking parameters, sort the surviving query, drop the
//! trailing slash. Total function; malformed input degrades to trim+lowercase.

use sha2::{Digest, Sha256};

/// Query parameters that never change the identity of the linked resource.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
    "fbclid",
    "gclid",
    "ref",
    "source",
];

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Canonicalize a URL string for duplicate detection.
///
/// The scheme is case-folded only; `http` is deliberately not upgraded to
/// `https`, so the two schemes hash differently.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match split_url(trimmed) {
        Some(parts) => rebuild(parts),
        None => trimmed.to_ascii_lowercase(),
    }
}

/// sha256 hex digest of the normalized URL; the primary dedup key.
pub fn url_hash(url: &str) -> String {
    let norm = normalize_url(url);
    let mut hasher = Sha256::new();
    hasher.update(norm.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

struct UrlParts<'a> {
    scheme: &'a str,
    host: &'a str,
    path: &'a str,
    query: Option<&'a str>,
}

/// Minimal absolute-URL splitter. Returns `None` when the input has no
/// recognizable `scheme://host` shape.
fn split_url(url: &str) -> Option<UrlParts<'_>> {
    let scheme_end = url.find("://")?;
    let scheme = &url[..scheme_end];
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
        return None;
    }
    let rest = &url[scheme_end + 3..];
    if rest.is_empty() {
        return None;
    }

    // Drop any fragment first; it never affects identity.
    let rest = rest.split('#').next().unwrap_or(rest);

    let (authority_path, query) = match rest.split_once('?') {
        Some((ap, q)) => (ap, Some(q)),
        None => (rest, None),
    };
    let (host, path) = match authority_path.find('/') {
        Some(idx) => (&authority_path[..idx], &authority_path[idx..]),
        None => (authority_path, ""),
    };
    if host.is_empty() {
        return None;
    }
    Some(UrlParts {
        scheme,
        host,
        path,
        query,
    })
}

fn rebuild(parts: UrlParts<'_>) -> String {
    let scheme = parts.scheme.to_ascii_lowercase();

    let mut host = parts.host.to_ascii_lowercase();
    if let Some(stripped) = host.strip_prefix("www.") {
        host = stripped.to_string();
    }

    // Trailing slash is not significant unless the path is exactly "/".
    let mut path = parts.path.to_string();
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    let mut kept: Vec<(&str, &str)> = Vec::new();
    if let Some(q) = parts.query {
        for pair in q.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            if !is_tracking_param(k) {
                kept.push((k, v));
            }
        }
    }
    // Canonical parameter order.
    kept.sort();

    let mut out = format!("{scheme}://{host}{path}");
    if !kept.is_empty() {
        out.push('?');
        for (i, (k, v)) in kept.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(k);
            if !v.is_empty() {
                out.push('=');
                out.push_str(v);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_and_www() {
        assert_eq!(
            normalize_url("https://www.Example.com/a?utm_source=x&id=1"),
            normalize_url("https://example.com/a?id=1"),
        );
    }

    #[test]
    fn sorts_query_params() {
        assert_eq!(
            normalize_url("https://example.com/p?b=2&a=1"),
            "https://example.com/p?a=1&b=2"
        );
    }

    #[test]
    fn drops_trailing_slash_but_keeps_bare_root() {
        assert_eq!(normalize_url("https://example.com/a/"), "https://example.com/a");
        assert_eq!(normalize_url("https://example.com/a//"), "https://example.com/a");
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn scheme_is_case_folded_not_upgraded() {
        assert_eq!(normalize_url("HTTP://Example.com/x"), "http://example.com/x");
        assert_ne!(
            normalize_url("http://example.com/x"),
            normalize_url("https://example.com/x")
        );
    }

    #[test]
    fn malformed_input_degrades_to_lowercase_trim() {
        assert_eq!(normalize_url("  Not A URL  "), "not a url");
        assert_eq!(normalize_url("://nohost"), "://nohost");
    }

    #[test]
    fn fragment_and_fbclid_are_dropped() {
        assert_eq!(
            normalize_url("https://example.com/a?fbclid=abc#section"),
            "https://example.com/a"
        );
    }

    #[test]
    fn hash_matches_for_equivalent_urls() {
        assert_eq!(
            url_hash("https://www.openai.com/blog/gpt5?utm_source=tw"),
            url_hash("https://openai.com/blog/gpt5"),
        );
        assert_eq!(url_hash("https://example.com").len(), 64);
    }
}
