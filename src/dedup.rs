// src/dedup.rs
//! Duplicate detection over a fresh fetch batch: normalized-URL hash match
//! first, fuzzy title match second. Candidates are deduplicated against each
//! other before being checked against the persisted corpus, so one run never
//! inserts two near-identical rows.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{NewsItem, RawNewsItem};
use crate::normalize::url_hash;
use crate::similarity::token_sort_ratio;

/// Where each surviving candidate should go.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Items with no match anywhere; insert as new rows.
    pub new: Vec<RawNewsItem>,
    /// Duplicates of a persisted item; refresh that row's timestamps but keep
    /// its canonical title and score/group state.
    pub updates: Vec<(i64, RawNewsItem)>,
    /// Malformed candidates dropped with a warning.
    pub dropped: usize,
    /// In-batch duplicates merged away before touching the corpus.
    pub merged_in_batch: usize,
}

/// Deduplicate a batch of candidates against each other and against the
/// persisted corpus snapshot.
///
/// `threshold` is on the [0,1] similarity scale and is inclusive: a title
/// pair scoring exactly at threshold counts as a duplicate. Fuzzy-title
/// comparison only considers existing items fetched within the trailing
/// `window_days`; the URL-hash check spans the whole snapshot since the hash
/// is globally unique.
pub fn deduplicate(
    candidates: Vec<RawNewsItem>,
    existing: &[NewsItem],
    threshold: f64,
    window_days: i64,
    now: DateTime<Utc>,
) -> DedupOutcome {
    let mut out = DedupOutcome::default();
    let window_start = now - Duration::days(window_days);

    let windowed: Vec<&NewsItem> = existing
        .iter()
        .filter(|it| it.fetched_at >= window_start)
        .collect();

    // (hash, title) of candidates already routed to `new` in this batch.
    let mut kept_hashes: Vec<String> = Vec::new();
    let mut kept_titles: Vec<String> = Vec::new();

    'candidates: for cand in candidates {
        if cand.title.trim().is_empty() || cand.url.trim().is_empty() {
            warn!(
                source = %cand.source,
                url = %cand.url,
                "dropping malformed candidate (empty title or url)"
            );
            out.dropped += 1;
            continue;
        }

        let hash = url_hash(&cand.url);

        // Batch-internal pass: same two-step rule, but a hit means merge.
        if kept_hashes.iter().any(|h| *h == hash) {
            out.merged_in_batch += 1;
            continue;
        }
        for kept in &kept_titles {
            if token_sort_ratio(&cand.title, kept) >= threshold {
                out.merged_in_batch += 1;
                continue 'candidates;
            }
        }

        // Exact normalized-URL match against the corpus.
        if let Some(hit) = existing.iter().find(|it| it.url_hash == hash) {
            debug!(id = hit.id, url = %cand.url, "url-hash duplicate");
            out.updates.push((hit.id, cand));
            continue;
        }

        // Fuzzy title match within the recency window. Best match wins;
        // exact similarity ties go to the earliest published item, then the
        // lowest id, for determinism.
        let mut best: Option<(f64, &NewsItem)> = None;
        for it in &windowed {
            let sim = token_sort_ratio(&cand.title, &it.title);
            if sim < threshold {
                continue;
            }
            best = match best {
                None => Some((sim, it)),
                Some((bs, bi)) => {
                    if sim > bs || (sim == bs && earlier_than(it, bi)) {
                        Some((sim, it))
                    } else {
                        Some((bs, bi))
                    }
                }
            };
        }
        if let Some((sim, hit)) = best {
            debug!(id = hit.id, similarity = sim, title = %cand.title, "fuzzy-title duplicate");
            out.updates.push((hit.id, cand));
            continue;
        }

        kept_hashes.push(hash);
        kept_titles.push(cand.title.clone());
        out.new.push(cand);
    }

    out
}

/// Ordering used for exact-similarity ties: earliest published first, items
/// without a published date last, id as the final tiebreak.
fn earlier_than(a: &NewsItem, b: &NewsItem) -> bool {
    match (a.published, b.published) {
        (Some(pa), Some(pb)) => (pa, a.id) < (pb, b.id),
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => a.id < b.id,
    }
}
