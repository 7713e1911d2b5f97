// src/pipeline.rs
//! Orchestrates one run: fetch -> dedup -> score -> persist -> group.
//! No step aborts the run; malformed records and failed oracle batches
//! degrade per item and are reflected in the returned stats.

use anyhow::Result;
use chrono::{Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dedup::deduplicate;
use crate::fetch::{fetch_all, SourceProvider};
use crate::grouper::{assign_group_ids, group_items};
use crate::models::NewsItem;
use crate::normalize::url_hash;
use crate::scorer::{score_items, ScoreOracle};
use crate::store::Store;

/// One-time metrics registration so the series carry descriptions.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_fetched_total", "Raw items fetched from all providers.");
        describe_counter!("pipeline_new_total", "Items inserted as new records.");
        describe_counter!("pipeline_updated_total", "Duplicate hits refreshed in place.");
        describe_counter!("pipeline_dropped_total", "Malformed candidates dropped.");
        describe_counter!("pipeline_scored_total", "Items the oracle scored this run.");
        describe_counter!(
            "pipeline_unscored_total",
            "Items persisted without a score (oracle failure or disabled)."
        );
        describe_counter!("pipeline_provider_errors_total", "Provider fetch/parse errors.");
        describe_gauge!("pipeline_groups", "Multi-item story groups after the last run.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fetched: usize,
    pub provider_errors: usize,
    pub dropped: usize,
    pub merged_in_batch: usize,
    pub new: usize,
    pub updated: usize,
    pub scored: usize,
    pub unscored: usize,
    pub groups: usize,
}

/// Run the pipeline once over the given providers, oracle, and store.
pub async fn run_once(
    cfg: &AppConfig,
    providers: &[Box<dyn SourceProvider>],
    oracle: &dyn ScoreOracle,
    store: &dyn Store,
) -> Result<RunStats> {
    ensure_metrics_described();
    let now = Utc::now();
    let mut stats = RunStats::default();

    // 1. Fetch. All providers complete before dedup sees anything, so the
    // candidate set is stable for the whole run.
    let (candidates, provider_errors) = fetch_all(providers).await;
    stats.fetched = candidates.len();
    stats.provider_errors = provider_errors;
    counter!("pipeline_fetched_total").increment(candidates.len() as u64);

    // 2. Deduplicate against the persisted corpus.
    let existing = store.all_items()?;
    let outcome = deduplicate(
        candidates,
        &existing,
        cfg.dedup_threshold_ratio(),
        cfg.recency_window_days,
        now,
    );
    stats.dropped = outcome.dropped;
    stats.merged_in_batch = outcome.merged_in_batch;
    counter!("pipeline_dropped_total").increment(outcome.dropped as u64);

    // 3. Refresh duplicate hits; score/group state stays untouched.
    for (id, raw) in &outcome.updates {
        store.refresh(*id, raw.published, now)?;
    }
    stats.updated = outcome.updates.len();
    counter!("pipeline_updated_total").increment(outcome.updates.len() as u64);

    // 4. Score the genuinely new items, then persist them scored or not.
    let scored = score_items(oracle, &outcome.new, cfg.scoring_batch_size).await;
    for (raw, fields) in outcome.new.iter().zip(scored.iter()) {
        let item = NewsItem::from_raw(raw, url_hash(&raw.url), now);
        let id = store.insert(item)?;
        match fields {
            Some(f) => {
                store.apply_score(id, f)?;
                stats.scored += 1;
            }
            None => {
                warn!(id, title = %raw.title, "persisted unscored");
                stats.unscored += 1;
            }
        }
    }
    stats.new = outcome.new.len();
    counter!("pipeline_new_total").increment(stats.new as u64);
    counter!("pipeline_scored_total").increment(stats.scored as u64);
    counter!("pipeline_unscored_total").increment(stats.unscored as u64);

    // 5. Re-group the recency window. Unscored items sit out until a later
    // run scores them; acknowledged state survives.
    let since = now - Duration::days(cfg.recency_window_days);
    let window = store.query_window(since)?;
    let clusters = group_items(
        &window,
        cfg.clustering_threshold_ratio(),
        &cfg.vendor_priority,
    );
    // Fresh group ids must clear the whole corpus, not just the window, or
    // an aged-out group's id gets handed to an unrelated new story.
    let assignments = assign_group_ids(&clusters, &window, store.max_group_id()?);
    for assignment in &assignments {
        store.set_group(assignment)?;
    }
    stats.groups = assignments.len();
    gauge!("pipeline_groups").set(assignments.len() as f64);
    gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);

    // One durable write per run; readers of the backing file never see a
    // half-finished run.
    store.flush()?;

    info!(
        fetched = stats.fetched,
        new = stats.new,
        updated = stats.updated,
        dropped = stats.dropped,
        scored = stats.scored,
        unscored = stats.unscored,
        groups = stats.groups,
        "pipeline run complete"
    );
    Ok(stats)
}
