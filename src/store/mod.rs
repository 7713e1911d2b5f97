// src/store/mod.rs
//! Narrow storage interface the pipeline writes through, plus an in-memory
//! implementation. The core treats storage as an explicit collaborator: it
//! reads a snapshot, decides, and issues write commands, so unit tests run
//! against `MemStore` without any real persistence.

pub mod json;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::grouper::GroupAssignment;
use crate::models::{NewsItem, ScoredFields};

pub use json::JsonStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total: usize,
    pub scored: usize,
    pub grouped: usize,
    pub acknowledged: usize,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Single-writer storage contract. Implementations guarantee `url_hash`
/// uniqueness and assign ids at insert.
pub trait Store: Send + Sync {
    /// Id of the record holding this normalized-URL hash, if any.
    fn lookup_hash(&self, url_hash: &str) -> Result<Option<i64>>;

    /// Insert a new record and return its id. If the hash already exists
    /// (a race the deduplicator missed), the existing row's timestamps are
    /// refreshed and its id returned instead of failing the run.
    fn insert(&self, item: NewsItem) -> Result<i64>;

    /// Refresh fetch/publish timestamps on a duplicate hit. Score and group
    /// state are untouched.
    fn refresh(&self, id: i64, published: Option<DateTime<Utc>>, fetched_at: DateTime<Utc>)
        -> Result<()>;

    /// Populate the scoring fields on an unscored record.
    fn apply_score(&self, id: i64, fields: &ScoredFields) -> Result<()>;

    /// All records fetched at or after `since`.
    fn query_window(&self, since: DateTime<Utc>) -> Result<Vec<NewsItem>>;

    /// Full corpus snapshot.
    fn all_items(&self) -> Result<Vec<NewsItem>>;

    /// Apply one cluster's `group_id`/`is_primary` for all members or none.
    /// Acknowledged state is preserved.
    fn set_group(&self, assignment: &GroupAssignment) -> Result<()>;

    /// Mark one item acknowledged. Returns false when the id is unknown.
    fn acknowledge(&self, id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// Acknowledge every unacknowledged item scoring at or below `max_score`.
    /// Returns how many changed.
    fn acknowledge_below_score(&self, max_score: u8, at: DateTime<Utc>) -> Result<usize>;

    /// Acknowledge every unacknowledged item fetched before `before`.
    fn acknowledge_before(&self, before: DateTime<Utc>, at: DateTime<Utc>) -> Result<usize>;

    /// Replace the learning objectives text on one item.
    fn update_learning_objectives(&self, id: i64, objectives: &str, with_opus: bool)
        -> Result<()>;

    /// Highest `group_id` anywhere in the corpus, 0 when none exist. Fresh
    /// group ids must be allocated above this, not above the clustering
    /// window's maximum, because aged-out groups keep their ids.
    fn max_group_id(&self) -> Result<i64>;

    /// Make buffered mutations durable. In-memory stores treat this as a
    /// no-op; file-backed stores write here once per run so external readers
    /// see either the pre-run or post-run corpus, never a half-run one.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats>;
}

#[derive(Debug, Default)]
struct MemInner {
    items: Vec<NewsItem>,
    next_id: i64,
}

/// Mutex-guarded in-memory store. Readers get cloned snapshots, so a
/// concurrent reader sees either the pre- or post-write state, never a torn
/// one.
#[derive(Debug)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemInner {
                items: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub(crate) fn from_items(items: Vec<NewsItem>) -> Self {
        let next_id = items.iter().map(|it| it.id).max().unwrap_or(0) + 1;
        Self {
            inner: Mutex::new(MemInner { items, next_id }),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<NewsItem> {
        self.inner.lock().expect("store mutex poisoned").items.clone()
    }
}

impl Store for MemStore {
    fn lookup_hash(&self, url_hash: &str) -> Result<Option<i64>> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.items.iter().find(|it| it.url_hash == url_hash).map(|it| it.id))
    }

    fn insert(&self, mut item: NewsItem) -> Result<i64> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        if let Some(existing) = g.items.iter_mut().find(|it| it.url_hash == item.url_hash) {
            existing.fetched_at = item.fetched_at;
            if existing.published.is_none() {
                existing.published = item.published;
            }
            return Ok(existing.id);
        }
        item.id = g.next_id;
        g.next_id += 1;
        let id = item.id;
        g.items.push(item);
        Ok(id)
    }

    fn refresh(
        &self,
        id: i64,
        published: Option<DateTime<Utc>>,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        if let Some(it) = g.items.iter_mut().find(|it| it.id == id) {
            it.fetched_at = fetched_at;
            if it.published.is_none() {
                it.published = published;
            }
        }
        Ok(())
    }

    fn apply_score(&self, id: i64, fields: &ScoredFields) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        if let Some(it) = g.items.iter_mut().find(|it| it.id == id) {
            it.score = Some(fields.score.clamp(1, 10));
            it.category = Some(fields.category);
            it.summary = Some(fields.summary.clone());
            it.score_reasoning = Some(fields.reasoning.clone());
            it.learning_objectives = Some(fields.learning_objectives.clone());
        }
        Ok(())
    }

    fn query_window(&self, since: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.items.iter().filter(|it| it.fetched_at >= since).cloned().collect())
    }

    fn all_items(&self) -> Result<Vec<NewsItem>> {
        Ok(self.snapshot())
    }

    fn set_group(&self, assignment: &GroupAssignment) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        for it in g.items.iter_mut() {
            if assignment.member_ids.contains(&it.id) {
                it.group_id = Some(assignment.group_id);
                it.is_primary = it.id == assignment.primary_id;
            }
        }
        Ok(())
    }

    fn acknowledge(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        match g.items.iter_mut().find(|it| it.id == id) {
            Some(it) => {
                it.acknowledged = true;
                it.acknowledged_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn acknowledge_below_score(&self, max_score: u8, at: DateTime<Utc>) -> Result<usize> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        let mut n = 0;
        for it in g.items.iter_mut() {
            if !it.acknowledged && it.score.is_some_and(|s| s <= max_score) {
                it.acknowledged = true;
                it.acknowledged_at = Some(at);
                n += 1;
            }
        }
        Ok(n)
    }

    fn acknowledge_before(&self, before: DateTime<Utc>, at: DateTime<Utc>) -> Result<usize> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        let mut n = 0;
        for it in g.items.iter_mut() {
            if !it.acknowledged && it.fetched_at < before {
                it.acknowledged = true;
                it.acknowledged_at = Some(at);
                n += 1;
            }
        }
        Ok(n)
    }

    fn update_learning_objectives(
        &self,
        id: i64,
        objectives: &str,
        with_opus: bool,
    ) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        if let Some(it) = g.items.iter_mut().find(|it| it.id == id) {
            it.learning_objectives = Some(objectives.to_string());
            it.lo_generated_with_opus = with_opus;
        }
        Ok(())
    }

    fn max_group_id(&self) -> Result<i64> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.items.iter().filter_map(|it| it.group_id).max().unwrap_or(0))
    }

    fn stats(&self) -> Result<StoreStats> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(StoreStats {
            total: g.items.len(),
            scored: g.items.iter().filter(|it| it.score.is_some()).count(),
            grouped: g.items.iter().filter(|it| it.group_id.is_some()).count(),
            acknowledged: g.items.iter().filter(|it| it.acknowledged).count(),
            last_fetched_at: g.items.iter().map(|it| it.fetched_at).max(),
        })
    }
}
