// src/store/json.rs
//! JSON-file-backed store: the in-memory store plus an atomic
//! write-to-temp-then-rename save on `flush`. Mutations are buffered in
//! memory during a run, so an external reader of the file sees either the
//! pre-run or the post-run corpus, never a half-written run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::grouper::GroupAssignment;
use crate::models::{NewsItem, ScoredFields};

use super::{MemStore, Store, StoreStats};

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    items: Vec<NewsItem>,
}

pub struct JsonStore {
    mem: MemStore,
    path: PathBuf,
    dirty: AtomicBool,
}

impl JsonStore {
    /// Open (or create) a store at `path`. A missing file starts empty; a
    /// corrupt file is an error rather than silent data loss.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mem = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading store {}", path.display()))?;
            let snap: Snapshot = serde_json::from_str(&content)
                .with_context(|| format!("parsing store {}", path.display()))?;
            MemStore::from_items(snap.items)
        } else {
            MemStore::new()
        };
        Ok(Self {
            mem,
            path,
            dirty: AtomicBool::new(false),
        })
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    fn save(&self) -> Result<()> {
        let snap = Snapshot {
            items: self.mem.snapshot(),
        };
        let json = serde_json::to_string_pretty(&snap).context("serializing store")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes()).context("writing store")?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn lookup_hash(&self, url_hash: &str) -> Result<Option<i64>> {
        self.mem.lookup_hash(url_hash)
    }

    fn insert(&self, item: NewsItem) -> Result<i64> {
        let id = self.mem.insert(item)?;
        self.mark_dirty();
        Ok(id)
    }

    fn refresh(
        &self,
        id: i64,
        published: Option<DateTime<Utc>>,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        self.mem.refresh(id, published, fetched_at)?;
        self.mark_dirty();
        Ok(())
    }

    fn apply_score(&self, id: i64, fields: &ScoredFields) -> Result<()> {
        self.mem.apply_score(id, fields)?;
        self.mark_dirty();
        Ok(())
    }

    fn query_window(&self, since: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        self.mem.query_window(since)
    }

    fn all_items(&self) -> Result<Vec<NewsItem>> {
        self.mem.all_items()
    }

    fn set_group(&self, assignment: &GroupAssignment) -> Result<()> {
        self.mem.set_group(assignment)?;
        self.mark_dirty();
        Ok(())
    }

    fn acknowledge(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let hit = self.mem.acknowledge(id, at)?;
        if hit {
            self.mark_dirty();
        }
        Ok(hit)
    }

    fn acknowledge_below_score(&self, max_score: u8, at: DateTime<Utc>) -> Result<usize> {
        let n = self.mem.acknowledge_below_score(max_score, at)?;
        if n > 0 {
            self.mark_dirty();
        }
        Ok(n)
    }

    fn acknowledge_before(&self, before: DateTime<Utc>, at: DateTime<Utc>) -> Result<usize> {
        let n = self.mem.acknowledge_before(before, at)?;
        if n > 0 {
            self.mark_dirty();
        }
        Ok(n)
    }

    fn update_learning_objectives(
        &self,
        id: i64,
        objectives: &str,
        with_opus: bool,
    ) -> Result<()> {
        self.mem.update_learning_objectives(id, objectives, with_opus)?;
        self.mark_dirty();
        Ok(())
    }

    fn max_group_id(&self) -> Result<i64> {
        self.mem.max_group_id()
    }

    fn flush(&self) -> Result<()> {
        if self.dirty.swap(false, Ordering::Relaxed) {
            if let Err(e) = self.save() {
                // Keep the buffer marked so a later flush retries.
                self.dirty.store(true, Ordering::Relaxed);
                return Err(e);
            }
        }
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        self.mem.stats()
    }
}
