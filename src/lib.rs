// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedup;
pub mod fetch;
pub mod grouper;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod scorer;
pub mod similarity;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::dedup::{deduplicate, DedupOutcome};
pub use crate::grouper::{assign_group_ids, group_items, Cluster, GroupAssignment};
pub use crate::models::{Category, FetchedVia, NewsItem, RawNewsItem, ScoredFields};
pub use crate::normalize::{normalize_url, url_hash};
pub use crate::pipeline::{run_once, RunStats};
pub use crate::similarity::token_sort_ratio;
pub use crate::store::{JsonStore, MemStore, Store};
