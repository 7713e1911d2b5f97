// src/config.rs
//! Typed configuration loaded from TOML. Every recognized option has an
//! explicit serde default; unknown keys are rejected at load time so typos
//! surface immediately instead of silently falling back.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/ainews.toml";
pub const ENV_CONFIG_PATH: &str = "AINEWS_CONFIG_PATH";
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Clustering tolerates more phrasing divergence than strict duplicate
/// detection, so its threshold sits below the dedup default.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 80.0;
pub const DEFAULT_CLUSTERING_THRESHOLD: f64 = 75.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub search_queries: Vec<String>,
    /// News-search endpoint with a `{query}` placeholder; queries are skipped
    /// when unset.
    #[serde(default)]
    pub search_endpoint: Option<String>,

    /// Fuzzy-title duplicate threshold, percent scale (0-100).
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
    /// Story-clustering threshold, percent scale. Looser than dedup.
    #[serde(default = "default_clustering_threshold")]
    pub clustering_threshold: f64,
    /// Dedup and clustering only look back this many days.
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
    /// Ordered source names; earlier entries outrank later ones when picking
    /// a cluster primary. Matched case-insensitively.
    #[serde(default)]
    pub vendor_priority: Vec<String>,

    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_scoring_batch_size")]
    pub scoring_batch_size: usize,
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: usize,
    #[serde(default = "default_feed_timeout_secs")]
    pub feed_timeout_secs: u64,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Where the JSON store lives.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Anthropic key; the env var always wins over the file.
    #[serde(default)]
    pub anthropic_api_key: String,
}

fn default_true() -> bool {
    true
}
fn default_dedup_threshold() -> f64 {
    DEFAULT_DEDUP_THRESHOLD
}
fn default_clustering_threshold() -> f64 {
    DEFAULT_CLUSTERING_THRESHOLD
}
fn default_recency_window_days() -> i64 {
    30
}
fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}
fn default_scoring_batch_size() -> usize {
    10
}
fn default_max_items_per_feed() -> usize {
    20
}
fn default_feed_timeout_secs() -> u64 {
    15
}
fn default_max_search_results() -> usize {
    5
}
fn default_data_path() -> PathBuf {
    PathBuf::from("data/ainews.json")
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config deserializes via defaults")
    }
}

impl AppConfig {
    /// Load from an explicit path, apply env overrides, validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using `$AINEWS_CONFIG_PATH`, then `config/ainews.toml`, then
    /// built-in defaults when no file exists.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(fallback);
        }
        let mut cfg = AppConfig::default();
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.trim().is_empty() {
                self.anthropic_api_key = key;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.dedup_threshold),
            "dedup_threshold must be within 0-100, got {}",
            self.dedup_threshold
        );
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.clustering_threshold),
            "clustering_threshold must be within 0-100, got {}",
            self.clustering_threshold
        );
        anyhow::ensure!(
            self.recency_window_days > 0,
            "recency_window_days must be positive, got {}",
            self.recency_window_days
        );
        anyhow::ensure!(self.scoring_batch_size > 0, "scoring_batch_size must be positive");
        Ok(())
    }

    /// Dedup threshold on the [0,1] scale the similarity engine uses.
    pub fn dedup_threshold_ratio(&self) -> f64 {
        self.dedup_threshold / 100.0
    }

    /// Clustering threshold on the [0,1] scale.
    pub fn clustering_threshold_ratio(&self) -> f64 {
        self.clustering_threshold / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.dedup_threshold, 80.0);
        assert_eq!(cfg.clustering_threshold, 75.0);
        assert_eq!(cfg.recency_window_days, 30);
        assert_eq!(cfg.scoring_batch_size, 10);
        assert!(cfg.feeds.is_empty());
        assert!((cfg.dedup_threshold_ratio() - 0.80).abs() < 1e-9);
    }

    #[test]
    fn parses_feeds_and_thresholds() {
        let toml_src = r#"
            dedup_threshold = 85.0
            vendor_priority = ["OpenAI Blog", "Anthropic"]

            [[feeds]]
            name = "OpenAI Blog"
            url = "https://openai.com/blog/rss.xml"

            [[feeds]]
            name = "Old Feed"
            url = "https://example.com/rss"
            enabled = false
        "#;
        let mut tmp = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        tmp.write_all(toml_src.as_bytes()).unwrap();
        let cfg = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(cfg.dedup_threshold, 85.0);
        assert_eq!(cfg.feeds.len(), 2);
        assert!(cfg.feeds[0].enabled);
        assert!(!cfg.feeds[1].enabled);
        assert_eq!(cfg.vendor_priority[0], "OpenAI Blog");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut tmp = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        tmp.write_all(b"dedupe_treshold = 80.0\n").unwrap();
        assert!(AppConfig::load_from(tmp.path()).is_err());
    }

    #[test]
    fn out_of_range_threshold_fails_validation() {
        let mut tmp = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        tmp.write_all(b"dedup_threshold = 120.0\n").unwrap();
        assert!(AppConfig::load_from(tmp.path()).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_api_key_wins_over_file() {
        let mut tmp = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        tmp.write_all(b"anthropic_api_key = \"from-file\"\n").unwrap();
        std::env::set_var(ENV_API_KEY, "from-env");
        let cfg = AppConfig::load_from(tmp.path()).unwrap();
        std::env::remove_var(ENV_API_KEY);
        assert_eq!(cfg.anthropic_api_key, "from-env");
    }
}
