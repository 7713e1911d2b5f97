// src/scorer/mod.rs
//! Scoring oracle abstraction. The pipeline hands the oracle a batch of raw
//! items and gets back position-aligned results; anything the oracle could
//! not score comes back as `None` and the item is persisted unscored.

pub mod anthropic;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::models::{Category, RawNewsItem, ScoredFields};

pub use anthropic::AnthropicOracle;

#[async_trait]
pub trait ScoreOracle: Send + Sync {
    /// Score one batch. The returned vec is aligned by position with the
    /// input; entries the oracle failed on are `None`. Implementations
    /// return `Err` only for whole-batch failures (network, auth).
    async fn score_batch(&self, items: &[RawNewsItem]) -> Result<Vec<Option<ScoredFields>>>;

    fn name(&self) -> &'static str;
}

/// Oracle used when no API key is configured; everything stays unscored.
pub struct DisabledOracle;

#[async_trait]
impl ScoreOracle for DisabledOracle {
    async fn score_batch(&self, items: &[RawNewsItem]) -> Result<Vec<Option<ScoredFields>>> {
        Ok(vec![None; items.len()])
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic oracle for tests: fixed score and category for every item.
pub struct MockOracle {
    pub score: u8,
    pub category: Category,
}

#[async_trait]
impl ScoreOracle for MockOracle {
    async fn score_batch(&self, items: &[RawNewsItem]) -> Result<Vec<Option<ScoredFields>>> {
        Ok(items
            .iter()
            .map(|it| {
                Some(ScoredFields {
                    score: self.score,
                    category: self.category,
                    summary: format!("Summary of {}", it.title),
                    reasoning: "mock".to_string(),
                    learning_objectives: "- Understand the announcement".to_string(),
                })
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Score all items through the oracle in batches of `batch_size`. A failed
/// batch downgrades to `None` for its items; it never fails the run.
pub async fn score_items(
    oracle: &dyn ScoreOracle,
    items: &[RawNewsItem],
    batch_size: usize,
) -> Vec<Option<ScoredFields>> {
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(items.len());
    for batch in items.chunks(batch_size) {
        match oracle.score_batch(batch).await {
            Ok(mut results) => {
                if results.len() != batch.len() {
                    warn!(
                        expected = batch.len(),
                        got = results.len(),
                        oracle = oracle.name(),
                        "oracle returned a partial batch"
                    );
                    results.resize(batch.len(), None);
                }
                out.extend(results);
            }
            Err(e) => {
                warn!(error = ?e, oracle = oracle.name(), "scoring batch failed, items stay unscored");
                out.extend(std::iter::repeat_with(|| None).take(batch.len()));
            }
        }
    }
    out
}

/// One entry of the oracle's JSON array response. Every field is optional so
/// a malformed entry degrades instead of sinking the batch.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    learning_objectives: Option<serde_json::Value>,
    #[serde(default)]
    category: Option<String>,
}

/// Parse a model response into position-aligned fields for `n` items.
///
/// The model is asked for a bare JSON array but sometimes wraps it in prose,
/// so the first balanced array is extracted before parsing. Scores clamp to
/// 1..=10, unknown categories fall back, and objective lists are joined into
/// `- ` bullet lines.
pub fn parse_batch_response(text: &str, n: usize) -> Vec<Option<ScoredFields>> {
    let json_text = extract_json_array(text).unwrap_or_else(|| text.trim());

    let entries: Vec<serde_json::Value> = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "could not parse oracle response as a JSON array");
            return vec![None; n];
        }
    };
    if entries.len() != n {
        warn!(expected = n, got = entries.len(), "oracle response length mismatch");
    }

    (0..n)
        .map(|i| {
            let value = entries.get(i)?;
            let entry: RawEntry = serde_json::from_value(value.clone()).ok()?;
            let score = entry.score? as i64;
            Some(ScoredFields {
                score: score.clamp(1, 10) as u8,
                category: Category::parse_or_default(entry.category.as_deref().unwrap_or("")),
                summary: entry.summary.unwrap_or_default(),
                reasoning: entry.reasoning.unwrap_or_default(),
                learning_objectives: join_objectives(entry.learning_objectives),
            })
        })
        .collect()
}

/// First balanced JSON array in `text`, bracket-depth tracked and
/// string-literal aware. Matching greedily to the last `]` would break on
/// prose after the array that contains a bracketed aside.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0u32;
    let mut in_str = false;
    let mut escaped = false;
    for (i, b) in text.bytes().enumerate().skip(start) {
        if in_str {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_str = false;
            }
            continue;
        }
        match b {
            b'"' => in_str = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn join_objectives(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
