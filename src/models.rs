// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a raw item was obtained. Kept on the persisted record for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchedVia {
    Rss,
    Search,
}

impl FetchedVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchedVia::Rss => "rss",
            FetchedVia::Search => "search",
        }
    }
}

/// Editorial taxonomy assigned by the scoring oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "New Releases")]
    NewReleases,
    Research,
    Business,
    #[serde(rename = "Developer Tools")]
    DeveloperTools,
    Industry,
}

impl Category {
    /// Parse a category string from the oracle, falling back to `Industry`
    /// for anything outside the known set.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim() {
            "New Releases" => Category::NewReleases,
            "Research" => Category::Research,
            "Business" => Category::Business,
            "Developer Tools" => Category::DeveloperTools,
            _ => Category::Industry,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::NewReleases => "New Releases",
            Category::Research => "Research",
            Category::Business => "Business",
            Category::DeveloperTools => "Developer Tools",
            Category::Industry => "Industry",
        }
    }
}

/// A news item as fetched from a source, before dedup and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub fetched_via: FetchedVia,
}

/// Structured fields the scoring oracle returns per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFields {
    pub score: u8, // clamped to 1..=10
    pub category: Category,
    pub summary: String,
    pub reasoning: String,
    pub learning_objectives: String,
}

/// Durable record owned by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub url_hash: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub fetched_via: FetchedVia,
    pub fetched_at: DateTime<Utc>,
    pub score: Option<u8>,
    pub category: Option<Category>,
    pub summary: Option<String>,
    pub score_reasoning: Option<String>,
    pub learning_objectives: Option<String>,
    pub lo_generated_with_opus: bool,
    pub group_id: Option<i64>,
    pub is_primary: bool,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    /// Build an unscored record from a raw item. The id is a placeholder
    /// until the store assigns the real one at insert.
    pub fn from_raw(raw: &RawNewsItem, url_hash: String, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            title: raw.title.clone(),
            url: raw.url.clone(),
            url_hash,
            source: raw.source.clone(),
            published: raw.published,
            description: raw.description.clone(),
            fetched_via: raw.fetched_via,
            fetched_at,
            score: None,
            category: None,
            summary: None,
            score_reasoning: None,
            learning_objectives: None,
            lo_generated_with_opus: false,
            group_id: None,
            is_primary: true,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_falls_back_to_industry() {
        assert_eq!(Category::parse_or_default("New Releases"), Category::NewReleases);
        assert_eq!(Category::parse_or_default("Developer Tools"), Category::DeveloperTools);
        assert_eq!(Category::parse_or_default("Sports"), Category::Industry);
        assert_eq!(Category::parse_or_default(""), Category::Industry);
    }

    #[test]
    fn fetched_via_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&FetchedVia::Rss).unwrap(), "\"rss\"");
        assert_eq!(serde_json::to_string(&FetchedVia::Search).unwrap(), "\"search\"");
        assert_eq!(FetchedVia::Search.as_str(), "search");
    }

    #[test]
    fn category_serde_names_round_trip() {
        let json = serde_json::to_string(&Category::NewReleases).unwrap();
        assert_eq!(json, "\"New Releases\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Category::NewReleases);
    }
}
