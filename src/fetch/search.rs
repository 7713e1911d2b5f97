// src/fetch/search.rs
//! Ad-hoc web-search provider. Talks to a news-search endpoint that returns
//! a JSON array of results; the endpoint URL carries a `{query}` placeholder.
//! Like the RSS provider it has a fixture mode for offline tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::models::{FetchedVia, RawNewsItem};

use super::{clean_text, SourceProvider};

/// Search descriptions are trimmed to this length before scoring.
const BODY_MAX: usize = 500;

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

enum Mode {
    Fixture(String),
    Http {
        endpoint: String,
        client: reqwest::Client,
    },
}

pub struct SearchProvider {
    query: String,
    max_results: usize,
    mode: Mode,
}

impl SearchProvider {
    pub fn from_endpoint(endpoint: &str, query: &str, timeout_secs: u64, max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("ai-news-aggregator/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            query: query.to_string(),
            max_results,
            mode: Mode::Http {
                endpoint: endpoint.to_string(),
                client,
            },
        }
    }

    pub fn from_fixture(query: &str, json: &str, max_results: usize) -> Self {
        Self {
            query: query.to_string(),
            max_results,
            mode: Mode::Fixture(json.to_string()),
        }
    }

    fn parse(&self, body: &str) -> Result<Vec<RawNewsItem>> {
        let results: Vec<SearchResult> = serde_json::from_str(body)
            .with_context(|| format!("parsing search results for '{}'", self.query))?;
        Ok(results
            .into_iter()
            .filter_map(|r| {
                let title = clean_text(&r.title);
                let url = r.url.trim().to_string();
                if title.is_empty() || url.is_empty() {
                    return None;
                }
                let description = r
                    .body
                    .map(|b| clean_text(&b))
                    .filter(|b| !b.is_empty())
                    .map(|b| b.chars().take(BODY_MAX).collect());
                Some(RawNewsItem {
                    title,
                    url,
                    source: r.source.unwrap_or_else(|| "Web Search".to_string()),
                    published: r.date.as_deref().and_then(parse_date),
                    description,
                    fetched_via: FetchedVia::Search,
                })
            })
            .take(self.max_results)
            .collect())
    }
}

#[async_trait]
impl SourceProvider for SearchProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawNewsItem>> {
        match &self.mode {
            Mode::Fixture(json) => self.parse(json),
            Mode::Http { endpoint, client } => {
                let encoded = urlencode(&self.query);
                let url = endpoint.replace("{query}", &encoded);
                let body = client
                    .get(&url)
                    .send()
                    .await
                    .with_context(|| format!("searching '{}'", self.query))?
                    .text()
                    .await
                    .context("reading search response")?;
                self.parse(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.query
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .or_else(|_| DateTime::parse_from_rfc2822(s.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Percent-encode everything outside the unreserved set.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => {
                use std::fmt::Write as _;
                let _ = write!(&mut out, "%{:02X}", b);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"[
        {"title": "OpenAI ships GPT-5", "url": "https://news.example/gpt5",
         "date": "2026-03-02T08:00:00Z", "source": "Example News",
         "body": "The long awaited model arrives."},
        {"title": "", "url": "https://news.example/broken"},
        {"title": "No url result", "url": ""}
    ]"#;

    #[tokio::test]
    async fn parses_results_and_drops_incomplete_ones() {
        let p = SearchProvider::from_fixture("gpt-5 news", FIXTURE, 5);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "OpenAI ships GPT-5");
        assert_eq!(items[0].source, "Example News");
        assert_eq!(items[0].fetched_via, FetchedVia::Search);
        assert!(items[0].published.is_some());
    }

    #[tokio::test]
    async fn missing_source_defaults_to_web_search() {
        let json = r#"[{"title": "T", "url": "https://a.example/1"}]"#;
        let p = SearchProvider::from_fixture("q", json, 5);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items[0].source, "Web Search");
        assert!(items[0].published.is_none());
    }

    #[test]
    fn query_is_percent_encoded() {
        assert_eq!(urlencode("gpt-5 release"), "gpt-5%20release");
        assert_eq!(urlencode("ai&ml"), "ai%26ml");
    }
}
