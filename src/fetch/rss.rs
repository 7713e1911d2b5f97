// src/fetch/rss.rs
//! RSS 2.0 / Atom provider backed by quick-xml. Supports an HTTP mode for
//! production and a fixture mode so feed parsing is testable offline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::models::{FetchedVia, RawNewsItem};

use super::{clean_text, SourceProvider};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    updated: Option<String>,
    published: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

pub struct RssProvider {
    name: String,
    mode: Mode,
    max_items: usize,
}

impl RssProvider {
    pub fn from_url(name: &str, url: &str, timeout_secs: u64, max_items: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("ai-news-aggregator/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            name: name.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
            max_items,
        }
    }

    pub fn from_fixture(name: &str, xml: &str, max_items: usize) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(xml.to_string()),
            max_items,
        }
    }

    fn parse(&self, body: &str) -> Result<Vec<RawNewsItem>> {
        let xml = scrub_entities(body);
        if let Ok(rss) = from_str::<Rss>(&xml) {
            return Ok(self.rss_items(rss));
        }
        let atom: AtomFeed = from_str(&xml)
            .with_context(|| format!("parsing feed {} as RSS or Atom", self.name))?;
        Ok(self.atom_items(atom))
    }

    fn rss_items(&self, rss: Rss) -> Vec<RawNewsItem> {
        rss.channel
            .items
            .into_iter()
            .filter_map(|it| {
                let title = clean_text(it.title.as_deref()?);
                let url = it.link?.trim().to_string();
                if title.is_empty() || url.is_empty() {
                    return None;
                }
                Some(RawNewsItem {
                    title,
                    url,
                    source: self.name.clone(),
                    published: it.pub_date.as_deref().and_then(parse_date),
                    description: it.description.as_deref().map(clean_text).filter(|d| !d.is_empty()),
                    fetched_via: FetchedVia::Rss,
                })
            })
            .take(self.max_items)
            .collect()
    }

    fn atom_items(&self, feed: AtomFeed) -> Vec<RawNewsItem> {
        feed.entries
            .into_iter()
            .filter_map(|e| {
                let title = clean_text(e.title.as_deref()?);
                let url = e.links.iter().find_map(|l| l.href.clone())?.trim().to_string();
                if title.is_empty() || url.is_empty() {
                    return None;
                }
                let date = e.published.as_deref().or(e.updated.as_deref());
                Some(RawNewsItem {
                    title,
                    url,
                    source: self.name.clone(),
                    published: date.and_then(parse_date),
                    description: e.summary.as_deref().map(clean_text).filter(|d| !d.is_empty()),
                    fetched_via: FetchedVia::Rss,
                })
            })
            .take(self.max_items)
            .collect()
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawNewsItem>> {
        match &self.mode {
            Mode::Fixture(xml) => self.parse(xml),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("fetching feed {}", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("reading feed body {}", self.name))?;
                self.parse(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// RFC 2822 first (RSS pubDate), then RFC 3339 (Atom timestamps).
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(s.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Named HTML entities that are not valid XML; replaced before parsing.
fn scrub_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>OpenAI Blog</title>
  <item>
    <title>OpenAI Releases GPT-5</title>
    <link>https://openai.com/blog/gpt5</link>
    <pubDate>Mon, 02 Mar 2026 09:00:00 GMT</pubDate>
    <description>&lt;p&gt;The next frontier&amp;nbsp;model.&lt;/p&gt;</description>
  </item>
  <item>
    <title></title>
    <link>https://openai.com/blog/empty</link>
  </item>
</channel></rss>"#;

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Anthropic News</title>
  <entry>
    <title>Claude gets faster</title>
    <link href="https://anthropic.com/news/faster"/>
    <updated>2026-03-02T10:00:00Z</updated>
    <summary>Latency improvements.</summary>
  </entry>
</feed>"#;

    #[tokio::test]
    async fn parses_rss_fixture_and_skips_empty_titles() {
        let p = RssProvider::from_fixture("OpenAI Blog", RSS_FIXTURE, 20);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "OpenAI Releases GPT-5");
        assert_eq!(items[0].url, "https://openai.com/blog/gpt5");
        assert_eq!(items[0].source, "OpenAI Blog");
        assert_eq!(items[0].description.as_deref(), Some("The next frontier model."));
        assert!(items[0].published.is_some());
        assert_eq!(items[0].fetched_via, FetchedVia::Rss);
    }

    #[tokio::test]
    async fn parses_atom_fixture() {
        let p = RssProvider::from_fixture("Anthropic", ATOM_FIXTURE, 20);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Claude gets faster");
        assert_eq!(items[0].url, "https://anthropic.com/news/faster");
        assert!(items[0].published.is_some());
    }

    #[tokio::test]
    async fn max_items_caps_the_batch() {
        let many: String = (0..5)
            .map(|i| {
                format!(
                    "<item><title>Story {i}</title><link>https://e.example/{i}</link></item>"
                )
            })
            .collect();
        let xml = format!("<rss version=\"2.0\"><channel>{many}</channel></rss>");
        let p = RssProvider::from_fixture("Feed", &xml, 3);
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn garbage_input_is_an_error_not_a_panic() {
        let p = RssProvider::from_fixture("Feed", "not xml at all", 20);
        assert!(p.fetch_latest().await.is_err());
    }
}
