// src/scorer/anthropic.rs
//! Anthropic Messages API oracle. One request scores a whole batch; the
//! response is a JSON array aligned with the numbered items in the prompt.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{RawNewsItem, ScoredFields};

use super::{parse_batch_response, ScoreOracle};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub const DEFAULT_SCORING_PROMPT: &str = "\
You are an AI news analyst. Analyze EACH of the following news items and provide for each:

1. A detailed summary (4-6 sentences) explaining what happened, why it matters, \
and what a general audience can learn from it.
2. An impact score from 1-10: educational value, significance to the AI industry, \
public interest, and novelty. 9-10 industry-shaping, 7-8 very important, \
5-6 moderate, 3-4 minor, 1-2 low relevance.
3. Learning objectives (3-5 bullet points): what a course covering this topic \
should teach. Each starts with a verb.
4. A category: \"New Releases\", \"Research\", \"Business\", or \"Developer Tools\".

Respond in valid JSON only: a JSON array with one object per item, in the same \
order as the input. Each object: {\"id\": N, \"summary\": \"...\", \"score\": N, \
\"reasoning\": \"...\", \"learning_objectives\": [\"...\"], \"category\": \"...\"}

NEWS ITEMS:
{items_text}
";

pub struct AnthropicOracle {
    http: reqwest::Client,
    api_key: String,
    model: String,
    prompt: String,
}

impl AnthropicOracle {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_prompt(api_key, model, DEFAULT_SCORING_PROMPT.to_string())
    }

    pub fn with_prompt(api_key: String, model: String, prompt: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("ai-news-aggregator/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
            prompt,
        }
    }

    fn build_prompt(&self, items: &[RawNewsItem]) -> String {
        let items_text = items
            .iter()
            .enumerate()
            .map(|(i, it)| format_item(i + 1, it))
            .collect::<Vec<_>>()
            .join("\n\n");
        self.prompt.replace("{items_text}", &items_text)
    }
}

fn format_item(index: usize, item: &RawNewsItem) -> String {
    let desc = item
        .description
        .as_deref()
        .unwrap_or("(no description available)");
    format!(
        "[Item {index}]\nTitle: {}\nSource: {}\nDescription: {desc}",
        item.title, item.source
    )
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ScoreOracle for AnthropicOracle {
    async fn score_batch(&self, items: &[RawNewsItem]) -> Result<Vec<Option<ScoredFields>>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        anyhow::ensure!(!self.api_key.is_empty(), "no Anthropic API key configured");

        let req = MessagesRequest {
            model: &self.model,
            // Roughly 800 output tokens per item covers summary + objectives.
            max_tokens: (800 * items.len() as u32).min(64_000),
            messages: vec![Message {
                role: "user",
                content: self.build_prompt(items),
            }],
        };

        let resp = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await
            .context("sending scoring request")?;

        let status = resp.status();
        anyhow::ensure!(status.is_success(), "scoring request failed: {status}");

        let body: MessagesResponse = resp.json().await.context("decoding scoring response")?;
        let text = body
            .content
            .first()
            .map(|b| b.text.as_str())
            .unwrap_or_default();
        Ok(parse_batch_response(text, items.len()))
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchedVia;

    #[test]
    fn prompt_numbers_items_from_one() {
        let oracle = AnthropicOracle::new("k".into(), "claude-sonnet-4-5-20250929".into());
        let items = vec![
            RawNewsItem {
                title: "First".into(),
                url: "https://a.example/1".into(),
                source: "A".into(),
                published: None,
                description: Some("desc".into()),
                fetched_via: FetchedVia::Rss,
            },
            RawNewsItem {
                title: "Second".into(),
                url: "https://a.example/2".into(),
                source: "B".into(),
                published: None,
                description: None,
                fetched_via: FetchedVia::Search,
            },
        ];
        let prompt = oracle.build_prompt(&items);
        assert!(prompt.contains("[Item 1]\nTitle: First"));
        assert!(prompt.contains("[Item 2]\nTitle: Second"));
        assert!(prompt.contains("(no description available)"));
        assert!(!prompt.contains("{items_text}"));
    }
}
