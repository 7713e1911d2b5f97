// src/fetch/mod.rs
//! Source providers. Each produces a batch of raw candidate items; the
//! pipeline never sees a provider-internal error, only an empty batch plus a
//! warning counter.

pub mod rss;
pub mod search;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;

use crate::models::RawNewsItem;

pub use rss::RssProvider;
pub use search::SearchProvider;

#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawNewsItem>>;
    fn name(&self) -> &str;
}

/// Fetch from every provider; failures are logged + counted, not propagated.
/// Returns the combined batch and the number of failed providers.
pub async fn fetch_all(providers: &[Box<dyn SourceProvider>]) -> (Vec<RawNewsItem>, usize) {
    let mut items = Vec::new();
    let mut errors = 0usize;
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut batch) => {
                tracing::info!(provider = p.name(), count = batch.len(), "fetched");
                items.append(&mut batch);
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error");
                counter!("pipeline_provider_errors_total").increment(1);
                errors += 1;
            }
        }
    }
    (items, errors)
}

/// Clean a title or description: decode HTML entities, strip tags, normalize
/// curly quotes, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}
