//! AI News Aggregator — pipeline entrypoint.
//! Loads config, wires providers + oracle + store, runs one pipeline pass.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_aggregator::config::AppConfig;
use ai_news_aggregator::fetch::{RssProvider, SearchProvider, SourceProvider};
use ai_news_aggregator::pipeline::run_once;
use ai_news_aggregator::scorer::{AnthropicOracle, DisabledOracle, ScoreOracle};
use ai_news_aggregator::store::JsonStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_providers(cfg: &AppConfig) -> Vec<Box<dyn SourceProvider>> {
    let mut providers: Vec<Box<dyn SourceProvider>> = Vec::new();
    for feed in cfg.feeds.iter().filter(|f| f.enabled) {
        providers.push(Box::new(RssProvider::from_url(
            &feed.name,
            &feed.url,
            cfg.feed_timeout_secs,
            cfg.max_items_per_feed,
        )));
    }
    match &cfg.search_endpoint {
        Some(endpoint) => {
            for query in &cfg.search_queries {
                providers.push(Box::new(SearchProvider::from_endpoint(
                    endpoint,
                    query,
                    cfg.feed_timeout_secs,
                    cfg.max_search_results,
                )));
            }
        }
        None if !cfg.search_queries.is_empty() => {
            tracing::warn!("search_queries configured but no search_endpoint; skipping search");
        }
        None => {}
    }
    providers
}

fn build_oracle(cfg: &AppConfig) -> Box<dyn ScoreOracle> {
    if cfg.anthropic_api_key.is_empty() {
        tracing::warn!("no Anthropic API key; items will be persisted unscored");
        Box::new(DisabledOracle)
    } else {
        Box::new(AnthropicOracle::new(
            cfg.anthropic_api_key.clone(),
            cfg.model.clone(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let store = JsonStore::open(&cfg.data_path)?;
    let providers = build_providers(&cfg);
    let oracle = build_oracle(&cfg);

    tracing::info!(
        feeds = providers.len(),
        model = %cfg.model,
        store = %cfg.data_path.display(),
        "starting pipeline run"
    );

    let stats = run_once(&cfg, &providers, oracle.as_ref(), &store).await?;

    tracing::info!(
        fetched = stats.fetched,
        new = stats.new,
        updated = stats.updated,
        scored = stats.scored,
        groups = stats.groups,
        "done"
    );
    Ok(())
}
