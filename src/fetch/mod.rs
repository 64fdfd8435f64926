// src/fetch/mod.rs
pub mod rss;

use anyhow::Result;
use metrics::counter;

use crate::article::Article;
use crate::error::PipelineError;

#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Article>>;
    /// Label for logs and error reports (typically the feed URL).
    fn name(&self) -> &str;
}

/// Fetch every configured source in turn, isolating per-feed failures: a feed
/// that errors is logged and reported, the remaining feeds still run. The
/// merged result preserves source order, which keeps later dedup
/// deterministic without any cross-feed coordination.
pub async fn fetch_all(
    sources: &[Box<dyn ArticleSource>],
) -> (Vec<Article>, Vec<PipelineError>) {
    let mut articles = Vec::new();
    let mut failures = Vec::new();

    for source in sources {
        match source.fetch().await {
            Ok(mut batch) => {
                tracing::debug!(feed = source.name(), count = batch.len(), "feed fetched");
                articles.append(&mut batch);
            }
            Err(e) => {
                tracing::warn!(feed = source.name(), error = ?e, "feed fetch failed");
                counter!("pipeline_feed_errors_total").increment(1);
                failures.push(PipelineError::SourceFetch {
                    feed: source.name().to_string(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    (articles, failures)
}
