// src/pipeline.rs
//
// One bounded pipeline pass: fetch -> filter-new -> rank/limit -> summarize
// -> publish -> record. All article-level failures are isolated; the run
// always ends by persisting the store exactly once.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::article::Article;
use crate::config::Config;
use crate::error::PipelineError;
use crate::fetch::{fetch_all, ArticleSource};
use crate::publish::Publisher;
use crate::store::ProcessedStore;
use crate::summarize::Summarizer;

/// One-time metrics registration (so series show up wherever a recorder is
/// installed).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_articles_fetched_total",
            "Articles parsed from feeds."
        );
        describe_counter!(
            "pipeline_feed_errors_total",
            "Feed fetch/parse errors (isolated per feed)."
        );
        describe_counter!(
            "pipeline_skipped_old_total",
            "Articles dropped by the age filter."
        );
        describe_counter!(
            "pipeline_skipped_duplicate_total",
            "Articles dropped because their id was already recorded."
        );
        describe_counter!(
            "pipeline_published_total",
            "Articles successfully published."
        );
        describe_counter!(
            "pipeline_publish_errors_total",
            "Publish attempts that failed (retried next run)."
        );
        describe_histogram!("pipeline_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

/// Terminal run states. Neither is a process failure: retries of individual
/// failed articles happen naturally on the next scheduled invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    CompletedWithErrors,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub fetched: usize,
    pub skipped_old: usize,
    pub skipped_duplicate: usize,
    pub deduped_in_run: usize,
    pub eligible: usize,
    pub published: usize,
    pub pruned: usize,
    pub errors: Vec<PipelineError>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.errors.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub skipped_old: usize,
    pub skipped_duplicate: usize,
    pub deduped_in_run: usize,
}

/// Pure candidate selection: age filter, already-posted filter, cross-feed
/// dedup, deterministic ordering. Takes `now` so callers (and tests) control
/// the clock.
///
/// Ordering is newest-first (`published_at` descending, ties by ascending
/// id): when the per-run cap truncates the list, the freshest news survives.
pub fn select_candidates(
    now: DateTime<Utc>,
    articles: Vec<Article>,
    store: &ProcessedStore,
    max_age: chrono::Duration,
) -> (Vec<Article>, SelectionStats) {
    let mut stats = SelectionStats::default();
    let cutoff = now - max_age;

    // Cross-feed dedup: same id keeps the copy with the earliest
    // published_at; the merged input order breaks exact ties, and that order
    // follows the feed configuration, so the result is deterministic.
    let mut by_id: HashMap<String, Article> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for article in articles {
        if article.published_at < cutoff {
            tracing::debug!(id = %article.id, title = %article.title, "skipped: too old");
            stats.skipped_old += 1;
            continue;
        }
        if store.contains(&article.id) {
            tracing::debug!(id = %article.id, title = %article.title, "skipped: already posted");
            stats.skipped_duplicate += 1;
            continue;
        }
        match by_id.get(&article.id) {
            None => {
                order.push(article.id.clone());
                by_id.insert(article.id.clone(), article);
            }
            Some(existing) => {
                stats.deduped_in_run += 1;
                if article.published_at < existing.published_at {
                    by_id.insert(article.id.clone(), article);
                }
            }
        }
    }

    counter!("pipeline_skipped_old_total").increment(stats.skipped_old as u64);
    counter!("pipeline_skipped_duplicate_total").increment(stats.skipped_duplicate as u64);

    let mut kept: Vec<Article> = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect();
    kept.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    (kept, stats)
}

/// Execute exactly one pipeline pass. The caller owns cross-run exclusion
/// (no overlapping invocations); within that critical section this function
/// loads the store once and persists it once.
pub async fn run_once(
    cfg: &Config,
    sources: &[Box<dyn ArticleSource>],
    summarizer: &dyn Summarizer,
    publisher: &dyn Publisher,
) -> RunReport {
    ensure_metrics_described();
    let started = Utc::now();
    let mut report = RunReport::default();

    // 1. Load state. Corruption degrades to an empty store: re-posting a few
    // articles beats halting entirely, and the next persist self-heals.
    let mut store = match ProcessedStore::load(&cfg.state_path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "processed store is corrupt; starting from empty");
            report.errors.push(e);
            ProcessedStore::empty(&cfg.state_path)
        }
    };
    tracing::info!(
        known_ids = store.len(),
        feeds = sources.len(),
        dry_run = cfg.dry_run,
        "run started"
    );

    // 2. Fetch, isolating per-feed failures.
    let (articles, fetch_failures) = fetch_all(sources).await;
    report.fetched = articles.len();
    report.errors.extend(fetch_failures);

    // 3.-6. Select, order, cap.
    let now = Utc::now();
    let (mut candidates, stats) = select_candidates(now, articles, &store, cfg.max_article_age());
    report.skipped_old = stats.skipped_old;
    report.skipped_duplicate = stats.skipped_duplicate;
    report.deduped_in_run = stats.deduped_in_run;
    report.eligible = candidates.len();
    if candidates.len() > cfg.max_posts_per_run {
        tracing::info!(
            eligible = candidates.len(),
            cap = cfg.max_posts_per_run,
            "truncating to per-run cap"
        );
        candidates.truncate(cfg.max_posts_per_run);
    }

    // 7. Per-article loop. Summaries and publishes fail soft; successful
    // publishes are recorded in memory immediately so a crash mid-loop keeps
    // dedup correct for everything already posted.
    let total = candidates.len();
    for (i, mut article) in candidates.into_iter().enumerate() {
        let summary = match summarizer.summarize(&article).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(id = %article.id, title = %article.title, error = ?e, "summarize failed, skipping article");
                report.errors.push(PipelineError::Summarize {
                    id: article.id.clone(),
                    reason: format!("{e:#}"),
                });
                continue;
            }
        };
        article.summary = Some(summary.clone());

        if cfg.dry_run {
            tracing::info!(id = %article.id, summary = %summary, link = %article.link, "dry-run: would post");
            report.published += 1;
            continue;
        }

        match publisher.publish(&summary, &article.link).await {
            Ok(post_id) => {
                store.record(&article.id, Utc::now(), Some(post_id.clone()));
                report.published += 1;
                counter!("pipeline_published_total").increment(1);
                tracing::info!(id = %article.id, post_id = %post_id, title = %article.title, "published");
            }
            Err(e) => {
                // Not recorded: the id stays eligible and retries next run.
                counter!("pipeline_publish_errors_total").increment(1);
                tracing::warn!(id = %article.id, error = ?e, "publish failed, will retry next run");
                report.errors.push(PipelineError::Publish {
                    id: article.id.clone(),
                    reason: format!("{e:#}"),
                });
            }
        }

        // Rate-limit pacing applies to every publish attempt, failed ones
        // included; the platform saw the request either way.
        if i + 1 < total && !cfg.post_delay().is_zero() {
            tracing::debug!(delay_secs = cfg.post_delay_secs, "inter-post delay");
            tokio::time::sleep(cfg.post_delay()).await;
        }
    }

    // 8. Prune by retention, then persist exactly once, also after partial
    // failure, so everything recorded above survives the run. A dry run
    // skips pruning so persist writes back exactly what was loaded.
    if cfg.dry_run {
        tracing::debug!("dry-run: skipping prune");
    } else if cfg.retention_covers_age_filter() {
        report.pruned = store.prune(cfg.retention(), now);
        if report.pruned > 0 {
            tracing::info!(pruned = report.pruned, "pruned old store entries");
        }
    } else {
        tracing::warn!(
            retention_days = cfg.retention_days,
            max_article_age_hours = cfg.max_article_age_hours,
            "retention does not cover the age filter; skipping prune"
        );
    }
    if let Err(e) = store.persist() {
        tracing::error!(error = ?e, "persisting processed store failed");
        report.errors.push(PipelineError::CorruptState {
            path: store.path().display().to_string(),
            reason: format!("{e:#}"),
        });
    }

    gauge!("pipeline_last_run_ts").set(now.timestamp().max(0) as f64);
    let elapsed = (Utc::now() - started).num_milliseconds();
    tracing::info!(
        status = ?report.status(),
        fetched = report.fetched,
        eligible = report.eligible,
        skipped_old = report.skipped_old,
        skipped_duplicate = report.skipped_duplicate,
        deduped_in_run = report.deduped_in_run,
        published = report.published,
        pruned = report.pruned,
        errors = report.errors.len(),
        elapsed_ms = elapsed,
        "run finished"
    );
    report
}
