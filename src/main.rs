//! News Auto-Poster: Binary Entrypoint
//! Runs exactly one pipeline pass: fetch feeds, drop already-posted
//! articles, summarize, post, record. Scheduling and run-level mutual
//! exclusion belong to the invoking scheduler (cron with overlap disabled).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_autoposter::fetch::ArticleSource;
use news_autoposter::{
    run_once, Config, HeadlineSummarizer, RssFeedSource, RunStatus, XPublisher,
};

#[derive(Debug, Parser)]
#[command(name = "news-autoposter", about = "RSS news pipeline: dedup, summarize, post to X")]
struct Args {
    /// Alternate configuration file (TOML or JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Alternate processed-articles state file.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Override the per-run publish cap.
    #[arg(long)]
    max_posts: Option<usize>,

    /// Trace the full pipeline without posting or recording anything.
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_autoposter=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op in prod environments. This is where
    // X_BEARER_TOKEN and NEWS_CONFIG_PATH come from outside of CI.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();

    let mut cfg = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "cannot load configuration");
            return ExitCode::from(2);
        }
    };
    if let Some(state) = args.state {
        cfg.state_path = state;
    }
    if let Some(max_posts) = args.max_posts {
        cfg.max_posts_per_run = max_posts;
    }
    cfg.dry_run = cfg.dry_run || args.dry_run;

    if cfg.feeds.is_empty() {
        tracing::warn!("no feeds configured; the run will find nothing to post");
    }
    if let Some(parent) = cfg.state_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, dir = %parent.display(), "cannot create state dir");
            }
        }
    }

    // Credentials are required up front unless this is a dry run; failing
    // here is the fatal ConfigurationError path, before any article work.
    let publisher = if cfg.dry_run {
        tracing::info!("running in dry-run mode, nothing will be posted");
        XPublisher::with_token(String::new())
    } else {
        match XPublisher::from_env() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "publisher credentials unavailable");
                return ExitCode::from(2);
            }
        }
    };

    let sources: Vec<Box<dyn ArticleSource>> = cfg
        .feeds
        .iter()
        .map(|f| {
            Box::new(RssFeedSource::from_url(f.url.clone(), f.category.clone()))
                as Box<dyn ArticleSource>
        })
        .collect();
    let summarizer = HeadlineSummarizer::new(cfg.summary_max_chars);

    let report = run_once(&cfg, &sources, &summarizer, &publisher).await;

    match report.status() {
        RunStatus::Completed => tracing::info!(published = report.published, "completed"),
        RunStatus::CompletedWithErrors => tracing::warn!(
            published = report.published,
            errors = report.errors.len(),
            "completed with errors"
        ),
    }
    // Both terminal states exit 0; only configuration failures above are
    // fatal to the process.
    ExitCode::SUCCESS
}
