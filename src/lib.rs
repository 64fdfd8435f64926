// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod article;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod publish;
pub mod store;
pub mod summarize;

// ---- Re-exports for stable public API ----
pub use crate::article::{article_id, Article};
pub use crate::config::{Config, FeedSpec};
pub use crate::error::PipelineError;
pub use crate::fetch::{rss::RssFeedSource, ArticleSource};
pub use crate::pipeline::{run_once, select_candidates, RunReport, RunStatus};
pub use crate::publish::{Publisher, XPublisher};
pub use crate::store::{ProcessedRecord, ProcessedStore};
pub use crate::summarize::{HeadlineSummarizer, Summarizer};
