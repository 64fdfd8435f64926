// src/error.rs
use thiserror::Error;

/// Error taxonomy for one pipeline run. Everything except `Config` is caught
/// and isolated at the smallest scope; only `Config` aborts the process.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("feed fetch failed for {feed}: {reason}")]
    SourceFetch { feed: String, reason: String },

    #[error("summarization failed for article {id}: {reason}")]
    Summarize { id: String, reason: String },

    #[error("publish failed for article {id}: {reason}")]
    Publish { id: String, reason: String },

    #[error("processed store at {path} is unusable: {reason}")]
    CorruptState { path: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
