// src/article.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Stable identifier derived from the canonical link (title fallback).
    /// Two fetches of the same underlying article yield the same id.
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: String,   // e.g. "feeds.bbci.co.uk"
    pub category: String, // e.g. "politics"
    pub published_at: DateTime<Utc>,
    pub description: Option<String>,
    pub summary: Option<String>,
}

impl Article {
    pub fn new(
        title: String,
        link: String,
        source: String,
        category: String,
        published_at: DateTime<Utc>,
        description: Option<String>,
    ) -> Self {
        let id = article_id(&link, &title);
        Self {
            id,
            title,
            link,
            source,
            category,
            published_at,
            description,
            summary: None,
        }
    }
}

/// Deterministic article id: SHA-256 over the canonical link, falling back to
/// the title when the link is empty. Hex-encoded, 32 chars.
pub fn article_id(link: &str, title: &str) -> String {
    use sha2::{Digest, Sha256};
    let identifier = if link.trim().is_empty() { title } else { link };
    let mut hasher = Sha256::new();
    hasher.update(identifier.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
