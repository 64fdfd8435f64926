// src/summarize.rs
//
// Tweet-sized summaries. The default implementation composes headline +
// first sentence and falls back to a small extractive pass when that comes
// out too short; both paths are deterministic and run locally.

use std::collections::HashSet;

use anyhow::{bail, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;

use crate::article::Article;

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Map an article to a bounded-length summary, source attribution
    /// included, sized so that `summary + " " + link` fits the post budget.
    async fn summarize(&self, article: &Article) -> Result<String>;
}

/// Normalize feed-supplied text: decode HTML entities, strip tags, collapse
/// whitespace. Sentence punctuation is kept; summaries need it.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Split on sentence-ending punctuation followed by whitespace. Good enough
/// for news prose; abbreviation handling is out of scope.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            let s = current.trim().to_string();
            if !s.is_empty() {
                sentences.push(s);
            }
            current.clear();
        }
    }
    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "to", "in", "on", "for", "with", "is", "are", "was",
    "were", "at", "by", "it", "as", "that", "this", "from", "be", "has", "have", "had",
];

fn content_words(sentence: &str) -> HashSet<String> {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Cosine similarity over binary word vectors: |common| / sqrt(|a| * |b|).
fn sentence_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count() as f64;
    common / ((a.len() as f64) * (b.len() as f64)).sqrt()
}

/// Keep the `num_sentences` highest-scoring sentences, in original order.
/// A sentence scores by its summed similarity to every other sentence.
pub fn extractive_summary(text: &str, num_sentences: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= num_sentences {
        return sentences.join(" ");
    }
    let words: Vec<HashSet<String>> = sentences.iter().map(|s| content_words(s)).collect();
    let mut scored: Vec<(usize, f64)> = (0..sentences.len())
        .map(|i| {
            let score: f64 = (0..sentences.len())
                .filter(|&j| j != i)
                .map(|j| sentence_similarity(&words[i], &words[j]))
                .sum();
            (i, score)
        })
        .collect();
    // Stable by construction: equal scores resolve to the earlier sentence.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut top: Vec<usize> = scored.into_iter().take(num_sentences).map(|(i, _)| i).collect();
    top.sort_unstable();
    top.iter().map(|&i| sentences[i].as_str()).collect::<Vec<_>>().join(" ")
}

/// Truncate to `max_chars` characters, preferring whole sentences, then a
/// word boundary with an ellipsis.
pub fn truncate_to_fit(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = String::new();
    for sentence in split_sentences(text) {
        let extra = sentence.chars().count() + usize::from(!truncated.is_empty());
        if truncated.chars().count() + extra > max_chars {
            break;
        }
        if !truncated.is_empty() {
            truncated.push(' ');
        }
        truncated.push_str(&sentence);
    }
    if !truncated.is_empty() {
        return truncated;
    }
    // No complete sentence fits; cut at the last word that does.
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    let mut words: Vec<&str> = head.split(' ').collect();
    if words.len() > 1 {
        words.pop();
    }
    let mut out = words.join(" ").trim_end().to_string();
    out.push_str("...");
    out
}

#[derive(Debug, Clone)]
pub struct HeadlineSummarizer {
    max_chars: usize,
    include_source: bool,
    /// Characters reserved for the link the publisher appends (t.co wraps
    /// links to a fixed length, but the raw link is what we post).
    link_reserve_extra: usize,
}

impl HeadlineSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            include_source: true,
            link_reserve_extra: 1, // the joining space
        }
    }

    pub fn without_source(mut self) -> Self {
        self.include_source = false;
        self
    }

    fn headline_first_sentence(&self, article: &Article) -> String {
        let mut headline = article.title.trim().to_string();
        let body = article.description.as_deref().unwrap_or_default();
        let first_sentence = split_sentences(body).into_iter().next().unwrap_or_default();

        if first_sentence.is_empty() {
            return headline;
        }
        if headline.ends_with(':') {
            return format!("{headline} {first_sentence}");
        }
        if !headline.is_empty() && !headline.ends_with(['.', '!', '?']) {
            headline.push('.');
        }
        if headline.is_empty() {
            first_sentence
        } else {
            format!("{headline} {first_sentence}")
        }
    }

    fn suffix(&self, article: &Article) -> String {
        if self.include_source && !article.source.is_empty() {
            format!(" (via {})", article.source)
        } else {
            String::new()
        }
    }
}

#[async_trait]
impl Summarizer for HeadlineSummarizer {
    async fn summarize(&self, article: &Article) -> Result<String> {
        if article.title.trim().is_empty() && article.description.is_none() {
            bail!("article {} has no text to summarize", article.id);
        }

        let suffix = self.suffix(article);
        let link_reserve = article.link.chars().count() + self.link_reserve_extra;
        let budget = self
            .max_chars
            .saturating_sub(suffix.chars().count() + link_reserve);
        if budget == 0 {
            bail!("no character budget left after link and attribution");
        }

        let mut summary = truncate_to_fit(&self.headline_first_sentence(article), budget);

        // Headline alone came out short: try the extractive pass over the
        // whole description and keep whichever says more.
        if summary.chars().count() < 100 {
            if let Some(body) = article.description.as_deref() {
                let extractive = truncate_to_fit(&extractive_summary(body, 2), budget);
                if extractive.chars().count() > summary.chars().count() {
                    summary = extractive;
                }
            }
        }

        Ok(format!("{summary}{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(title: &str, description: Option<&str>) -> Article {
        Article::new(
            title.to_string(),
            "https://example.com/a".to_string(),
            "example.com".to_string(),
            "world".to_string(),
            Utc::now(),
            description.map(|d| d.to_string()),
        )
    }

    #[test]
    fn clean_text_decodes_strips_and_collapses() {
        let s = "  <b>Hello&nbsp;&nbsp;world</b> &ldquo;ok&rdquo;. ";
        assert_eq!(clean_text(s), r#"Hello world "ok"."#);
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let s = "First one. Second one! Third?";
        assert_eq!(split_sentences(s), vec!["First one.", "Second one!", "Third?"]);
    }

    #[test]
    fn truncate_prefers_sentence_boundaries() {
        let s = "Short sentence. This second sentence is much much longer than the first.";
        let out = truncate_to_fit(s, 20);
        assert_eq!(out, "Short sentence.");
    }

    #[test]
    fn truncate_falls_back_to_word_boundary_with_ellipsis() {
        let s = "One single very long sentence without an early period to cut at";
        let out = truncate_to_fit(s, 24);
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 24);
    }

    #[test]
    fn extractive_keeps_original_order() {
        let text = "Markets rallied on rate cut hopes. Weather was mild. \
                    Central banks signalled rate cuts. Rate cuts boost markets.";
        let out = extractive_summary(text, 2);
        let sentences = split_sentences(&out);
        assert_eq!(sentences.len(), 2);
        // Both selected sentences are about rates/markets, not the weather.
        assert!(!out.contains("Weather"));
    }

    #[tokio::test]
    async fn summary_carries_attribution_and_fits_budget() {
        let s = HeadlineSummarizer::new(280);
        let a = article(
            "Global markets rally as central banks signal possible rate cuts",
            Some(
                "Stock markets around the world surged on Wednesday after several \
                 major central banks hinted at potential interest rate cuts in the \
                 coming months. Investors reacted positively.",
            ),
        );
        let out = s.summarize(&a).await.unwrap();
        assert!(out.starts_with("Global markets rally"));
        assert!(out.ends_with("(via example.com)"));
        assert!(out.chars().count() + a.link.chars().count() + 1 <= 280);
    }

    #[tokio::test]
    async fn empty_article_is_a_summarize_error() {
        let s = HeadlineSummarizer::new(280);
        let a = article("", None);
        assert!(s.summarize(&a).await.is_err());
    }

    #[tokio::test]
    async fn colon_headline_merges_with_first_sentence() {
        let s = HeadlineSummarizer::new(280).without_source();
        let a = article("Breaking:", Some("Rates were cut today."));
        let out = s.summarize(&a).await.unwrap();
        assert!(out.starts_with("Breaking: Rates were cut today."));
    }
}
