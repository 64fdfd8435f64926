// tests/pipeline_e2e.rs
//
// Full pipeline passes against in-memory sources and a recording publisher:
// capping, ordering, cross-feed dedup, and run-to-run idempotence.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use news_autoposter::fetch::ArticleSource;
use news_autoposter::{run_once, Article, Config, Publisher, RunStatus, Summarizer};

struct StaticSource {
    url: String,
    articles: Vec<Article>,
}

#[async_trait]
impl ArticleSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<Article>> {
        Ok(self.articles.clone())
    }
    fn name(&self) -> &str {
        &self.url
    }
}

struct StubSummarizer;

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, article: &Article) -> Result<String> {
        Ok(format!("{} (via {})", article.title, article.source))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, text: &str, link: &str) -> Result<String> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((text.to_string(), link.to_string()));
        Ok(format!("post-{}", calls.len()))
    }
}

fn article_aged(now: DateTime<Utc>, link: &str, hours_old: i64) -> Article {
    Article::new(
        format!("Headline {hours_old}h"),
        link.to_string(),
        "example.test".to_string(),
        "world".to_string(),
        now - Duration::hours(hours_old),
        None,
    )
}

fn test_config(state_path: PathBuf) -> Config {
    Config {
        post_delay_secs: 0,
        state_path,
        ..Config::default()
    }
}

fn source_of(url: &str, articles: Vec<Article>) -> Box<dyn ArticleSource> {
    Box::new(StaticSource {
        url: url.to_string(),
        articles,
    })
}

#[tokio::test]
async fn cap_publishes_the_two_freshest_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path().join("state.json"));
    cfg.max_posts_per_run = 2;

    let now = Utc::now();
    let articles: Vec<Article> = [1, 2, 3, 30, 40]
        .iter()
        .map(|h| article_aged(now, &format!("https://example.test/{h}"), *h))
        .collect();
    let expected: Vec<String> = articles[..2].iter().map(|a| a.id.clone()).collect();
    let sources = vec![source_of("https://example.test/feed", articles)];

    let publisher = RecordingPublisher::default();
    let report = run_once(&cfg, &sources, &StubSummarizer, &publisher).await;

    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(report.published, 2);
    assert_eq!(report.skipped_old, 2);

    let calls = publisher.calls.lock().unwrap();
    let links: Vec<&str> = calls.iter().map(|(_, l)| l.as_str()).collect();
    assert_eq!(links, vec!["https://example.test/1", "https://example.test/2"]);

    // The store afterward contains exactly the two published ids.
    let store = news_autoposter::ProcessedStore::load(&cfg.state_path).unwrap();
    assert_eq!(store.len(), 2);
    assert!(expected.iter().all(|id| store.contains(id)));
}

#[tokio::test]
async fn second_run_with_no_new_articles_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path().join("state.json"));

    let now = Utc::now();
    let articles = vec![
        article_aged(now, "https://example.test/a", 1),
        article_aged(now, "https://example.test/b", 2),
    ];
    let sources = vec![source_of("https://example.test/feed", articles)];

    let first = RecordingPublisher::default();
    let report = run_once(&cfg, &sources, &StubSummarizer, &first).await;
    assert_eq!(report.published, 2);

    let second = RecordingPublisher::default();
    let report = run_once(&cfg, &sources, &StubSummarizer, &second).await;
    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(report.published, 0);
    assert_eq!(report.skipped_duplicate, 2);
    assert!(second.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn syndicated_article_gets_exactly_one_publish_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path().join("state.json"));

    let now = Utc::now();
    let shared_a = article_aged(now, "https://example.test/shared", 2);
    let shared_b = article_aged(now, "https://example.test/shared", 1);
    assert_eq!(shared_a.id, shared_b.id);

    let sources = vec![
        source_of("https://example.test/feed-a", vec![shared_a]),
        source_of("https://example.test/feed-b", vec![shared_b]),
    ];

    let publisher = RecordingPublisher::default();
    let report = run_once(&cfg, &sources, &StubSummarizer, &publisher).await;

    assert_eq!(report.deduped_in_run, 1);
    assert_eq!(report.published, 1);
    assert_eq!(publisher.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn published_summary_reaches_the_publisher_with_its_link() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path().join("state.json"));

    let now = Utc::now();
    let sources = vec![source_of(
        "https://example.test/feed",
        vec![article_aged(now, "https://example.test/solo", 1)],
    )];

    let publisher = RecordingPublisher::default();
    run_once(&cfg, &sources, &StubSummarizer, &publisher).await;

    let calls = publisher.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (text, link) = &calls[0];
    assert_eq!(text, "Headline 1h (via example.test)");
    assert_eq!(link, "https://example.test/solo");

    // The recorded entry carries the platform post reference.
    let store = news_autoposter::ProcessedStore::load(&cfg.state_path).unwrap();
    let article = article_aged(now, "https://example.test/solo", 1);
    assert_eq!(
        store.get(&article.id).unwrap().post_reference.as_deref(),
        Some("post-1")
    );
}
