// src/fetch/rss.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::article::Article;
use crate::fetch::ArticleSource;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RSS `pubDate` is RFC 2822. Feed timestamps are not trusted: missing or
/// unparseable dates fall back to the fetch time so the age filter stays
/// well-defined.
fn parse_pub_date(ts: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|unix| DateTime::<Utc>::from_timestamp(unix, 0))
        .unwrap_or(fallback)
}

/// Extract the host from a feed URL for source attribution, e.g.
/// "http://feeds.bbci.co.uk/news/rss.xml" -> "feeds.bbci.co.uk".
pub fn feed_host(url: &str) -> String {
    static RE_HOST: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_HOST.get_or_init(|| regex::Regex::new(r"^https?://(?:www\.)?([^/]+)").unwrap());
    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub struct RssFeedSource {
    url: String,
    category: String,
    mode: Mode,
}

enum Mode {
    Http { client: reqwest::Client, timeout: Duration },
    // Owned copy so tests can hand in decoded fixtures without 'static.
    Fixture(String),
}

impl RssFeedSource {
    pub fn from_url(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            mode: Mode::Http {
                client: reqwest::Client::new(),
                timeout: Duration::from_secs(10),
            },
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        if let Mode::Http { timeout, .. } = &mut self.mode {
            *timeout = Duration::from_secs(secs);
        }
        self
    }

    pub fn from_fixture(
        url: impl Into<String>,
        category: impl Into<String>,
        xml: &str,
    ) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items(&self, xml: &str, fetched_at: DateTime<Utc>) -> Result<Vec<Article>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.url))?;

        let source = feed_host(&self.url);
        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = crate::summarize::clean_text(it.title.as_deref().unwrap_or_default());
            let link = it.link.as_deref().unwrap_or_default().trim().to_string();
            // Without a link or a title there is nothing stable to derive an
            // id from; the item cannot be deduplicated, so drop it.
            if title.is_empty() && link.is_empty() {
                continue;
            }
            let published_at = it
                .pub_date
                .as_deref()
                .map(|ts| parse_pub_date(ts, fetched_at))
                .unwrap_or(fetched_at);
            let description = it
                .description
                .as_deref()
                .map(crate::summarize::clean_text)
                .filter(|d| !d.is_empty());

            out.push(Article::new(
                title,
                link,
                source.clone(),
                self.category.clone(),
                published_at,
                description,
            ));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("pipeline_feed_parse_ms").record(ms);
        counter!("pipeline_articles_fetched_total").increment(out.len() as u64);
        Ok(out)
    }

    async fn fetch_body(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<String> {
        // At most one retry for transient network errors, then fail soft at
        // the pipeline level. Retry-next-run is the real retry mechanism.
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = client.get(url).timeout(timeout).send().await;
            match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(rsp) => return rsp.text().await.context("reading feed body"),
                    Err(e) => {
                        if attempt < 2 {
                            tokio::time::sleep(Duration::from_millis(500)).await;
                            continue;
                        }
                        return Err(e).context("feed http status");
                    }
                },
                Err(e) => {
                    if attempt < 2 {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        continue;
                    }
                    return Err(e).context("feed http get");
                }
            }
        }
    }
}

#[async_trait]
impl ArticleSource for RssFeedSource {
    async fn fetch(&self) -> Result<Vec<Article>> {
        let fetched_at = Utc::now();
        match &self.mode {
            Mode::Fixture(xml) => self.parse_items(xml, fetched_at),
            Mode::Http { client, timeout } => {
                let body = Self::fetch_body(client, &self.url, *timeout).await?;
                self.parse_items(&body, fetched_at)
            }
        }
    }

    fn name(&self) -> &str {
        &self.url
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
