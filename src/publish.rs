// src/publish.rs
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const ENV_BEARER_TOKEN: &str = "X_BEARER_TOKEN";
const DEFAULT_ENDPOINT: &str = "https://api.x.com";

/// Post budget imposed by the platform. Summaries are sized upstream; this
/// is the final guard before the wire.
pub const MAX_POST_CHARS: usize = 280;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Post `text` plus the article link. Returns the platform post id.
    async fn publish(&self, text: &str, link: &str) -> Result<String>;
}

/// Compose the final post: summary, space, link. Truncates the summary
/// part (never the link) when the pair would exceed the budget.
pub fn compose_post(text: &str, link: &str, max_chars: usize) -> String {
    let link = link.trim();
    if link.is_empty() {
        return crate::summarize::truncate_to_fit(text, max_chars);
    }
    let budget = max_chars.saturating_sub(link.chars().count() + 1);
    let head = crate::summarize::truncate_to_fit(text, budget);
    if head.is_empty() {
        return link.to_string();
    }
    format!("{head} {link}")
}

#[derive(Clone)]
pub struct XPublisher {
    endpoint: String,
    token: String,
    client: Client,
    timeout: Duration,
    max_attempts: u8,
}

impl XPublisher {
    /// Read the bearer token from the process environment. The token is held
    /// in memory only; it is never logged and never persisted.
    pub fn from_env() -> Result<Self, PipelineError> {
        let token = std::env::var(ENV_BEARER_TOKEN).map_err(|_| {
            PipelineError::Config(format!("{ENV_BEARER_TOKEN} is not set in the environment"))
        })?;
        if token.trim().is_empty() {
            return Err(PipelineError::Config(format!(
                "{ENV_BEARER_TOKEN} is empty"
            )));
        }
        Ok(Self::with_token(token))
    }

    pub fn with_token(token: String) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            // One retry at most for transient failures; the next scheduled
            // run is the real retry mechanism.
            max_attempts: 2,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[derive(Serialize)]
struct TweetRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[async_trait]
impl Publisher for XPublisher {
    async fn publish(&self, text: &str, link: &str) -> Result<String> {
        let body = compose_post(text, link, MAX_POST_CHARS);
        let url = format!("{}/2/tweets", self.endpoint);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .timeout(self.timeout)
                .json(&TweetRequest { text: &body })
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_success() {
                        let parsed: TweetResponse =
                            rsp.json().await.map_err(|e| anyhow!("post response: {e}"))?;
                        return Ok(parsed.data.id);
                    }
                    // 429/5xx are worth one more attempt; anything else is not.
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < self.max_attempts {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    let detail = rsp.text().await.unwrap_or_default();
                    return Err(anyhow!("post rejected with {status}: {detail}"));
                }
                Err(e) => {
                    if attempt < self.max_attempts {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("post request failed: {e}"));
                }
            }
        }
    }
}
