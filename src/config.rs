// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/feeds.toml";
pub const DEFAULT_STATE_PATH: &str = "data/processed_articles.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSpec {
    pub url: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feeds: Vec<FeedSpec>,
    pub max_article_age_hours: u64,
    pub max_posts_per_run: usize,
    pub post_delay_secs: u64,
    pub retention_days: u64,
    pub state_path: PathBuf,
    pub summary_max_chars: usize,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            max_article_age_hours: 24,
            max_posts_per_run: 5,
            post_delay_secs: 60,
            retention_days: 7,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            summary_max_chars: 280,
            dry_run: false,
        }
    }
}

/// Built-in feed set used when no configuration file exists.
fn default_feeds() -> Vec<FeedSpec> {
    let feeds = [
        ("http://feeds.bbci.co.uk/news/politics/rss.xml", "politics"),
        ("http://feeds.bbci.co.uk/news/business/rss.xml", "finance"),
        (
            "http://feeds.bbci.co.uk/news/business/economy/rss.xml",
            "stock_market",
        ),
        ("http://feeds.bbci.co.uk/news/world/rss.xml", "world"),
    ];
    feeds
        .into_iter()
        .map(|(url, category)| FeedSpec {
            url: url.to_string(),
            category: category.to_string(),
        })
        .collect()
}

impl Config {
    /// Load configuration. Resolution order:
    /// 1) explicit path (missing file is fatal),
    /// 2) $NEWS_CONFIG_PATH,
    /// 3) config/feeds.toml,
    /// 4) built-in defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, PipelineError> {
        if let Some(p) = explicit {
            if !p.exists() {
                return Err(PipelineError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(PipelineError::Config(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path: {}",
                    pb.display()
                )));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        tracing::info!("no config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("reading config from {}: {e}", path.display()))
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str()).map_err(|e| {
            PipelineError::Config(format!("parsing config {}: {e}", path.display()))
        })?;
        Ok(cfg)
    }

    pub fn max_article_age(&self) -> Duration {
        Duration::hours(self.max_article_age_hours as i64)
    }

    pub fn retention(&self) -> Duration {
        Duration::days(self.retention_days as i64)
    }

    pub fn post_delay(&self) -> StdDuration {
        StdDuration::from_secs(self.post_delay_secs)
    }

    /// Retention must out-live the age filter, or pruning could resurrect a
    /// re-postable article. Violations downgrade to a warning; the pipeline
    /// skips pruning for the run instead of failing.
    pub fn retention_covers_age_filter(&self) -> bool {
        self.retention() > self.max_article_age()
    }
}

fn parse_config(s: &str, hint_ext: &str) -> anyhow::Result<Config> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(c) = toml::from_str::<Config>(s) {
            return Ok(c);
        }
    }
    if let Ok(c) = serde_json::from_str::<Config>(s) {
        return Ok(c);
    }
    // Fallback: also try TOML if not attempted, surfacing its error.
    Ok(toml::from_str::<Config>(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_and_json_formats_parse() {
        let toml = r#"
            max_posts_per_run = 2
            post_delay_secs = 0

            [[feeds]]
            url = "https://example.test/a.xml"
            category = "world"
        "#;
        let c = parse_config(toml, "toml").unwrap();
        assert_eq!(c.max_posts_per_run, 2);
        assert_eq!(c.feeds.len(), 1);
        assert_eq!(c.feeds[0].category, "world");
        // Unset fields come from defaults.
        assert_eq!(c.max_article_age_hours, 24);

        let json = r#"{"feeds":[{"url":"https://example.test/b.xml","category":"finance"}],"dry_run":true}"#;
        let c = parse_config(json, "json").unwrap();
        assert!(c.dry_run);
        assert_eq!(c.feeds[0].category, "finance");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_config("{{{not a config", "toml").is_err());
    }

    #[test]
    fn retention_check_flags_short_horizons() {
        let mut c = Config::default();
        assert!(c.retention_covers_age_filter());
        c.retention_days = 0;
        assert!(!c.retention_covers_age_filter());
    }

    #[serial_test::serial]
    #[test]
    fn load_uses_env_then_default_path_then_builtin() {
        // Isolate CWD in a temp dir so a real config/ in the repo does not interfere.
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // No files anywhere -> built-in defaults.
        let c = Config::load(None).unwrap();
        assert_eq!(c.max_posts_per_run, 5);
        assert!(!c.feeds.is_empty());

        // Env path takes precedence.
        let p = tmp.path().join("feeds.json");
        fs::write(&p, r#"{"max_posts_per_run": 1}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let c = Config::load(None).unwrap();
        assert_eq!(c.max_posts_per_run, 1);
        env::remove_var(ENV_CONFIG_PATH);

        // Explicit missing path is fatal.
        let missing = tmp.path().join("nope.toml");
        assert!(Config::load(Some(missing.as_path())).is_err());

        env::set_current_dir(&old).unwrap();
    }
}
