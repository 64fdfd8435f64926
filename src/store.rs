// src/store.rs
//
// Durable dedup ledger: a mapping from article id to the record of its
// publication, persisted as pretty JSON so operators can inspect it.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub posted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_reference: Option<String>,
}

#[derive(Debug)]
pub struct ProcessedStore {
    path: PathBuf,
    records: HashMap<String, ProcessedRecord>,
}

impl ProcessedStore {
    /// Read durable state. A missing file is a valid empty store (first run);
    /// a file that exists but does not parse is `CorruptState`; the caller
    /// decides whether to degrade to an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::empty(path));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| PipelineError::CorruptState {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let records: HashMap<String, ProcessedRecord> =
            serde_json::from_str(&content).map_err(|e| PipelineError::CorruptState {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { path, records })
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ProcessedRecord> {
        self.records.get(id)
    }

    /// Insert-or-overwrite the record for `id`. Recording the same id twice
    /// only refreshes the metadata.
    pub fn record(&mut self, id: &str, posted_at: DateTime<Utc>, post_reference: Option<String>) {
        self.records.insert(
            id.to_string(),
            ProcessedRecord {
                posted_at,
                post_reference,
            },
        );
    }

    /// Remove records whose `posted_at` is older than `max_age` relative to
    /// `now`. Returns the number of records removed.
    pub fn prune(&mut self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - max_age;
        let before = self.records.len();
        self.records.retain(|_, rec| rec.posted_at >= cutoff);
        before - self.records.len()
    }

    /// Write the full store back to disk. Write-to-temp-then-rename so a
    /// concurrent or subsequent load never observes a partial store.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating state dir {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.records).context("serializing store")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}
