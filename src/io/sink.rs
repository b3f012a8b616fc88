//! Output sink: persists the analysis envelope (and, per SPEC_FULL.md §B.2,
//! an optional CSV summary) to a date-keyed directory. Storage is pluggable
//! between a local path and an object store (§5, §6 `--storage-mode`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Auto,
    Local,
    S3,
}

impl StorageMode {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "local" => StorageMode::Local,
            "s3" => StorageMode::S3,
            _ => StorageMode::Auto,
        }
    }
}

pub trait OutputSink {
    fn write_json(&self, date: &str, filename: &str, value: &serde_json::Value) -> Result<()>;
    fn write_text(&self, date: &str, filename: &str, content: &str) -> Result<()>;
}

/// Writes to `corporate_bias_datasets/integrated/<date>/<filename>`.
pub struct LocalFsSink {
    pub base_dir: PathBuf,
}

impl LocalFsSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn date_dir(&self, date: &str) -> PathBuf {
        self.base_dir.join("corporate_bias_datasets").join("integrated").join(date)
    }
}

impl OutputSink for LocalFsSink {
    fn write_json(&self, date: &str, filename: &str, value: &serde_json::Value) -> Result<()> {
        let dir = self.date_dir(date);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating output directory {}", dir.display()))?;
        let path = dir.join(filename);
        let body = serde_json::to_string_pretty(value).context("serializing analysis result")?;
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote analysis output");
        Ok(())
    }

    fn write_text(&self, date: &str, filename: &str, content: &str) -> Result<()> {
        let dir = self.date_dir(date);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating output directory {}", dir.display()))?;
        let path = dir.join(filename);
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote analysis output");
        Ok(())
    }
}

/// Minimal S3-compatible sink via `reqwest` PUT, for deployments that set
/// `STORAGE_MODE=s3`. This engine treats the bucket as a flat key-value
/// store addressed the same way the local sink addresses paths.
pub struct S3Sink {
    pub endpoint: String,
    pub bucket: String,
    client: reqwest::blocking::Client,
}

impl S3Sink {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn key(&self, date: &str, filename: &str) -> String {
        format!("{}/corporate_bias_datasets/integrated/{}/{}", self.bucket, date, filename)
    }

    fn put(&self, date: &str, filename: &str, body: String) -> Result<()> {
        let url = format!("{}/{}", self.endpoint, self.key(date, filename));
        let response = self
            .client
            .put(&url)
            .body(body)
            .send()
            .with_context(|| format!("PUT {url}"))?;
        if !response.status().is_success() {
            anyhow::bail!("object store returned {} for {}", response.status(), url);
        }
        Ok(())
    }
}

impl OutputSink for S3Sink {
    fn write_json(&self, date: &str, filename: &str, value: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_string_pretty(value).context("serializing analysis result")?;
        self.put(date, filename, body)
    }

    fn write_text(&self, date: &str, filename: &str, content: &str) -> Result<()> {
        self.put(date, filename, content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_sink_round_trips_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalFsSink::new(dir.path());
        let value = serde_json::json!({"ok": true});
        sink.write_json("20260101", "bias_analysis_results.json", &value).unwrap();
        let path = dir
            .path()
            .join("corporate_bias_datasets/integrated/20260101/bias_analysis_results.json");
        assert!(path.exists());
    }

    #[test]
    fn storage_mode_parses_case_insensitively() {
        assert_eq!(StorageMode::parse("S3"), StorageMode::S3);
        assert_eq!(StorageMode::parse("local"), StorageMode::Local);
        assert_eq!(StorageMode::parse("weird"), StorageMode::Auto);
    }
}
