//! Input loader: one merged integrated record per date (§6 "external
//! interfaces"). The collector/integrator upstream of this engine is out of
//! scope (§1); this engine only reads the file it produces.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::model::input::IntegratedRecord;

pub trait InputLoader {
    fn load(&self, date: &str) -> Result<IntegratedRecord>;
}

/// Reads `corporate_bias_datasets/integrated/<date>/integrated_data.json`
/// (the sibling of the upstream integrator's `integration_metadata.json`
/// and `collection_summary.json`, which this engine treats as read-only
/// and does not consume, §6 "Persisted layout").
pub struct LocalJsonLoader {
    pub base_dir: PathBuf,
}

impl LocalJsonLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn input_path(&self, date: &str) -> PathBuf {
        self.base_dir
            .join("corporate_bias_datasets")
            .join("integrated")
            .join(date)
            .join("integrated_data.json")
    }
}

impl InputLoader for LocalJsonLoader {
    fn load(&self, date: &str) -> Result<IntegratedRecord> {
        let path = self.input_path(date);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading integrated record at {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing integrated record at {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_minimal_record() {
        let dir = tempfile::tempdir().unwrap();
        let date_dir = dir.path().join("corporate_bias_datasets/integrated/20260101");
        std::fs::create_dir_all(&date_dir).unwrap();
        let mut file = std::fs::File::create(date_dir.join("integrated_data.json")).unwrap();
        write!(file, r#"{{"perplexity_sentiment": {{}}}}"#).unwrap();

        let loader = LocalJsonLoader::new(dir.path());
        let record = loader.load("20260101").unwrap();
        assert!(record.perplexity_sentiment.is_some());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = LocalJsonLoader::new(dir.path());
        assert!(loader.load("20260101").is_err());
    }
}
