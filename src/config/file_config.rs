use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML configuration. Every field present here overrides the
/// matching command line value.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub input_path: Option<String>,
    pub db_path: Option<String>,
    pub output_dir: Option<String>,
    pub skip_reports: Option<bool>,

    pub ingest: Option<IngestConfig>,
    pub reports: Option<ReportsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct IngestConfig {
    /// "abort" or "skip"
    pub on_malformed: Option<String>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReportsConfig {
    /// Calendar date in `YYYY-MM-DD` form.
    pub target_date: Option<String>,
    pub top_users: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
