mod file_config;

pub use file_config::{FileConfig, IngestConfig, ReportsConfig};

use crate::ingestion::{IngestOptions, MalformedPolicy};
use crate::reports::ReportSettings;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_DB_FILE: &str = "ListenBrainz.db";
pub const DEFAULT_TARGET_DATE: &str = "2019-03-01";
pub const DEFAULT_TOP_USERS: usize = 10;

/// CLI arguments that can be used for config resolution.
/// `None` means "not given", the default is applied during resolution.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub input_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub target_date: Option<NaiveDate>,
    pub top_users: Option<usize>,
    pub on_malformed: Option<MalformedPolicy>,
    pub batch_size: Option<usize>,
    pub skip_reports: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input_path: PathBuf,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    pub skip_reports: bool,
    pub ingest: IngestOptions,
    pub reports: ReportSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let ingest_file = file.ingest.unwrap_or_default();
        let reports_file = file.reports.unwrap_or_default();

        let input_path = file
            .input_path
            .map(PathBuf::from)
            .or_else(|| cli.input_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("input_path must be specified via INPUT or in config file")
            })?;
        if !input_path.exists() {
            bail!("Input file does not exist: {:?}", input_path);
        }
        if !input_path.is_file() {
            bail!("Input path is not a file: {:?}", input_path);
        }

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
        if db_path.is_dir() {
            bail!("Database path is a directory: {:?}", db_path);
        }

        let output_dir = file
            .output_dir
            .map(PathBuf::from)
            .or_else(|| cli.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        if output_dir.exists() && !output_dir.is_dir() {
            bail!("output_dir is not a directory: {:?}", output_dir);
        }

        let on_malformed = match ingest_file.on_malformed {
            Some(s) => parse_malformed_policy(&s)?,
            None => cli.on_malformed.unwrap_or_default(),
        };

        let batch_size = ingest_file.batch_size.or(cli.batch_size);
        if batch_size == Some(0) {
            bail!("batch_size must be greater than zero");
        }

        let target_date = match reports_file.target_date {
            Some(s) => parse_date(&s)?,
            None => match cli.target_date {
                Some(date) => date,
                None => parse_date(DEFAULT_TARGET_DATE)?,
            },
        };

        let top_users = reports_file
            .top_users
            .or(cli.top_users)
            .unwrap_or(DEFAULT_TOP_USERS);
        if top_users == 0 {
            bail!("top_users must be greater than zero");
        }

        Ok(Self {
            input_path,
            db_path,
            output_dir,
            skip_reports: file.skip_reports.unwrap_or(cli.skip_reports),
            ingest: IngestOptions {
                on_malformed,
                batch_size,
            },
            reports: ReportSettings {
                target_date,
                top_users,
            },
        })
    }
}

/// Parses a malformed-line policy. Uses clap's ValueEnum trait for parsing.
fn parse_malformed_policy(s: &str) -> Result<MalformedPolicy> {
    MalformedPolicy::from_str(s, true)
        .map_err(|_| anyhow::anyhow!("Unknown on_malformed policy: {:?}", s))
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", s))
}
