//! One batch run: open store, load the listen log, index, report.

use crate::config::AppConfig;
use crate::ingestion::{ingest_file, IngestReport};
use crate::listen_store::{ListenStore, RowCounts};
use crate::reports::generate_reports;
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug)]
pub struct PipelineSummary {
    pub ingest: IngestReport,
    pub stored: RowCounts,
    pub report_files: Vec<PathBuf>,
}

pub fn run(config: &AppConfig) -> Result<PipelineSummary> {
    info!("Setting up database at {:?}...", config.db_path);
    let mut store = ListenStore::open(&config.db_path)?;

    let ingest = ingest_file(&mut store, &config.input_path, &config.ingest)?;

    info!("Ensuring listen time index...");
    store.ensure_listen_time_index()?;

    let report_files = if config.skip_reports {
        info!("Skipping reports");
        Vec::new()
    } else {
        generate_reports(&store, &config.reports, &config.output_dir)?
    };

    let stored = store.counts()?;
    info!("Store now holds {}", stored);

    Ok(PipelineSummary {
        ingest,
        stored,
        report_files,
    })
}
