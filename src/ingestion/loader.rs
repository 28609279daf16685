//! Drives parse → normalize → load over a listen log.

use super::normalizer::normalize;
use super::parser::parse_listens;
use crate::listen_store::{ListenBatch, ListenStore, RowCounts};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// What to do with a line that cannot be decoded into a listen.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum MalformedPolicy {
    /// Stop the run. Nothing from the current batch is written.
    #[default]
    Abort,
    /// Log the line and keep going.
    Skip,
}

#[derive(Clone, Debug, Default)]
pub struct IngestOptions {
    pub on_malformed: MalformedPolicy,
    /// Events per transaction. `None` buffers the whole input into a single
    /// transaction.
    pub batch_size: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub events_parsed: usize,
    pub lines_skipped: usize,
    pub batches_committed: usize,
    pub added: RowCounts,
}

fn flush(store: &mut ListenStore, batch: &mut ListenBatch, report: &mut IngestReport) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let added = store
        .load_batch(batch)
        .with_context(|| format!("Failed to load batch of {} listens", batch.len()))?;
    report.added += added;
    report.batches_committed += 1;
    debug!(
        "Batch {} committed, {} events parsed so far",
        report.batches_committed, report.events_parsed
    );
    *batch = ListenBatch::default();
    Ok(())
}

/// Read every listen from `reader` into `store`.
///
/// With `batch_size` unset the entire input is parsed before the first write.
/// Otherwise each full batch is committed as soon as it is complete, so an
/// abort keeps the batches committed before it.
pub fn ingest<R: BufRead>(
    store: &mut ListenStore,
    reader: R,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let mut batch = ListenBatch::default();

    for result in parse_listens(reader) {
        match result {
            Ok(event) => {
                report.events_parsed += 1;
                batch.push(normalize(event));
                if options.batch_size.is_some_and(|size| batch.len() >= size) {
                    flush(store, &mut batch, &mut report)?;
                }
            }
            Err(e) if e.is_row_level() && options.on_malformed == MalformedPolicy::Skip => {
                warn!("Skipping malformed listen: {}", e);
                report.lines_skipped += 1;
            }
            Err(e) => {
                let line = e.line();
                return Err(
                    anyhow::Error::new(e).context(format!("Aborting load at line {}", line))
                );
            }
        }
    }
    flush(store, &mut batch, &mut report)?;

    if report.lines_skipped > 0 {
        warn!("{} malformed lines were skipped", report.lines_skipped);
    }
    Ok(report)
}

pub fn ingest_file<P: AsRef<Path>>(
    store: &mut ListenStore,
    input_path: P,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let input_path = input_path.as_ref();
    let file = File::open(input_path)
        .with_context(|| format!("Failed to open listen log {:?}", input_path))?;

    info!("Loading listens from {:?}...", input_path);
    let report = ingest(store, BufReader::new(file), options)?;
    info!(
        "Loaded {} listens in {} batches: added {}",
        report.events_parsed, report.batches_committed, report.added
    );
    Ok(report)
}
