//! ListenBrainz listen log analysis.
//!
//! Loads a JSON-lines listen log into a normalized SQLite store and exports a
//! few aggregate reports as CSV.

pub mod config;
pub mod ingestion;
pub mod listen_store;
pub mod pipeline;
pub mod reports;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use ingestion::{IngestOptions, IngestReport, MalformedPolicy};
pub use listen_store::{ListenStore, RowCounts};
pub use pipeline::{run, PipelineSummary};
pub use reports::{ReportSettings, Reports};
