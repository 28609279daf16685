//! Listen log ingestion.
//!
//! Lines are decoded by [`parser`], split into per-table rows by
//! [`normalizer`] and written by [`loader`] through the listen store.

pub mod loader;
pub mod normalizer;
pub mod parser;

pub use loader::{ingest, ingest_file, IngestOptions, IngestReport, MalformedPolicy};
pub use normalizer::{normalize, NormalizedListen};
pub use parser::{parse_line, parse_listens, ListenEvent, ListenParser, ParseError};
