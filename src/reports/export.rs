//! CSV export of report tables.
//!
//! Files start with a UTF-8 byte order mark so spreadsheet tools pick the
//! right encoding. The first column is a 0-based row index with an empty
//! header.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A header plus rows, every row as wide as the header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(UTF8_BOM)?;

        let mut csv_writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        let header = std::iter::once("").chain(self.columns.iter().map(String::as_str));
        csv_writer.write_record(header)?;
        for (index, row) in self.rows.iter().enumerate() {
            let index = index.to_string();
            let record = std::iter::once(index.as_str()).chain(row.iter().map(String::as_str));
            csv_writer.write_record(record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Failed to create report {:?}", path))?;
        self.write_to(BufWriter::new(file))
            .with_context(|| format!("Failed to write report {:?}", path))
    }
}
