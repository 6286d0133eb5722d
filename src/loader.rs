//! Delimited-text loading.
//!
//! Reads a header row plus records into a [`Table`], inferring each cell's
//! type with [`Value::parse`].

use crate::table::{Table, Value};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Options for reading a delimited file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Stop after this many records.
    pub max_rows: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            max_rows: None,
        }
    }
}

impl From<&crate::config::GeneralConfig> for LoadOptions {
    fn from(config: &crate::config::GeneralConfig) -> Self {
        Self {
            delimiter: config.delimiter_byte(),
            max_rows: config.max_rows,
        }
    }
}

/// Load a delimited file from disk.
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<Table> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;

    read_table(file, options)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))
}

/// Read a delimited table from any reader.
pub fn read_table<R: Read>(reader: R, options: &LoadOptions) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                // Row-index columns written without a name
                let name = format!("unnamed_{}", i);
                debug!("Header {} is empty, naming it {}", i, name);
                name
            } else {
                h.to_string()
            }
        })
        .collect();

    if headers.is_empty() {
        anyhow::bail!("Input has no header row");
    }

    let mut table = Table::new(headers).context("Invalid header row")?;

    for (i, record) in reader.records().enumerate() {
        if options.max_rows.is_some_and(|max| i >= max) {
            warn!("Stopping after {} records (max_rows)", i);
            break;
        }

        // Line numbers are 1-based and count the header
        let record = record.with_context(|| format!("Malformed record at line {}", i + 2))?;
        let row: Vec<Value> = record.iter().map(Value::parse).collect();
        table
            .push_row(row)
            .with_context(|| format!("Malformed record at line {}", i + 2))?;
    }

    debug!(
        "Loaded {} records with {} columns",
        table.len(),
        table.width()
    );

    Ok(table)
}
