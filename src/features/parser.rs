//! CSV reader and writer for feature tables.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{InputError, Result};
use crate::features::types::{FeatureColumn, FeatureRow, FeatureTable};

pub const KEY_COLUMNS: [&str; 2] = ["geography_unit_id", "date"];

/// Reads a feature table from any CSV source.
///
/// The header must contain `geography_unit_id` and `date`. Feature columns missing
/// from the header are recorded as structurally absent; empty cells are missing
/// readings.
pub fn read_feature_table<R: Read>(reader: R) -> Result<FeatureTable> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    require_columns(&headers, &KEY_COLUMNS)?;

    let columns: Vec<FeatureColumn> = headers
        .iter()
        .filter_map(FeatureColumn::from_name)
        .collect();

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: FeatureRow = result?;
        rows.push(row);
    }

    debug!(rows = rows.len(), columns = columns.len(), "Feature table parsed");
    Ok(FeatureTable::new(rows, columns)?)
}

/// Reads a feature table from a CSV file on disk.
pub fn read_feature_table_path(path: impl AsRef<Path>) -> Result<FeatureTable> {
    let file = File::open(path)?;
    read_feature_table(file)
}

/// Writes every row of `table` with the key columns followed by all six feature
/// columns. Missing readings are written as empty cells.
pub fn write_feature_table<W: Write>(writer: W, table: &FeatureTable) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in table.rows() {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_feature_table_path(path: impl AsRef<Path>, table: &FeatureTable) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_feature_table(file, table)
}

/// Deserializes every record of a CSV source after checking its header for `required`.
pub(crate) fn read_records<T, R>(reader: R, required: &[&str]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    require_columns(&headers, required)?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

fn require_columns(headers: &StringRecord, required: &[&str]) -> std::result::Result<(), InputError> {
    for name in required {
        if !headers.iter().any(|h| h == *name) {
            return Err(InputError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}
