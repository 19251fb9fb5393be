//! Output formatting and persistence for SCHI tables.
//!
//! Supports JSON logging of run summaries and CSV export of scored rows.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::index::types::{RunSummary, SchiRow};

/// One CSV line of the SCHI table, with sub-scores at 3 decimals and SCHI at 4.
#[derive(Serialize)]
struct SchiRecord<'a> {
    geography_unit_id: &'a str,
    date: String,
    #[serde(rename = "RS")]
    rs: String,
    #[serde(rename = "AS")]
    access: String,
    #[serde(rename = "WC")]
    wc: String,
    #[serde(rename = "CX")]
    cx: String,
    #[serde(rename = "SCHI")]
    schi: String,
}

impl<'a> From<&'a SchiRow> for SchiRecord<'a> {
    fn from(row: &'a SchiRow) -> Self {
        Self {
            geography_unit_id: &row.geography_unit_id,
            date: row.date.format("%Y-%m-%d").to_string(),
            rs: format!("{:.3}", row.rs),
            access: format!("{:.3}", row.access),
            wc: format!("{:.3}", row.wc),
            cx: format!("{:.3}", row.cx),
            schi: format!("{:.4}", row.schi),
        }
    }
}

/// Logs a run summary as pretty-printed JSON.
pub fn print_json(summary: &RunSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Writes SCHI rows, in order, to any writer with a
/// `geography_unit_id,date,RS,AS,WC,CX,SCHI` header.
pub fn write_schi<W: Write>(writer: W, rows: &[SchiRow]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    for row in rows {
        writer.serialize(SchiRecord::from(row))?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes the SCHI table to `path`, replacing any previous file and creating parent
/// directories as needed.
pub fn write_schi_csv(path: impl AsRef<Path>, rows: &[SchiRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %path.display(), rows = rows.len(), "Writing SCHI table");

    let file = File::create(path)?;
    write_schi(file, rows)
}
