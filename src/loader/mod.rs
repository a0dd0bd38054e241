//! Measurement CSV ingestion
//!
//! Loads raw measurement rows and restricts them to the configured
//! biomarker. Everything dropped here is counted, never silently discarded.

use std::io::Read;
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::models::RawMeasurementRow;

/// Raw rows for one biomarker plus ingestion accounting
#[derive(Debug)]
pub struct RawDataset {
    /// Rows carrying the configured biomarker code
    pub rows: Vec<RawMeasurementRow>,
    /// Total rows read from the file
    pub total_rows: usize,
    /// Rows dropped for carrying a different biomarker code
    pub other_biomarker_rows: usize,
}

/// Read measurement rows from a CSV reader, keeping one biomarker
pub fn load_measurements_from_reader<R: Read>(
    reader: R,
    biomarker_code: &str,
) -> Result<RawDataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut total_rows = 0usize;
    for row in csv_reader.deserialize() {
        let row: RawMeasurementRow = row?;
        total_rows += 1;
        if row.biomarker == biomarker_code {
            rows.push(row);
        }
    }

    let other_biomarker_rows = total_rows - rows.len();
    info!(
        "Loaded {} measurement rows ({} kept for biomarker {}, {} other)",
        total_rows,
        rows.len(),
        biomarker_code,
        other_biomarker_rows
    );

    Ok(RawDataset {
        rows,
        total_rows,
        other_biomarker_rows,
    })
}

/// Read measurement rows from a CSV file, keeping one biomarker
pub fn load_measurements(path: &Path, biomarker_code: &str) -> Result<RawDataset> {
    let file = std::fs::File::open(path)?;
    load_measurements_from_reader(file, biomarker_code)
}
