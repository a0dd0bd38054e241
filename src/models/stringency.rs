//! Policy stringency reference table
//!
//! A small daily table mapping calendar date to a policy-stringency score,
//! joined onto during-pandemic records by exact date. Source rows may repeat
//! a date; duplicates are pre-aggregated by mean when the table is built.

use std::io::Read;

use chrono::NaiveDate;
use log::info;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{Result, StudyError};

/// One row of the stringency CSV, as stored
#[derive(Debug, Deserialize)]
struct RawStringencyRow {
    /// Date as a YYYYMMDD integer
    date: u32,
    /// Stringency score for that date
    stringency: f64,
}

/// Daily stringency scores keyed by date, duplicates averaged
#[derive(Debug, Clone, Default)]
pub struct StringencyTable {
    scores: FxHashMap<NaiveDate, f64>,
}

impl StringencyTable {
    /// Build the table from a CSV reader, averaging duplicate dates
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let mut sums: FxHashMap<NaiveDate, (f64, u32)> = FxHashMap::default();
        let mut rows = 0usize;
        for row in csv_reader.deserialize() {
            let row: RawStringencyRow = row?;
            let date = parse_yyyymmdd(row.date)?;
            let entry = sums.entry(date).or_insert((0.0, 0));
            entry.0 += row.stringency;
            entry.1 += 1;
            rows += 1;
        }

        let scores: FxHashMap<NaiveDate, f64> = sums
            .into_iter()
            .map(|(date, (sum, n))| (date, sum / f64::from(n)))
            .collect();

        info!(
            "Built stringency table: {} dates from {} rows",
            scores.len(),
            rows
        );

        Ok(Self { scores })
    }

    /// Load the table from a CSV file
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Look up the score for a date
    #[must_use]
    pub fn score(&self, date: NaiveDate) -> Option<f64> {
        self.scores.get(&date).copied()
    }

    /// Number of distinct dates in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the table holds no dates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Parse a YYYYMMDD integer into a date
fn parse_yyyymmdd(raw: u32) -> Result<NaiveDate> {
    let year = (raw / 10_000) as i32;
    let month = (raw / 100) % 100;
    let day = raw % 100;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| StudyError::Parse(format!("invalid YYYYMMDD date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_dates_averaged() {
        let csv = "date,stringency\n20200315,40.0\n20200315,60.0\n20200316,55.5\n";
        let table = StringencyTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let d = NaiveDate::from_ymd_opt(2020, 3, 15).unwrap();
        assert!((table.score(d).unwrap() - 50.0).abs() < 1e-12);
        let d2 = NaiveDate::from_ymd_opt(2020, 3, 16).unwrap();
        assert!((table.score(d2).unwrap() - 55.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_date_is_none() {
        let csv = "date,stringency\n20200315,40.0\n";
        let table = StringencyTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.score(NaiveDate::from_ymd_opt(2020, 3, 14).unwrap()), None);
    }

    #[test]
    fn test_invalid_date_rejected() {
        let csv = "date,stringency\n20201340,40.0\n";
        assert!(StringencyTable::from_reader(csv.as_bytes()).is_err());
    }
}
