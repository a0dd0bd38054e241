//! Cohort construction
//!
//! Turns raw measurement rows into labeled `MeasurementRecord`s: assigns
//! study period, season and age bracket, resolves censored values, flags
//! deficiency and joins the stringency index onto during-pandemic records.
//! Every exclusion is tallied in `CohortSummary`.

pub mod classify;

pub use classify::{classify_deficient, resolve_value};

use chrono::NaiveDate;
use log::{info, warn};

use crate::config::StudyConfig;
use crate::models::{
    AgeBracket, Gender, MeasurementRecord, Period, RawMeasurementRow, StringencyTable,
};
use crate::models::types::Season;

/// Accounting for every record excluded while building the cohort
#[derive(Debug, Clone, Default)]
pub struct CohortSummary {
    /// Rows entering cohort construction
    pub input_rows: usize,
    /// Retained records
    pub retained: usize,
    /// Rows dropped for a gender code outside {M, F}
    pub dropped_gender: usize,
    /// Rows dropped for an invalid calendar date
    pub dropped_invalid_date: usize,
    /// Rows dropped for a test date outside both period windows
    pub dropped_outside_windows: usize,
    /// Retained records whose value resolved to missing
    pub missing_values: usize,
    /// Retained records with an unknown age bracket
    pub unknown_age_bracket: usize,
    /// During-period records with no stringency score for their date
    pub unmatched_stringency_dates: usize,
}

/// A labeled, immutable analysis cohort
///
/// The record vector is the single dataset value threaded through every
/// later pipeline stage; stages borrow it and never mutate it.
#[derive(Debug)]
pub struct Cohort {
    /// Labeled measurement records
    pub records: Vec<MeasurementRecord>,
    /// Exclusion accounting
    pub summary: CohortSummary,
}

impl Cohort {
    /// Records in one study period
    #[must_use]
    pub fn period_records(&self, period: Period) -> Vec<&MeasurementRecord> {
        self.records.iter().filter(|r| r.period == period).collect()
    }

    /// The subset eligible for matching and causal estimation
    ///
    /// Drops records with an unknown age bracket unless the configuration
    /// keeps them. The caller still sees the drop via
    /// `summary.unknown_age_bracket`.
    #[must_use]
    pub fn estimation_records(&self, config: &StudyConfig) -> Vec<MeasurementRecord> {
        self.records
            .iter()
            .filter(|r| config.keep_unknown_age_bracket || r.age_bracket != AgeBracket::Unknown)
            .cloned()
            .collect()
    }
}

/// Build a labeled cohort from raw rows
///
/// Gender codes outside {M, F} are dropped here. The source data carries a
/// rare third code; it is far too sparse to support stratified matching, so
/// exclusion is a deliberate data-quality rule and the count is reported
/// rather than silently applied.
pub fn build_cohort(
    rows: &[RawMeasurementRow],
    stringency: &StringencyTable,
    config: &StudyConfig,
) -> Cohort {
    let mut summary = CohortSummary {
        input_rows: rows.len(),
        ..CohortSummary::default()
    };
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(gender) = Gender::from_code(&row.gender) else {
            summary.dropped_gender += 1;
            continue;
        };

        let Some(test_date) =
            NaiveDate::from_ymd_opt(row.cohort_year, row.test_month, row.test_day)
        else {
            summary.dropped_invalid_date += 1;
            continue;
        };

        let Some(period) = config.windows.assign(test_date) else {
            summary.dropped_outside_windows += 1;
            continue;
        };

        let age_bracket = AgeBracket::from_code(&row.age_band);
        if age_bracket == AgeBracket::Unknown {
            summary.unknown_age_bracket += 1;
        }

        let value = resolve_value(row.value, row.value_text.as_deref());
        if value.is_none() {
            summary.missing_values += 1;
        }
        let deficient = classify_deficient(value, config.deficiency_threshold);

        let stringency_score = if period == Period::During {
            let score = stringency.score(test_date);
            if score.is_none() {
                summary.unmatched_stringency_dates += 1;
            }
            score
        } else {
            None
        };

        records.push(MeasurementRecord {
            gender,
            age_bracket,
            test_date,
            test_month: row.test_month,
            season: Season::from_date(test_date),
            period,
            value,
            deficient,
            stringency: stringency_score,
        });
    }

    summary.retained = records.len();
    info!(
        "Cohort built: {} retained of {} rows ({} gender-dropped, {} bad dates, {} outside windows)",
        summary.retained,
        summary.input_rows,
        summary.dropped_gender,
        summary.dropped_invalid_date,
        summary.dropped_outside_windows
    );
    if summary.unmatched_stringency_dates > 0 {
        warn!(
            "{} during-period records had no stringency score for their test date",
            summary.unmatched_stringency_dates
        );
    }

    Cohort { records, summary }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(gender: &str, year: i32, month: u32, day: u32, value: Option<f64>) -> RawMeasurementRow {
        RawMeasurementRow {
            gender: gender.to_string(),
            biomarker: "NPU10267".to_string(),
            age_band: "4".to_string(),
            cohort_year: year,
            test_month: month,
            test_day: day,
            value,
            value_text: None,
            diagnosis: None,
        }
    }

    #[test]
    fn test_gender_and_window_exclusions_are_counted() {
        let rows = vec![
            row("M", 2019, 6, 1, Some(60.0)),
            row("X", 2019, 6, 1, Some(60.0)),
            row("F", 2026, 6, 1, Some(60.0)),
            row("F", 2019, 2, 30, Some(60.0)),
        ];
        let cohort = build_cohort(&rows, &StringencyTable::default(), &StudyConfig::default());
        assert_eq!(cohort.summary.retained, 1);
        assert_eq!(cohort.summary.dropped_gender, 1);
        assert_eq!(cohort.summary.dropped_outside_windows, 1);
        assert_eq!(cohort.summary.dropped_invalid_date, 1);
    }

    #[test]
    fn test_each_record_gets_exactly_one_period() {
        let rows = vec![
            row("M", 2019, 6, 1, Some(60.0)),
            row("F", 2020, 6, 1, Some(45.0)),
        ];
        let cohort = build_cohort(&rows, &StringencyTable::default(), &StudyConfig::default());
        assert_eq!(cohort.records[0].period, Period::Before);
        assert!(!cohort.records[0].treated());
        assert_eq!(cohort.records[1].period, Period::During);
        assert!(cohort.records[1].treated());
    }

    #[test]
    fn test_missing_value_propagates_to_flag() {
        let rows = vec![row("M", 2019, 6, 1, None)];
        let cohort = build_cohort(&rows, &StringencyTable::default(), &StudyConfig::default());
        assert_eq!(cohort.records[0].value, None);
        assert_eq!(cohort.records[0].deficient, None);
        assert_eq!(cohort.summary.missing_values, 1);
    }

    #[test]
    fn test_stringency_joined_only_for_during_period() {
        let csv = "date,stringency\n20200601,62.5\n20190601,99.0\n";
        let table = StringencyTable::from_reader(csv.as_bytes()).unwrap();
        let rows = vec![
            row("M", 2019, 6, 1, Some(60.0)),
            row("F", 2020, 6, 1, Some(45.0)),
        ];
        let cohort = build_cohort(&rows, &table, &StudyConfig::default());
        assert_eq!(cohort.records[0].stringency, None);
        assert_eq!(cohort.records[1].stringency, Some(62.5));
    }

    #[test]
    fn test_unknown_bracket_excluded_from_estimation_subset() {
        let mut unknown = row("M", 2019, 6, 1, Some(60.0));
        unknown.age_band = "weird".to_string();
        let rows = vec![unknown, row("F", 2019, 6, 2, Some(70.0))];
        let config = StudyConfig::default();
        let cohort = build_cohort(&rows, &StringencyTable::default(), &config);
        assert_eq!(cohort.summary.unknown_age_bracket, 1);
        assert_eq!(cohort.records.len(), 2);
        assert_eq!(cohort.estimation_records(&config).len(), 1);
    }
}
