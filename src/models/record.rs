//! Measurement record models
//!
//! `RawMeasurementRow` mirrors the measurement CSV as stored;
//! `MeasurementRecord` is the validated, labeled record the pipeline stages
//! operate on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::types::{AgeBracket, Gender, Period, Season};

/// One row of the measurement CSV, as stored
///
/// The value is split across two columns: a numeric column and a text column
/// holding censored results such as `<20`. Either may be empty.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMeasurementRow {
    /// Raw gender code (`M`, `F`, other codes are dropped)
    pub gender: String,
    /// Biomarker analysis code
    pub biomarker: String,
    /// Ordinal ten-year age-band code
    pub age_band: String,
    /// Calendar year of the test
    pub cohort_year: i32,
    /// Calendar month of the test (1-12)
    pub test_month: u32,
    /// Day of month of the test
    pub test_day: u32,
    /// Numeric result, when reported numerically
    pub value: Option<f64>,
    /// Censored result string, e.g. `<20`
    pub value_text: Option<String>,
    /// Referring diagnosis code
    pub diagnosis: Option<String>,
}

/// A validated, labeled measurement record
///
/// Records are independent rows; there is no identity beyond position in the
/// cohort vector and no lifecycle beyond filter/derive/aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementRecord {
    /// Subject gender
    pub gender: Gender,
    /// Collapsed age bracket
    pub age_bracket: AgeBracket,
    /// Full test date
    pub test_date: NaiveDate,
    /// Calendar month of the test (1-12)
    pub test_month: u32,
    /// Season bucket for the test date
    pub season: Season,
    /// Study period the test date falls in
    pub period: Period,
    /// Resolved biomarker value; `None` when the result was unparseable
    pub value: Option<f64>,
    /// Deficiency flag; `None` propagates a missing value
    pub deficient: Option<bool>,
    /// Policy stringency score joined by test date (during-period only)
    pub stringency: Option<f64>,
}

impl MeasurementRecord {
    /// Binary treatment indicator: measured during the pandemic window
    #[must_use]
    pub fn treated(&self) -> bool {
        self.period == Period::During
    }
}
