//! Common domain type definitions
//!
//! This module contains the label enums shared across the cohort pipeline:
//! gender, study period, season and age bracket.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Gender of a subject
///
/// Only `Male` and `Female` are retained in the analysis cohort; records
/// carrying any other code are dropped during ingestion with their count
/// reported (see `loader::IngestSummary`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Gender {
    /// Male gender
    Male,
    /// Female gender
    Female,
}

impl Gender {
    /// Parse a raw gender code, returning `None` for codes outside the
    /// retained categories
    #[must_use]
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" | "1" => Some(Self::Male),
            "f" | "female" | "2" => Some(Self::Female),
            _ => None,
        }
    }

    /// Short display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }
}

/// Study period relative to the pandemic onset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Period {
    /// Pre-pandemic calendar window
    Before,
    /// Pandemic calendar window
    During,
}

impl Period {
    /// Short display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::During => "during",
        }
    }
}

/// The two disjoint calendar windows that define the study periods
///
/// A date outside both windows maps to no period and the record is excluded
/// from all period-based analyses.
#[derive(Debug, Clone)]
pub struct PeriodWindows {
    /// Inclusive start and end of the pre-pandemic window
    pub before: (NaiveDate, NaiveDate),
    /// Inclusive start and end of the pandemic window
    pub during: (NaiveDate, NaiveDate),
}

impl Default for PeriodWindows {
    fn default() -> Self {
        Self {
            before: (
                NaiveDate::from_ymd_opt(2018, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(),
            ),
            during: (
                NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2022, 2, 28).unwrap(),
            ),
        }
    }
}

impl PeriodWindows {
    /// Assign a date to a study period, or `None` if it falls outside both
    /// windows
    #[must_use]
    pub fn assign(&self, date: NaiveDate) -> Option<Period> {
        if date >= self.before.0 && date <= self.before.1 {
            Some(Period::Before)
        } else if date >= self.during.0 && date <= self.during.1 {
            Some(Period::During)
        } else {
            None
        }
    }
}

/// Meteorological season derived from the test month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Map a calendar month (1-12) to its season bucket
    ///
    /// # Panics
    ///
    /// Panics if `month` is outside 1-12; callers validate months during
    /// ingestion.
    #[must_use]
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Self::Winter,
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Autumn,
            _ => panic!("month out of range: {month}"),
        }
    }

    /// Season for a full date
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_month(date.month())
    }

    /// Short display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
        }
    }
}

/// Coarse age bracket collapsed from the ordinal source category
///
/// The source data carries ten-year age-band codes (1 through 9). These are
/// collapsed into three analysis brackets; codes outside the lookup map to
/// `Unknown`. Whether `Unknown` records are kept is a caller decision:
/// descriptive tables keep them, matching and causal estimation drop them
/// and report the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AgeBracket {
    /// Bands 1-3 (under 30 years)
    Young,
    /// Bands 4-6 (30-59 years)
    Middle,
    /// Bands 7-9 (60 years and over)
    Senior,
    /// Catch-all for unmapped source codes
    Unknown,
}

impl AgeBracket {
    /// Collapse an ordinal source band code into an analysis bracket
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().parse::<u8>() {
            Ok(1..=3) => Self::Young,
            Ok(4..=6) => Self::Middle,
            Ok(7..=9) => Self::Senior,
            _ => Self::Unknown,
        }
    }

    /// Ordinal used when the bracket is integer-encoded for numeric models
    #[must_use]
    pub const fn ordinal(self) -> Option<u8> {
        match self {
            Self::Young => Some(0),
            Self::Middle => Some(1),
            Self::Senior => Some(2),
            Self::Unknown => None,
        }
    }

    /// Short display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Young => "<30",
            Self::Middle => "30-59",
            Self::Senior => "60+",
            Self::Unknown => "unknown",
        }
    }
}
