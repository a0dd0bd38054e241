//! Descriptive statistics over the labeled cohort
//!
//! Builds the before/during comparison tables: group-wise means,
//! deficiency-rate counts and per-stratum hypothesis tests. A failed test
//! inside one stratum becomes a missing p-value for that row only; the
//! rest of the table survives.

use itertools::Itertools;
use log::debug;

use crate::algorithm::statistics::hypothesis::{chi_square_test, mean, variance, welch_t_test};
use crate::algorithm::statistics::regression::{LinearFit, linear_regression};
use crate::error::{Result, StudyError};
use crate::models::types::Season;
use crate::models::{AgeBracket, Gender, MeasurementRecord, Period};

/// Deficiency counts within one group: (deficient, classified)
///
/// `classified` excludes records whose value was missing; missing never
/// counts as "not deficient".
pub type DeficiencyCount = (usize, usize);

/// One stratum's before/during comparison
#[derive(Debug, Clone)]
pub struct StratumComparison {
    /// Stratum label (season, gender, bracket or month)
    pub label: String,
    /// Number of before-period records in the stratum
    pub before_n: usize,
    /// Number of during-period records in the stratum
    pub during_n: usize,
    /// Mean value before, when any values are present
    pub before_mean: Option<f64>,
    /// Mean value during, when any values are present
    pub during_mean: Option<f64>,
    /// Difference of means (during minus before)
    pub mean_diff: Option<f64>,
    /// Welch t-test p-value for the mean difference; `None` when the test
    /// degenerated
    pub t_p_value: Option<f64>,
    /// Deficiency counts before
    pub before_deficient: DeficiencyCount,
    /// Deficiency counts during
    pub during_deficient: DeficiencyCount,
    /// Chi-square p-value for the deficiency contrast; `None` when the
    /// table was degenerate
    pub chi2_p_value: Option<f64>,
}

/// A titled collection of stratum comparisons
#[derive(Debug, Clone)]
pub struct ComparisonTable {
    /// Table title
    pub title: String,
    /// One row per stratum, in fixed display order
    pub strata: Vec<StratumComparison>,
}

fn values_of<'a>(records: impl Iterator<Item = &'a MeasurementRecord>) -> Vec<f64> {
    records.filter_map(|r| r.value).collect()
}

fn deficiency_count<'a>(records: impl Iterator<Item = &'a MeasurementRecord>) -> DeficiencyCount {
    let mut deficient = 0usize;
    let mut classified = 0usize;
    for r in records {
        if let Some(flag) = r.deficient {
            classified += 1;
            if flag {
                deficient += 1;
            }
        }
    }
    (deficient, classified)
}

/// Compare before/during within one subset of records
fn compare_subset(label: &str, records: &[&MeasurementRecord]) -> StratumComparison {
    let before: Vec<&MeasurementRecord> = records
        .iter()
        .copied()
        .filter(|r| r.period == Period::Before)
        .collect();
    let during: Vec<&MeasurementRecord> = records
        .iter()
        .copied()
        .filter(|r| r.period == Period::During)
        .collect();

    let before_values = values_of(before.iter().copied());
    let during_values = values_of(during.iter().copied());

    let before_mean = (!before_values.is_empty()).then(|| mean(&before_values));
    let during_mean = (!during_values.is_empty()).then(|| mean(&during_values));
    let mean_diff = match (before_mean, during_mean) {
        (Some(b), Some(d)) => Some(d - b),
        _ => None,
    };

    let t_p_value = match welch_t_test(&during_values, &before_values) {
        Ok(result) => Some(result.p_value),
        Err(e) => {
            debug!("t-test skipped for stratum {label}: {e}");
            None
        }
    };

    let before_deficient = deficiency_count(before.iter().copied());
    let during_deficient = deficiency_count(during.iter().copied());
    let table = vec![
        vec![
            before_deficient.0 as u64,
            (before_deficient.1 - before_deficient.0) as u64,
        ],
        vec![
            during_deficient.0 as u64,
            (during_deficient.1 - during_deficient.0) as u64,
        ],
    ];
    let chi2_p_value = match chi_square_test(&table) {
        Ok(result) => Some(result.p_value),
        Err(e) => {
            debug!("chi-square skipped for stratum {label}: {e}");
            None
        }
    };

    StratumComparison {
        label: label.to_string(),
        before_n: before.len(),
        during_n: during.len(),
        before_mean,
        during_mean,
        mean_diff,
        t_p_value,
        before_deficient,
        during_deficient,
        chi2_p_value,
    }
}

/// Overall before/during comparison as a single-stratum table
#[must_use]
pub fn overall_comparison(records: &[MeasurementRecord]) -> ComparisonTable {
    let all: Vec<&MeasurementRecord> = records.iter().collect();
    ComparisonTable {
        title: "Overall period comparison".to_string(),
        strata: vec![compare_subset("all", &all)],
    }
}

/// Before/during comparison stratified by season
#[must_use]
pub fn compare_by_season(records: &[MeasurementRecord]) -> ComparisonTable {
    let strata = [Season::Winter, Season::Spring, Season::Summer, Season::Autumn]
        .into_iter()
        .map(|season| {
            let subset: Vec<&MeasurementRecord> =
                records.iter().filter(|r| r.season == season).collect();
            compare_subset(season.label(), &subset)
        })
        .collect();
    ComparisonTable {
        title: "Period comparison by season".to_string(),
        strata,
    }
}

/// Before/during comparison stratified by gender
#[must_use]
pub fn compare_by_gender(records: &[MeasurementRecord]) -> ComparisonTable {
    let strata = [Gender::Male, Gender::Female]
        .into_iter()
        .map(|gender| {
            let subset: Vec<&MeasurementRecord> =
                records.iter().filter(|r| r.gender == gender).collect();
            compare_subset(gender.label(), &subset)
        })
        .collect();
    ComparisonTable {
        title: "Period comparison by gender".to_string(),
        strata,
    }
}

/// Before/during comparison stratified by age bracket
///
/// Includes the `Unknown` bracket so its weight in the raw data stays
/// visible even though matching drops it.
#[must_use]
pub fn compare_by_age_bracket(records: &[MeasurementRecord]) -> ComparisonTable {
    let strata = [
        AgeBracket::Young,
        AgeBracket::Middle,
        AgeBracket::Senior,
        AgeBracket::Unknown,
    ]
    .into_iter()
    .filter_map(|bracket| {
        let subset: Vec<&MeasurementRecord> =
            records.iter().filter(|r| r.age_bracket == bracket).collect();
        if subset.is_empty() && bracket == AgeBracket::Unknown {
            None
        } else {
            Some(compare_subset(bracket.label(), &subset))
        }
    })
    .collect();
    ComparisonTable {
        title: "Period comparison by age bracket".to_string(),
        strata,
    }
}

/// Monthly mean values for one period, in calendar-month order
///
/// Feeds the monthly line chart; months with no values are skipped.
#[must_use]
pub fn monthly_means(records: &[MeasurementRecord], period: Period) -> Vec<(u32, f64, usize)> {
    let by_month = records
        .iter()
        .filter(|r| r.period == period)
        .filter_map(|r| r.value.map(|v| (r.test_month, v)))
        .into_group_map();

    by_month
        .into_iter()
        .sorted_by_key(|(month, _)| *month)
        .map(|(month, values)| (month, mean(&values), values.len()))
        .collect()
}

/// Mean and standard deviation of values in one period
#[must_use]
pub fn period_mean_sd(records: &[MeasurementRecord], period: Period) -> Option<(f64, f64, usize)> {
    let values: Vec<f64> = records
        .iter()
        .filter(|r| r.period == period)
        .filter_map(|r| r.value)
        .collect();
    if values.len() < 2 {
        return None;
    }
    Some((mean(&values), variance(&values).sqrt(), values.len()))
}

/// Association between stringency and measured level on the during subset
///
/// Fits `value ~ 1 + stringency` over during-period records that carry both
/// a value and a joined stringency score.
pub fn stringency_association(records: &[MeasurementRecord]) -> Result<LinearFit> {
    let (xs, ys): (Vec<Vec<f64>>, Vec<f64>) = records
        .iter()
        .filter(|r| r.period == Period::During)
        .filter_map(|r| match (r.stringency, r.value) {
            (Some(s), Some(v)) => Some((vec![s], v)),
            _ => None,
        })
        .unzip();

    if xs.is_empty() {
        return Err(StudyError::degenerate(
            "no during-period records carry both stringency and value".to_string(),
        ));
    }
    linear_regression(&xs, &ys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(
        period: Period,
        season: Season,
        gender: Gender,
        value: Option<f64>,
        deficient: Option<bool>,
    ) -> MeasurementRecord {
        let (year, month) = match (period, season) {
            (Period::Before, Season::Winter) => (2019, 1),
            (Period::Before, _) => (2019, 6),
            (Period::During, Season::Winter) => (2021, 1),
            (Period::During, _) => (2021, 6),
        };
        MeasurementRecord {
            gender,
            age_bracket: AgeBracket::Middle,
            test_date: NaiveDate::from_ymd_opt(year, month, 15).unwrap(),
            test_month: month,
            season,
            period,
            value,
            deficient,
            stringency: None,
        }
    }

    #[test]
    fn test_degenerate_stratum_keeps_table_alive() {
        // Winter has data only before; its tests fail but other rows keep
        // their p-values
        let mut records = Vec::new();
        for i in 0..20 {
            let v = 40.0 + f64::from(i % 7);
            records.push(record(
                Period::Before,
                Season::Summer,
                Gender::Male,
                Some(v),
                Some(v < 50.0),
            ));
            let w = 52.0 + f64::from(i % 7);
            records.push(record(
                Period::During,
                Season::Summer,
                Gender::Male,
                Some(w),
                Some(w < 50.0),
            ));
        }
        records.push(record(
            Period::Before,
            Season::Winter,
            Gender::Female,
            Some(30.0),
            Some(true),
        ));

        let table = compare_by_season(&records);
        let winter = &table.strata[0];
        assert_eq!(winter.label, "winter");
        assert!(winter.t_p_value.is_none());
        assert!(winter.chi2_p_value.is_none());

        let summer = &table.strata[2];
        assert_eq!(summer.label, "summer");
        assert!(summer.t_p_value.is_some());
        assert!((summer.mean_diff.unwrap() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_values_excluded_from_deficiency_counts() {
        let records = vec![
            record(Period::Before, Season::Summer, Gender::Male, None, None),
            record(
                Period::Before,
                Season::Summer,
                Gender::Male,
                Some(30.0),
                Some(true),
            ),
        ];
        let table = overall_comparison(&records);
        assert_eq!(table.strata[0].before_deficient, (1, 1));
        assert_eq!(table.strata[0].before_n, 2);
    }

    #[test]
    fn test_monthly_means_ordered() {
        let mut records = vec![
            record(Period::During, Season::Summer, Gender::Male, Some(60.0), Some(false)),
            record(Period::During, Season::Winter, Gender::Male, Some(40.0), Some(true)),
        ];
        records.push(record(
            Period::During,
            Season::Winter,
            Gender::Female,
            Some(44.0),
            Some(true),
        ));
        let means = monthly_means(&records, Period::During);
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].0, 1);
        assert!((means[0].1 - 42.0).abs() < 1e-9);
        assert_eq!(means[0].2, 2);
        assert_eq!(means[1].0, 6);
    }
}
