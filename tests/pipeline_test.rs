//! End-to-end tests over a synthetic cohort

use chrono::NaiveDate;
use vitd_cohort::algorithm::cohort::build_cohort;
use vitd_cohort::algorithm::matching::{Matcher, MatchingConfig, fit_propensity};
use vitd_cohort::algorithm::statistics::{overall_comparison, welch_t_test};
use vitd_cohort::config::StudyConfig;
use vitd_cohort::loader::load_measurements_from_reader;
use vitd_cohort::models::{MeasurementRecord, Period, StringencyTable};

/// 100 records split 50/50 across the periods with a known 5-unit shift
/// and no covariate imbalance
fn shifted_cohort() -> Vec<MeasurementRecord> {
    let mut csv = String::from(
        "gender,biomarker,age_band,cohort_year,test_month,test_day,value,value_text,diagnosis\n",
    );
    for i in 0..50 {
        let gender = if i % 2 == 0 { "M" } else { "F" };
        let age_band = 2 + (i % 3);
        let month = 1 + (i % 12);
        let spread = f64::from(i % 10);
        // Before period: mean around 50
        csv.push_str(&format!(
            "{gender},NPU10267,{age_band},2019,{month},14,{:.1},,\n",
            45.5 + spread
        ));
        // During period: the same distribution shifted up by 5
        csv.push_str(&format!(
            "{gender},NPU10267,{age_band},2021,{month},14,{:.1},,\n",
            50.5 + spread
        ));
    }

    let raw = load_measurements_from_reader(csv.as_bytes(), "NPU10267").unwrap();
    let cohort = build_cohort(&raw.rows, &StringencyTable::default(), &StudyConfig::default());
    assert_eq!(cohort.summary.retained, 100);
    cohort.records
}

#[test]
fn test_known_shift_recovered_with_significance() {
    let records = shifted_cohort();
    let before: Vec<f64> = records
        .iter()
        .filter(|r| r.period == Period::Before)
        .filter_map(|r| r.value)
        .collect();
    let during: Vec<f64> = records
        .iter()
        .filter(|r| r.period == Period::During)
        .filter_map(|r| r.value)
        .collect();
    assert_eq!(before.len(), 50);
    assert_eq!(during.len(), 50);

    let result = welch_t_test(&during, &before).unwrap();
    assert!((result.estimate - 5.0).abs() < 0.5);
    assert!(result.p_value < 0.05);
}

#[test]
fn test_matching_preserves_shift_on_balanced_cohort() {
    let records = shifted_cohort();
    let (_, scores) = fit_propensity(&records).unwrap();
    let matching = Matcher::new(MatchingConfig::default())
        .perform_matching(&records, &scores)
        .unwrap();

    // Perfectly balanced periods: every during-period record finds a partner
    assert!(matching.match_rate > 0.95);
    let estimate = matching.estimate_mean_difference(&records).unwrap();
    assert!((estimate - 5.0).abs() < 1.0);
}

#[test]
fn test_overall_table_reports_the_shift() {
    let records = shifted_cohort();
    let table = overall_comparison(&records);
    let row = &table.strata[0];
    assert_eq!(row.before_n, 50);
    assert_eq!(row.during_n, 50);
    assert!((row.mean_diff.unwrap() - 5.0).abs() < 0.5);
    assert!(row.t_p_value.unwrap() < 0.05);
}

#[test]
fn test_censored_and_missing_values_flow_through() {
    let csv = "gender,biomarker,age_band,cohort_year,test_month,test_day,value,value_text,diagnosis\n\
               M,NPU10267,4,2019,6,14,,<20,E55\n\
               F,NPU10267,4,2019,6,15,,pending,\n\
               F,NPU10267,4,2021,6,15,61.0,,\n";
    let raw = load_measurements_from_reader(csv.as_bytes(), "NPU10267").unwrap();
    let cohort = build_cohort(&raw.rows, &StringencyTable::default(), &StudyConfig::default());

    assert_eq!(cohort.records[0].value, Some(20.0));
    assert_eq!(cohort.records[0].deficient, Some(true));
    assert_eq!(cohort.records[1].value, None);
    assert_eq!(cohort.records[1].deficient, None);
    assert_eq!(cohort.records[2].deficient, Some(false));
    assert_eq!(cohort.summary.missing_values, 1);
}

#[test]
fn test_period_boundaries_respected_end_to_end() {
    let csv = "gender,biomarker,age_band,cohort_year,test_month,test_day,value,value_text,diagnosis\n\
               M,NPU10267,4,2018,2,28,50.0,,\n\
               M,NPU10267,4,2018,3,1,50.0,,\n\
               M,NPU10267,4,2020,2,29,50.0,,\n\
               M,NPU10267,4,2020,3,1,50.0,,\n\
               M,NPU10267,4,2022,2,28,50.0,,\n\
               M,NPU10267,4,2022,3,1,50.0,,\n";
    let raw = load_measurements_from_reader(csv.as_bytes(), "NPU10267").unwrap();
    let cohort = build_cohort(&raw.rows, &StringencyTable::default(), &StudyConfig::default());

    assert_eq!(cohort.summary.retained, 4);
    assert_eq!(cohort.summary.dropped_outside_windows, 2);
    let before = cohort.period_records(Period::Before).len();
    let during = cohort.period_records(Period::During).len();
    assert_eq!(before, 2);
    assert_eq!(during, 2);
    assert_eq!(
        cohort.records[0].test_date,
        NaiveDate::from_ymd_opt(2018, 3, 1).unwrap()
    );
}
