//! Tests for the parallel resampling batch

use chrono::NaiveDate;
use vitd_cohort::algorithm::bootstrap::{BootstrapConfig, run_bootstrap};
use vitd_cohort::models::types::Season;
use vitd_cohort::models::{AgeBracket, Gender, MeasurementRecord, Period};

fn record(treated: bool, gender: Gender, month: u32, value: f64) -> MeasurementRecord {
    let year = if treated { 2021 } else { 2019 };
    MeasurementRecord {
        gender,
        age_bracket: AgeBracket::Middle,
        test_date: NaiveDate::from_ymd_opt(year, month, 10).unwrap(),
        test_month: month,
        season: Season::from_month(month),
        period: if treated { Period::During } else { Period::Before },
        value: Some(value),
        deficient: Some(value < 50.0),
        stringency: None,
    }
}

fn balanced_records(n_per_period: usize, shift: f64) -> Vec<MeasurementRecord> {
    let mut records = Vec::new();
    for i in 0..n_per_period {
        let gender = if i % 2 == 0 { Gender::Male } else { Gender::Female };
        let month = 1 + (i % 12) as u32;
        let spread = (i % 9) as f64;
        records.push(record(false, gender, month, 46.0 + spread));
        records.push(record(true, gender, month, 46.0 + shift + spread));
    }
    records
}

#[test]
fn test_same_seed_reproduces_every_estimate() {
    let records = balanced_records(60, 5.0);
    let config = BootstrapConfig {
        trials: 40,
        sample_fraction: 0.6,
        base_seed: 77,
        workers: 2,
        ..BootstrapConfig::default()
    };

    let first = run_bootstrap(&records, &config).unwrap();
    let second = run_bootstrap(&records, &config).unwrap();

    assert_eq!(first.estimates.len(), second.estimates.len());
    for (a, b) in first.estimates.iter().zip(&second.estimates) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    assert_eq!(first.point_estimate.to_bits(), second.point_estimate.to_bits());
}

#[test]
fn test_interval_brackets_the_true_shift() {
    let records = balanced_records(80, 5.0);
    let config = BootstrapConfig {
        trials: 200,
        sample_fraction: 0.5,
        base_seed: 2021,
        workers: 2,
        ..BootstrapConfig::default()
    };

    let result = run_bootstrap(&records, &config).unwrap();
    assert!(result.succeeded > 150);
    assert!((result.point_estimate - 5.0).abs() < 1.0);
    assert!(result.ci_lower <= 5.0 && 5.0 <= result.ci_upper);
    assert!(result.ci_lower < result.ci_upper);
}

#[test]
fn test_degenerate_trials_are_dropped_not_fatal() {
    // Two controls against twenty treated: many resamples miss both
    // controls and their trials must be excluded, not crash the batch
    let mut records = Vec::new();
    for i in 0..20 {
        records.push(record(true, Gender::Male, 1 + (i % 12) as u32, 50.0 + (i % 5) as f64));
    }
    records.push(record(false, Gender::Male, 3, 48.0));
    records.push(record(false, Gender::Male, 9, 52.0));

    let config = BootstrapConfig {
        trials: 60,
        sample_fraction: 0.5,
        base_seed: 11,
        workers: 2,
        ..BootstrapConfig::default()
    };

    let result = run_bootstrap(&records, &config).unwrap();
    assert_eq!(result.succeeded + result.failed, 60);
    assert!(result.failed > 0, "expected some one-period resamples");
    assert!(result.succeeded > 0, "expected some usable resamples");
    assert_eq!(result.estimates.len(), result.succeeded);
}
