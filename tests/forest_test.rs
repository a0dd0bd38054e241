//! Tests for causal-forest effect estimation

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use vitd_cohort::algorithm::forest::{
    CausalForest, ForestConfig, average_treatment_effect, encode_records, subgroup_effect,
};
use vitd_cohort::models::types::Season;
use vitd_cohort::models::{AgeBracket, Gender, MeasurementRecord, Period};
use chrono::NaiveDate;

/// Sum of 12 uniforms, centered: close enough to standard normal noise
fn noise(rng: &mut StdRng) -> f64 {
    (0..12).map(|_| rng.random::<f64>()).sum::<f64>() - 6.0
}

/// Synthetic cohort where the outcome depends on covariates and,
/// optionally, a constant treatment effect
fn synthetic(n: usize, effect: f64, seed: u64) -> Vec<MeasurementRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let brackets = [AgeBracket::Young, AgeBracket::Middle, AgeBracket::Senior];
    (0..n)
        .map(|_| {
            let treated = rng.random::<bool>();
            let bracket = brackets[rng.random_range(0..3)];
            let female = rng.random::<bool>();
            let month = rng.random_range(1..=12u32);
            let base = 50.0
                + 3.0 * bracket.ordinal().unwrap() as f64
                + 2.0 * if female { 1.0 } else { 0.0 }
                + 0.5 * f64::from(month);
            let value = base + if treated { effect } else { 0.0 } + 4.0 * noise(&mut rng);
            let year = if treated { 2021 } else { 2019 };
            MeasurementRecord {
                gender: if female { Gender::Female } else { Gender::Male },
                age_bracket: bracket,
                test_date: NaiveDate::from_ymd_opt(year, month, 10).unwrap(),
                test_month: month,
                season: Season::from_month(month),
                period: if treated { Period::During } else { Period::Before },
                value: Some(value),
                deficient: Some(value < 50.0),
                stringency: None,
            }
        })
        .collect()
}

fn test_config(seed: u64) -> ForestConfig {
    ForestConfig {
        trees: 150,
        max_depth: 4,
        seed,
        ..ForestConfig::default()
    }
}

#[test]
fn test_known_effect_recovered() {
    let records = synthetic(400, 5.0, 3);
    let data = encode_records(&records).unwrap();
    let forest = CausalForest::fit(&data, &test_config(3)).unwrap();
    let predictions = forest.predict_all(&data);
    let ate = average_treatment_effect(&data, &predictions).unwrap();

    assert_eq!(ate.n, 400);
    assert!(
        (ate.estimate - 5.0).abs() < 1.5,
        "estimate {} far from 5",
        ate.estimate
    );
    assert!(ate.standard_error > 0.0);
    assert!(ate.ci_lower < ate.estimate && ate.estimate < ate.ci_upper);
}

#[test]
fn test_zero_effect_intervals_cover_zero() {
    // Outcome independent of treatment given covariates: the 95% interval
    // must contain zero in nearly all repeated draws
    let draws = 20;
    let mut covered = 0;
    for seed in 0..draws {
        let records = synthetic(300, 0.0, 100 + seed);
        let data = encode_records(&records).unwrap();
        let forest = CausalForest::fit(&data, &test_config(seed)).unwrap();
        let predictions = forest.predict_all(&data);
        let ate = average_treatment_effect(&data, &predictions).unwrap();
        if ate.ci_lower <= 0.0 && 0.0 <= ate.ci_upper {
            covered += 1;
        }
    }
    assert!(covered >= 16, "zero covered in only {covered}/{draws} draws");
}

#[test]
fn test_forest_fit_is_deterministic_for_a_seed() {
    let records = synthetic(300, 2.0, 9);
    let data = encode_records(&records).unwrap();

    let run = |seed| {
        let forest = CausalForest::fit(&data, &test_config(seed)).unwrap();
        let predictions = forest.predict_all(&data);
        average_treatment_effect(&data, &predictions).unwrap().estimate
    };
    assert_eq!(run(5).to_bits(), run(5).to_bits());
}

#[test]
fn test_subgroup_estimates_carry_sample_sizes() {
    let records = synthetic(400, 3.0, 17);
    let data = encode_records(&records).unwrap();
    let forest = CausalForest::fit(&data, &test_config(17)).unwrap();
    let predictions = forest.predict_all(&data);

    let mask = data.subgroup_mask(&records, |r| r.gender == Gender::Female);
    let women = subgroup_effect(&data, &predictions, &mask, "women").unwrap();
    let expected_n = mask.iter().filter(|m| **m).count();
    assert_eq!(women.n, expected_n);
    assert!(women.n > 0 && women.n < 400);
    assert!(women.standard_error > 0.0);

    // An empty subgroup is degenerate, not a silent zero
    let empty_mask = vec![false; data.len()];
    assert!(subgroup_effect(&data, &predictions, &empty_mask, "none").is_err());
}

#[test]
fn test_importance_shares_are_normalized() {
    let records = synthetic(400, 0.0, 23);
    let data = encode_records(&records).unwrap();
    let forest = CausalForest::fit(&data, &test_config(23)).unwrap();
    let importance = forest.variable_importance();

    assert_eq!(importance.len(), 3);
    let total: f64 = importance.iter().map(|(_, share)| share).sum();
    assert!(total == 0.0 || (total - 1.0).abs() < 1e-9);
    for (_, share) in importance {
        assert!((0.0..=1.0).contains(&share));
    }
}
