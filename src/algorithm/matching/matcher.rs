//! Core matching algorithm implementation
//!
//! This module implements the Matcher struct which pairs during-period
//! records with before-period records by nearest propensity score, subject
//! to the configured exact constraints and caliper.

use std::time::{Duration, Instant};

use log::info;
use rand::prelude::*;
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::algorithm::matching::criteria::{MatchingConfig, MatchingCriteria};
use crate::error::{Result, StudyError};
use crate::models::{AgeBracket, Gender, MeasurementRecord};

/// One accepted pair of record indices into the input slice
#[derive(Debug, Clone, Copy)]
pub struct MatchedPair {
    /// Index of the during-period record
    pub treated_index: usize,
    /// Index of the before-period record
    pub control_index: usize,
    /// Absolute propensity-score distance of the pair
    pub distance: f64,
}

/// Result of one matching run
///
/// Every matched record belongs to exactly one pair; the matched set is a
/// strict subset of the input. Everything unmatched is counted, never
/// silently swallowed.
#[derive(Debug, Clone)]
pub struct MatchingResult {
    /// Accepted pairs, in the order they were claimed
    pub pairs: Vec<MatchedPair>,
    /// During-period records offered to the matcher
    pub treated_total: usize,
    /// Before-period records offered to the matcher
    pub control_total: usize,
    /// Matched fraction of during-period records
    pub match_rate: f64,
    /// During-period records left without a partner
    pub dropped_treated: usize,
    /// Before-period records left unclaimed
    pub dropped_controls: usize,
    /// Wall-clock time of the run
    pub matching_time: Duration,
}

impl MatchingResult {
    /// Materialize the matched subset with its weight column
    ///
    /// Weights are 1.0 for every matched record under 1:1 pairing.
    #[must_use]
    pub fn matched_records(
        &self,
        records: &[MeasurementRecord],
    ) -> (Vec<MeasurementRecord>, Vec<f64>) {
        let mut subset = Vec::with_capacity(self.pairs.len() * 2);
        for pair in &self.pairs {
            subset.push(records[pair.treated_index].clone());
            subset.push(records[pair.control_index].clone());
        }
        let weights = vec![1.0; subset.len()];
        (subset, weights)
    }

    /// Difference of mean values across pairs (during minus before)
    ///
    /// Pairs where either side has a missing value are skipped; an empty
    /// remainder is degenerate.
    pub fn estimate_mean_difference(&self, records: &[MeasurementRecord]) -> Result<f64> {
        let mut treated_sum = 0.0;
        let mut control_sum = 0.0;
        let mut n = 0usize;
        for pair in &self.pairs {
            if let (Some(t), Some(c)) = (
                records[pair.treated_index].value,
                records[pair.control_index].value,
            ) {
                treated_sum += t;
                control_sum += c;
                n += 1;
            }
        }
        if n == 0 {
            return Err(StudyError::degenerate(
                "no matched pair carries values on both sides".to_string(),
            ));
        }
        Ok((treated_sum - control_sum) / n as f64)
    }
}

/// Stratification key under the exact-match constraints
type ExactKey = (Option<AgeBracket>, Option<Gender>, Option<u32>);

/// Matcher for pairing during-period records with before-period records
#[derive(Debug)]
pub struct Matcher {
    /// Matching configuration
    config: MatchingConfig,
}

impl Matcher {
    /// Create a new matcher with the given configuration
    #[must_use]
    pub const fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Perform matching over the record slice using precomputed scores
    ///
    /// `scores` must align with `records` by index (one propensity score
    /// per record).
    pub fn perform_matching(
        &self,
        records: &[MeasurementRecord],
        scores: &[f64],
    ) -> Result<MatchingResult> {
        let start_time = Instant::now();

        if records.len() != scores.len() {
            return Err(StudyError::validation(format!(
                "records/scores length mismatch: {} vs {}",
                records.len(),
                scores.len()
            )));
        }

        let criteria = &self.config.criteria;
        let exact_key = |r: &MeasurementRecord| -> ExactKey {
            (
                criteria.exact_age_bracket.then_some(r.age_bracket),
                criteria.exact_gender.then_some(r.gender),
                criteria.exact_month.then_some(r.test_month),
            )
        };

        // Stratify both groups by the exact-match key
        let mut strata: FxHashMap<ExactKey, (Vec<usize>, Vec<usize>)> = FxHashMap::default();
        for (index, record) in records.iter().enumerate() {
            let entry = strata.entry(exact_key(record)).or_default();
            if record.treated() {
                entry.0.push(index);
            } else {
                entry.1.push(index);
            }
        }

        let treated_total = records.iter().filter(|r| r.treated()).count();
        let control_total = records.len() - treated_total;
        if treated_total == 0 || control_total == 0 {
            return Err(StudyError::validation(format!(
                "matching needs both periods, got {treated_total} treated and {control_total} controls"
            )));
        }

        info!(
            "Matching {treated_total} during-period records against {control_total} candidates in {} strata",
            strata.len()
        );

        // Deterministic stratum order keeps runs reproducible
        let mut stratum_keys: Vec<ExactKey> = strata.keys().copied().collect();
        stratum_keys.sort_unstable();

        let mut rng = self.config.random_seed.map(StdRng::seed_from_u64);
        let mut pairs = Vec::with_capacity(treated_total);
        for key in stratum_keys {
            let (treated, controls) = &strata[&key];
            match_stratum(treated, controls, scores, criteria, rng.as_mut(), &mut pairs);
        }

        let matched = pairs.len();
        let match_rate = matched as f64 / treated_total as f64;
        let result = MatchingResult {
            dropped_treated: treated_total - matched,
            dropped_controls: control_total - matched,
            pairs,
            treated_total,
            control_total,
            match_rate,
            matching_time: start_time.elapsed(),
        };

        info!(
            "Matching complete: {} pairs, match rate {:.1}% ({} treated and {} controls unmatched) in {:.2?}",
            matched,
            100.0 * result.match_rate,
            result.dropped_treated,
            result.dropped_controls,
            result.matching_time
        );

        Ok(result)
    }
}

/// Greedy nearest-neighbor pairing within one stratum
fn match_stratum(
    treated: &[usize],
    controls: &[usize],
    scores: &[f64],
    criteria: &MatchingCriteria,
    rng: Option<&mut StdRng>,
    pairs: &mut Vec<MatchedPair>,
) {
    if treated.is_empty() || controls.is_empty() {
        return;
    }

    // Controls sorted by score for binary-search lookup
    let mut sorted_controls: Vec<(f64, usize)> =
        controls.iter().map(|&i| (scores[i], i)).collect();
    sorted_controls.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut used = vec![false; sorted_controls.len()];

    // Claim order: score order by default, shuffled under a seed
    let mut order: Vec<usize> = treated.to_vec();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    if let Some(rng) = rng {
        order.shuffle(rng);
    }

    for case_index in order {
        let case_score = scores[case_index];
        let insert_at = sorted_controls
            .partition_point(|(score, _)| *score < case_score);

        // Scan outward from the insertion point for the nearest unused
        // candidate; stop each side once the caliper is exceeded
        let mut candidates: SmallVec<[(f64, usize); 8]> = SmallVec::new();
        let mut left = insert_at;
        while left > 0 {
            left -= 1;
            if used[left] {
                continue;
            }
            let distance = (case_score - sorted_controls[left].0).abs();
            if !criteria.within_caliper(distance) {
                break;
            }
            candidates.push((distance, left));
            break;
        }
        let mut right = insert_at;
        while right < sorted_controls.len() {
            if used[right] {
                right += 1;
                continue;
            }
            let distance = (sorted_controls[right].0 - case_score).abs();
            if !criteria.within_caliper(distance) {
                break;
            }
            candidates.push((distance, right));
            break;
        }

        if let Some(&(distance, position)) = candidates
            .iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
        {
            used[position] = true;
            pairs.push(MatchedPair {
                treated_index: case_index,
                control_index: sorted_controls[position].1,
                distance,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::matching::criteria::MatchingCriteria;
    use crate::models::types::Season;
    use crate::models::Period;
    use chrono::NaiveDate;

    fn record(treated: bool, bracket: AgeBracket, gender: Gender, value: f64) -> MeasurementRecord {
        let year = if treated { 2021 } else { 2019 };
        MeasurementRecord {
            gender,
            age_bracket: bracket,
            test_date: NaiveDate::from_ymd_opt(year, 6, 10).unwrap(),
            test_month: 6,
            season: Season::Summer,
            period: if treated { Period::During } else { Period::Before },
            value: Some(value),
            deficient: Some(value < 50.0),
            stringency: None,
        }
    }

    #[test]
    fn test_every_matched_record_in_exactly_one_pair() {
        let mut records = Vec::new();
        for i in 0..10 {
            records.push(record(true, AgeBracket::Middle, Gender::Male, 50.0 + f64::from(i)));
            records.push(record(false, AgeBracket::Middle, Gender::Male, 45.0 + f64::from(i)));
        }
        let scores: Vec<f64> = (0..records.len()).map(|i| 0.4 + 0.01 * i as f64).collect();
        let matcher = Matcher::new(MatchingConfig::default());
        let result = matcher.perform_matching(&records, &scores).unwrap();

        let mut seen = std::collections::HashSet::new();
        for pair in &result.pairs {
            assert!(seen.insert(pair.treated_index));
            assert!(seen.insert(pair.control_index));
            assert!(records[pair.treated_index].treated());
            assert!(!records[pair.control_index].treated());
        }
        assert!(result.pairs.len() <= result.treated_total);
    }

    #[test]
    fn test_exact_constraint_never_crossed() {
        let mut records = Vec::new();
        for i in 0..8 {
            let bracket = if i % 2 == 0 { AgeBracket::Young } else { AgeBracket::Senior };
            let gender = if i % 4 < 2 { Gender::Male } else { Gender::Female };
            records.push(record(true, bracket, gender, 50.0));
            records.push(record(false, bracket, gender, 48.0));
        }
        let scores = vec![0.5; records.len()];
        let criteria = MatchingCriteria::builder()
            .exact_age_bracket(true)
            .exact_gender(true)
            .build();
        let config = MatchingConfig::builder().criteria(criteria).build();
        let result = Matcher::new(config).perform_matching(&records, &scores).unwrap();

        assert_eq!(result.pairs.len(), 8);
        for pair in &result.pairs {
            let t = &records[pair.treated_index];
            let c = &records[pair.control_index];
            assert_eq!(t.age_bracket, c.age_bracket);
            assert_eq!(t.gender, c.gender);
        }
    }

    #[test]
    fn test_caliper_drops_distant_cases_and_reports_rate() {
        let records = vec![
            record(true, AgeBracket::Middle, Gender::Male, 50.0),
            record(true, AgeBracket::Middle, Gender::Male, 52.0),
            record(false, AgeBracket::Middle, Gender::Male, 49.0),
            record(false, AgeBracket::Middle, Gender::Male, 51.0),
        ];
        // Second treated record is far outside any caliper
        let scores = vec![0.50, 0.95, 0.51, 0.52];
        let criteria = MatchingCriteria::builder().caliper(Some(0.05)).build();
        let config = MatchingConfig::builder().criteria(criteria).build();
        let result = Matcher::new(config).perform_matching(&records, &scores).unwrap();

        assert_eq!(result.pairs.len(), 1);
        assert_eq!(result.dropped_treated, 1);
        assert!((result.match_rate - 0.5).abs() < 1e-12);
        assert_eq!(result.pairs[0].treated_index, 0);
    }

    #[test]
    fn test_matched_subset_is_strict_subset_with_unit_weights() {
        let records = vec![
            record(true, AgeBracket::Middle, Gender::Male, 55.0),
            record(false, AgeBracket::Middle, Gender::Male, 50.0),
            record(false, AgeBracket::Middle, Gender::Male, 47.0),
        ];
        let scores = vec![0.5, 0.5, 0.4];
        let result = Matcher::new(MatchingConfig::default())
            .perform_matching(&records, &scores)
            .unwrap();
        let (subset, weights) = result.matched_records(&records);
        assert_eq!(subset.len(), 2);
        assert!(subset.len() < records.len());
        assert!(weights.iter().all(|&w| (w - 1.0).abs() < f64::EPSILON));
        let diff = result.estimate_mean_difference(&records).unwrap();
        assert!((diff - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_seeded_claim_order_is_reproducible() {
        let mut records = Vec::new();
        for i in 0..12 {
            records.push(record(true, AgeBracket::Middle, Gender::Male, 50.0 + f64::from(i)));
            records.push(record(false, AgeBracket::Middle, Gender::Male, 45.0 + f64::from(i)));
        }
        let scores: Vec<f64> = (0..records.len()).map(|i| 0.3 + 0.015 * i as f64).collect();
        let config = MatchingConfig::builder().random_seed(99).build();

        let first = Matcher::new(config.clone()).perform_matching(&records, &scores).unwrap();
        let second = Matcher::new(config).perform_matching(&records, &scores).unwrap();

        assert_eq!(first.pairs.len(), second.pairs.len());
        for (a, b) in first.pairs.iter().zip(&second.pairs) {
            assert_eq!(a.treated_index, b.treated_index);
            assert_eq!(a.control_index, b.control_index);
        }
    }

    #[test]
    fn test_single_period_input_rejected() {
        let records = vec![record(true, AgeBracket::Middle, Gender::Male, 55.0)];
        let scores = vec![0.5];
        assert!(
            Matcher::new(MatchingConfig::default())
                .perform_matching(&records, &scores)
                .is_err()
        );
    }
}
