//! Resampled (bootstrap) inference over the matching procedure
//!
//! Repeats N independent trials: draw a random fraction of the cohort,
//! refit the propensity model, rematch, and record the matched
//! difference-of-means estimate. Trials run on a dedicated worker pool
//! sized to the machine; each trial derives its own seed from the base
//! seed, so a rerun with the same configuration reproduces every estimate
//! bit for bit. A degenerate trial is counted and excluded, never a crash
//! and never a sentinel value.

use indicatif::ParallelProgressIterator;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::algorithm::matching::{MatchingConfig, Matcher, fit_propensity};
use crate::error::{Result, StudyError};
use crate::models::MeasurementRecord;
use crate::utils::progress;

/// Configuration for the resampling batch
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Number of independent trials
    pub trials: usize,
    /// Fraction of the cohort drawn (without replacement) per trial
    pub sample_fraction: f64,
    /// Base seed; trial `t` runs with `base_seed + t`
    pub base_seed: u64,
    /// Worker threads for the trial pool
    pub workers: usize,
    /// Matching configuration applied inside every trial
    pub matching: MatchingConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            trials: 1000,
            sample_fraction: 0.5,
            base_seed: 20_220_301,
            workers: default_workers(),
            matching: MatchingConfig::default(),
        }
    }
}

/// Worker count: available cores minus one, at least one
#[must_use]
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Aggregated outcome of the resampling batch
#[derive(Debug, Clone)]
pub struct BootstrapResult {
    /// Estimates from successful trials, in trial order
    pub estimates: Vec<f64>,
    /// Trials that produced an estimate
    pub succeeded: usize,
    /// Trials excluded after a degenerate matching or estimation step
    pub failed: usize,
    /// Mean of the successful estimates
    pub point_estimate: f64,
    /// Empirical 2.5th percentile of the estimates
    pub ci_lower: f64,
    /// Empirical 97.5th percentile of the estimates
    pub ci_upper: f64,
}

/// Run the resampling batch over the cohort
///
/// The record slice is broadcast once by shared reference; workers never
/// communicate, and results are joined synchronously in trial order.
pub fn run_bootstrap(
    records: &[MeasurementRecord],
    config: &BootstrapConfig,
) -> Result<BootstrapResult> {
    if records.len() < 2 {
        return Err(StudyError::validation(format!(
            "bootstrap needs at least 2 records, got {}",
            records.len()
        )));
    }
    if !(0.0..=1.0).contains(&config.sample_fraction) || config.sample_fraction == 0.0 {
        return Err(StudyError::validation(format!(
            "sample fraction must be in (0, 1], got {}",
            config.sample_fraction
        )));
    }

    let sample_size = ((records.len() as f64 * config.sample_fraction).round() as usize)
        .clamp(2, records.len());
    info!(
        "Bootstrap: {} trials of {} records on {} workers",
        config.trials, sample_size, config.workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| StudyError::Estimation(format!("worker pool: {e}")))?;

    let pb = progress::create_progress_bar(config.trials as u64, Some("Resampling trials"));
    let outcomes: Vec<std::result::Result<f64, String>> = pool.install(|| {
        (0..config.trials as u64)
            .into_par_iter()
            .progress_with(pb.clone())
            .map(|trial| {
                run_trial(records, config, sample_size, trial).map_err(|e| e.to_string())
            })
            .collect()
    });
    progress::finish_progress_bar(&pb, Some("Resampling complete"));

    let mut estimates = Vec::with_capacity(outcomes.len());
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(estimate) => estimates.push(estimate),
            Err(_) => failed += 1,
        }
    }

    let succeeded = estimates.len();
    if succeeded == 0 {
        return Err(StudyError::degenerate(
            "every bootstrap trial degenerated".to_string(),
        ));
    }
    if failed > 0 {
        warn!("Bootstrap: {failed} of {} trials dropped as degenerate", config.trials);
    }

    let point_estimate = estimates.iter().sum::<f64>() / succeeded as f64;
    let ci_lower = percentile(&estimates, 2.5);
    let ci_upper = percentile(&estimates, 97.5);

    info!(
        "Bootstrap result: {point_estimate:.3} [{ci_lower:.3}, {ci_upper:.3}] from {succeeded} trials ({failed} dropped)"
    );

    Ok(BootstrapResult {
        estimates,
        succeeded,
        failed,
        point_estimate,
        ci_lower,
        ci_upper,
    })
}

/// One (sample, match, estimate) trial
fn run_trial(
    records: &[MeasurementRecord],
    config: &BootstrapConfig,
    sample_size: usize,
    trial: u64,
) -> Result<f64> {
    let mut rng = StdRng::seed_from_u64(config.base_seed.wrapping_add(trial));
    let chosen = rand::seq::index::sample(&mut rng, records.len(), sample_size);
    let subset: Vec<MeasurementRecord> =
        chosen.into_iter().map(|i| records[i].clone()).collect();

    let (_, scores) = fit_propensity(&subset)?;
    let matcher = Matcher::new(config.matching.clone());
    let result = matcher.perform_matching(&subset, &scores)?;
    result.estimate_mean_difference(&subset)
}

/// Empirical percentile with linear interpolation between order statistics
#[must_use]
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let weight = rank - low as f64;
        sorted[low] * (1.0 - weight) + sorted[high] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&values, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&values, 50.0) - 3.0).abs() < 1e-12);
        assert!((percentile(&values, 100.0) - 5.0).abs() < 1e-12);
        assert!((percentile(&values, 25.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_workers_leaves_one_core() {
        assert!(default_workers() >= 1);
        assert!(default_workers() <= num_cpus::get());
    }

    #[test]
    fn test_empty_cohort_rejected() {
        let config = BootstrapConfig {
            trials: 2,
            workers: 1,
            ..BootstrapConfig::default()
        };
        assert!(run_bootstrap(&[], &config).is_err());
    }
}
