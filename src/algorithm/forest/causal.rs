//! Causal forest estimation
//!
//! Grows an ensemble of honest causal trees on seeded half-samples and
//! aggregates them into a population average treatment effect with a
//! standard error, per-covariate importance scores, and subgroup
//! sensitivity estimates that always carry their sample size.

use indicatif::ParallelProgressIterator;
use log::info;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::algorithm::forest::data::ForestData;
use crate::algorithm::forest::tree::{CausalTree, LeafEstimate, TreeParams};
use crate::error::{Result, StudyError};
use crate::utils::progress;

/// Configuration for forest growth
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees
    pub trees: usize,
    /// Fraction of rows subsampled (without replacement) per tree; half of
    /// the subsample grows structure, the other half estimates leaves
    pub sample_fraction: f64,
    /// Features tried per split; defaults to ceil(sqrt(p)) when `None`
    pub mtry: Option<usize>,
    /// Minimum treated observations per child
    pub min_treated: usize,
    /// Minimum control observations per child
    pub min_control: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Base seed; tree `b` grows with `seed + b`
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 400,
            sample_fraction: 0.5,
            mtry: None,
            min_treated: 5,
            min_control: 5,
            max_depth: 10,
            seed: 42,
        }
    }
}

/// Forest-averaged predictions per data row
#[derive(Debug, Clone)]
pub struct ForestPredictions {
    /// Conditional treatment effect per row
    pub tau: Vec<f64>,
    /// Treated-arm conditional mean per row
    pub mu1: Vec<f64>,
    /// Control-arm conditional mean per row
    pub mu0: Vec<f64>,
}

/// A population or subgroup treatment-effect estimate
#[derive(Debug, Clone)]
pub struct EffectEstimate {
    /// Group label ("population" or the subgroup description)
    pub label: String,
    /// Rows the estimate is computed over; small values flag unstable
    /// subgroup estimates, so this is always reported alongside
    pub n: usize,
    /// Average treatment effect
    pub estimate: f64,
    /// Standard error of the estimate
    pub standard_error: f64,
    /// Lower bound of the 95% interval (estimate - 1.96 SE)
    pub ci_lower: f64,
    /// Upper bound of the 95% interval (estimate + 1.96 SE)
    pub ci_upper: f64,
}

/// A fitted causal forest
#[derive(Debug)]
pub struct CausalForest {
    trees: Vec<CausalTree>,
    /// Trees discarded because their estimation half was one-armed
    pub discarded_trees: usize,
    feature_names: Vec<String>,
}

impl CausalForest {
    /// Grow the forest over the data
    pub fn fit(data: &ForestData, config: &ForestConfig) -> Result<Self> {
        if data.len() < 4 * (config.min_treated + config.min_control) {
            return Err(StudyError::Estimation(format!(
                "too few rows ({}) to grow an honest forest",
                data.len()
            )));
        }

        let mtry = config
            .mtry
            .unwrap_or_else(|| (data.feature_count() as f64).sqrt().ceil() as usize)
            .clamp(1, data.feature_count());
        let params = TreeParams {
            mtry,
            min_treated: config.min_treated,
            min_control: config.min_control,
            max_depth: config.max_depth,
        };
        let subsample_size = ((data.len() as f64 * config.sample_fraction) as usize)
            .clamp(2, data.len());

        let pb = progress::create_progress_bar(config.trees as u64, Some("Growing causal forest"));
        let grown: Vec<Option<CausalTree>> = (0..config.trees as u64)
            .into_par_iter()
            .progress_with(pb.clone())
            .map(|b| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(b));
                let mut rows = rand::seq::index::sample(&mut rng, data.len(), subsample_size)
                    .into_vec();
                rows.shuffle(&mut rng);
                let (grow_rows, est_rows) = rows.split_at(rows.len() / 2);
                CausalTree::grow(data, grow_rows, est_rows, &params, &mut rng)
            })
            .collect();
        progress::finish_progress_bar(&pb, Some("Forest grown"));

        let total = grown.len();
        let trees: Vec<CausalTree> = grown.into_iter().flatten().collect();
        let discarded_trees = total - trees.len();
        if trees.is_empty() {
            return Err(StudyError::Estimation(
                "every tree was discarded; both arms are too sparse".to_string(),
            ));
        }
        info!(
            "Causal forest: {} trees grown ({} discarded)",
            trees.len(),
            discarded_trees
        );

        Ok(Self {
            trees,
            discarded_trees,
            feature_names: data.feature_names.clone(),
        })
    }

    /// Forest-averaged predictions for every data row
    #[must_use]
    pub fn predict_all(&self, data: &ForestData) -> ForestPredictions {
        let n = data.len();
        let mut tau = vec![0.0_f64; n];
        let mut mu1 = vec![0.0_f64; n];
        let mut mu0 = vec![0.0_f64; n];
        for tree in &self.trees {
            for (row_index, row) in data.features.iter().enumerate() {
                let LeafEstimate {
                    tau: t,
                    mu1: m1,
                    mu0: m0,
                } = tree.predict(row);
                tau[row_index] += t;
                mu1[row_index] += m1;
                mu0[row_index] += m0;
            }
        }
        let b = self.trees.len() as f64;
        for values in [&mut tau, &mut mu1, &mut mu0] {
            for v in values.iter_mut() {
                *v /= b;
            }
        }
        ForestPredictions { tau, mu1, mu0 }
    }

    /// Per-covariate importance: split counts weighted by depth, normalized
    /// to sum to one
    #[must_use]
    pub fn variable_importance(&self) -> Vec<(String, f64)> {
        let mut weights: FxHashMap<usize, f64> = FxHashMap::default();
        for tree in &self.trees {
            for &(feature, depth) in &tree.splits {
                *weights.entry(feature).or_insert(0.0) += 0.5_f64.powi(depth as i32);
            }
        }
        let total: f64 = weights.values().sum();
        self.feature_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let weight = weights.get(&index).copied().unwrap_or(0.0);
                let share = if total > 0.0 { weight / total } else { 0.0 };
                (name.clone(), share)
            })
            .collect()
    }
}

/// Doubly-robust scores behind the effect estimates
fn aipw_scores(data: &ForestData, predictions: &ForestPredictions) -> Vec<f64> {
    let e = data.treated_fraction().clamp(0.01, 0.99);
    (0..data.len())
        .map(|i| {
            let y = data.outcome[i];
            if data.treatment[i] {
                predictions.tau[i] + (y - predictions.mu1[i]) / e
            } else {
                predictions.tau[i] - (y - predictions.mu0[i]) / (1.0 - e)
            }
        })
        .collect()
}

fn estimate_from_scores(label: &str, scores: &[f64]) -> Result<EffectEstimate> {
    let n = scores.len();
    if n < 2 {
        return Err(StudyError::degenerate(format!(
            "effect estimate for {label} has {n} rows"
        )));
    }
    let estimate = scores.iter().sum::<f64>() / n as f64;
    let var = scores.iter().map(|s| (s - estimate).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    let standard_error = (var / n as f64).sqrt();
    Ok(EffectEstimate {
        label: label.to_string(),
        n,
        estimate,
        standard_error,
        ci_lower: estimate - 1.96 * standard_error,
        ci_upper: estimate + 1.96 * standard_error,
    })
}

/// Population average treatment effect with its 95% interval
pub fn average_treatment_effect(
    data: &ForestData,
    predictions: &ForestPredictions,
) -> Result<EffectEstimate> {
    let scores = aipw_scores(data, predictions);
    estimate_from_scores("population", &scores)
}

/// Treatment effect restricted to a subgroup mask
///
/// The mask aligns with data rows. The subgroup sample size is part of the
/// returned estimate so a reader can judge its reliability.
pub fn subgroup_effect(
    data: &ForestData,
    predictions: &ForestPredictions,
    mask: &[bool],
    label: &str,
) -> Result<EffectEstimate> {
    if mask.len() != data.len() {
        return Err(StudyError::validation(format!(
            "subgroup mask length {} does not match data rows {}",
            mask.len(),
            data.len()
        )));
    }
    let scores: Vec<f64> = aipw_scores(data, predictions)
        .into_iter()
        .zip(mask)
        .filter_map(|(score, &keep)| keep.then_some(score))
        .collect();
    estimate_from_scores(label, &scores)
}
