//! Honest causal tree
//!
//! A single tree of the causal forest. Structure is grown on one half of
//! the tree's subsample by maximizing treatment-effect heterogeneity
//! between children; leaf effects are then re-estimated on the held-out
//! half, so no observation influences both the split placement and its own
//! leaf estimate.

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::algorithm::forest::data::ForestData;

/// Group means inside one node: effect and per-arm outcome means
#[derive(Debug, Clone, Copy)]
pub struct LeafEstimate {
    /// Treated-minus-control mean outcome
    pub tau: f64,
    /// Mean outcome of treated observations
    pub mu1: f64,
    /// Mean outcome of control observations
    pub mu0: f64,
}

#[derive(Debug)]
enum Node {
    Leaf(LeafEstimate),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Growth parameters for one tree (shared across the forest)
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Features tried per split
    pub mtry: usize,
    /// Minimum treated observations per child (grow half)
    pub min_treated: usize,
    /// Minimum control observations per child (grow half)
    pub min_control: usize,
    /// Maximum tree depth
    pub max_depth: usize,
}

/// One grown causal tree
#[derive(Debug)]
pub struct CausalTree {
    root: Node,
    /// (feature, depth) of every split, for importance scoring
    pub splits: Vec<(usize, usize)>,
}

struct ArmSums {
    n1: usize,
    sum1: f64,
    n0: usize,
    sum0: f64,
}

impl ArmSums {
    fn collect(data: &ForestData, rows: &[usize]) -> Self {
        let mut sums = Self {
            n1: 0,
            sum1: 0.0,
            n0: 0,
            sum0: 0.0,
        };
        for &row in rows {
            if data.treatment[row] {
                sums.n1 += 1;
                sums.sum1 += data.outcome[row];
            } else {
                sums.n0 += 1;
                sums.sum0 += data.outcome[row];
            }
        }
        sums
    }

    fn estimate(&self) -> Option<LeafEstimate> {
        if self.n1 == 0 || self.n0 == 0 {
            return None;
        }
        let mu1 = self.sum1 / self.n1 as f64;
        let mu0 = self.sum0 / self.n0 as f64;
        Some(LeafEstimate {
            tau: mu1 - mu0,
            mu1,
            mu0,
        })
    }

    fn len(&self) -> usize {
        self.n1 + self.n0
    }
}

impl CausalTree {
    /// Grow a tree on `grow_rows`, then re-estimate leaves on `est_rows`
    ///
    /// Returns `None` when the estimation half cannot produce a root
    /// estimate (one arm empty), in which case the forest discards the
    /// tree.
    pub fn grow(
        data: &ForestData,
        grow_rows: &[usize],
        est_rows: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Option<Self> {
        let mut splits = Vec::new();
        let mut root = build_node(data, grow_rows, params, rng, 0, &mut splits)?;

        let root_sums = ArmSums::collect(data, est_rows);
        let root_estimate = root_sums.estimate()?;
        populate(&mut root, data, est_rows, root_estimate);

        Some(Self { root, splits })
    }

    /// Leaf estimate for one feature row
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> LeafEstimate {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(estimate) => return *estimate,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Recursively grow structure on the grow half
///
/// Split criterion: maximize `n_l tau_l^2 + n_r tau_r^2`, the
/// heterogeneity score of the candidate children. Returns `None` only at
/// the root when no estimate exists at all.
fn build_node(
    data: &ForestData,
    rows: &[usize],
    params: &TreeParams,
    rng: &mut StdRng,
    depth: usize,
    splits: &mut Vec<(usize, usize)>,
) -> Option<Node> {
    let sums = ArmSums::collect(data, rows);
    let own_estimate = sums.estimate()?;

    if depth >= params.max_depth
        || sums.n1 < 2 * params.min_treated
        || sums.n0 < 2 * params.min_control
    {
        return Some(Node::Leaf(own_estimate));
    }

    let p = data.feature_count();
    let mut feature_order: Vec<usize> = (0..p).collect();
    feature_order.shuffle(rng);
    feature_order.truncate(params.mtry.clamp(1, p));

    let mut best: Option<(f64, usize, f64)> = None; // (score, feature, threshold)
    for &feature in &feature_order {
        let mut values: Vec<f64> = rows.iter().map(|&r| data.features[r][feature]).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        if values.len() < 2 {
            continue;
        }

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .copied()
                .partition(|&r| data.features[r][feature] <= threshold);
            let left_sums = ArmSums::collect(data, &left_rows);
            let right_sums = ArmSums::collect(data, &right_rows);
            if left_sums.n1 < params.min_treated
                || left_sums.n0 < params.min_control
                || right_sums.n1 < params.min_treated
                || right_sums.n0 < params.min_control
            {
                continue;
            }
            let (Some(left_est), Some(right_est)) = (left_sums.estimate(), right_sums.estimate())
            else {
                continue;
            };
            let score = left_sums.len() as f64 * left_est.tau.powi(2)
                + right_sums.len() as f64 * right_est.tau.powi(2);
            if best.is_none_or(|(s, _, _)| score > s) {
                best = Some((score, feature, threshold));
            }
        }
    }

    let Some((_, feature, threshold)) = best else {
        return Some(Node::Leaf(own_estimate));
    };

    splits.push((feature, depth));
    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&r| data.features[r][feature] <= threshold);
    // Children inherit the parent estimate if their own grow half is
    // one-armed; the honest re-estimation below overrides it anyway
    let left = build_node(data, &left_rows, params, rng, depth + 1, splits)
        .unwrap_or(Node::Leaf(own_estimate));
    let right = build_node(data, &right_rows, params, rng, depth + 1, splits)
        .unwrap_or(Node::Leaf(own_estimate));

    Some(Node::Split {
        feature,
        threshold,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// Replace every leaf estimate with one computed from the held-out half
///
/// A leaf whose held-out rows are one-armed inherits the nearest ancestor
/// estimate that was valid on the held-out half.
fn populate(node: &mut Node, data: &ForestData, rows: &[usize], inherited: LeafEstimate) {
    match node {
        Node::Leaf(estimate) => {
            let sums = ArmSums::collect(data, rows);
            *estimate = sums.estimate().unwrap_or(inherited);
        }
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .copied()
                .partition(|&r| data.features[r][*feature] <= *threshold);
            let sums = ArmSums::collect(data, rows);
            let own = sums.estimate().unwrap_or(inherited);
            populate(left, data, &left_rows, own);
            populate(right, data, &right_rows, own);
        }
    }
}
