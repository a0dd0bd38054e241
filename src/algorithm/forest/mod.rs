//! Forest-based treatment-effect estimation
//!
//! A generic non-parametric estimator: honest causal trees over a numeric
//! covariate matrix, aggregated into a population average treatment effect
//! and subgroup sensitivity estimates.

pub mod causal;
pub mod data;
pub mod tree;

pub use causal::{
    CausalForest, EffectEstimate, ForestConfig, ForestPredictions, average_treatment_effect,
    subgroup_effect,
};
pub use data::{ForestData, encode_records};
