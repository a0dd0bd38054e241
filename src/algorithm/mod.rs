//! Analysis algorithms: cohort construction, statistics, matching,
//! resampled inference and causal estimation

pub mod bootstrap;
pub mod cohort;
pub mod forest;
pub mod matching;
pub mod statistics;
