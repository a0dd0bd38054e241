//! A Rust library for cohort analysis of vitamin D measurements:
//! descriptive statistics, propensity-score matching between pre-pandemic
//! and pandemic periods, parallel bootstrap inference and causal-forest
//! treatment-effect estimation.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod report;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::StudyConfig;
pub use error::{Result, StudyError};
pub use models::{AgeBracket, Gender, MeasurementRecord, Period, PeriodWindows, Season};

// Pipeline stages
pub use algorithm::bootstrap::{BootstrapConfig, BootstrapResult, run_bootstrap};
pub use algorithm::cohort::{Cohort, CohortSummary, build_cohort};
pub use algorithm::forest::{CausalForest, EffectEstimate, ForestConfig, encode_records};
pub use algorithm::matching::{
    BalanceCalculator, Matcher, MatchingConfig, MatchingCriteria, fit_propensity,
};
pub use loader::load_measurements;
