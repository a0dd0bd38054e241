//! Propensity-score matching between the study periods
//!
//! The matching subsystem balances the before/during cohorts on the fixed
//! covariate set (age bracket, gender, test month): a logistic propensity
//! model scores every record, and a greedy nearest-neighbor pass pairs each
//! during-period record with an unused before-period record, subject to
//! exact constraints and a caliper.

pub mod balance;
pub mod criteria;
pub mod matcher;
pub mod propensity;

pub use balance::{BalanceCalculator, BalanceReport};
pub use criteria::{MatchingConfig, MatchingCriteria};
pub use matcher::{MatchedPair, Matcher, MatchingResult};
pub use propensity::{PropensityModel, fit_propensity};
