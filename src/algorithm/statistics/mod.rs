//! Descriptive statistics and hypothesis testing

pub mod descriptive;
pub mod hypothesis;
pub mod regression;

pub use descriptive::{
    ComparisonTable, StratumComparison, compare_by_age_bracket, compare_by_gender,
    compare_by_season, monthly_means, overall_comparison, period_mean_sd,
    stringency_association,
};
pub use hypothesis::{ChiSquareResult, TTestResult, chi_square_test, mean, variance, welch_t_test};
pub use regression::{LinearFit, linear_regression, solve_spd};
