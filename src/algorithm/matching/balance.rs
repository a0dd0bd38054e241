//! Covariate balance assessment between the study periods
//!
//! This module provides functions and structures for assessing how well the
//! matching covariates are balanced between during-period and before-period
//! groups, before and after matching.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::models::{AgeBracket, Gender, MeasurementRecord};

/// Metric for balance between the periods for a single covariate
#[derive(Debug, Clone)]
pub struct BalanceMetric {
    /// Name of the covariate
    pub name: String,

    /// Standardized difference between during and before groups
    pub standardized_difference: f64,

    /// Mean (or proportion) for the during group
    pub treated_mean: f64,

    /// Mean (or proportion) for the before group
    pub control_mean: f64,

    /// Whether the covariate is a binary indicator
    pub categorical: bool,
}

/// Summary statistics for a balance report
#[derive(Debug, Clone)]
pub struct BalanceSummary {
    /// Number of covariates with absolute standardized difference above the
    /// imbalance threshold
    pub imbalanced_covariates: usize,

    /// Maximum absolute standardized difference
    pub max_standardized_difference: f64,

    /// Mean absolute standardized difference
    pub mean_absolute_standardized_difference: f64,

    /// Total number of covariates
    pub total_covariates: usize,
}

/// Report on covariate balance between the periods
#[derive(Debug, Clone)]
pub struct BalanceReport {
    /// Balance metrics for each covariate
    pub metrics: Vec<BalanceMetric>,

    /// Summary statistics
    pub summary: BalanceSummary,
}

impl BalanceReport {
    /// Render the report as an aligned text table
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Balance Summary:\n\
             - Total covariates: {}\n\
             - Imbalanced covariates (|std diff| > 0.1): {}\n\
             - Maximum |standardized difference|: {:.4}\n\
             - Mean |standardized difference|: {:.4}\n\n",
            self.summary.total_covariates,
            self.summary.imbalanced_covariates,
            self.summary.max_standardized_difference,
            self.summary.mean_absolute_standardized_difference
        ));

        output.push_str(
            "Covariate            | Type        | During Mean | Before Mean | Std Diff\n\
             ---------------------|-------------|-------------|-------------|---------\n",
        );

        for metric in self.sorted_metrics() {
            let covariate_type = if metric.categorical {
                "Categorical"
            } else {
                "Continuous"
            };
            output.push_str(&format!(
                "{:<20} | {:<11} | {:>11.4} | {:>11.4} | {:>8.4}\n",
                metric.name,
                covariate_type,
                metric.treated_mean,
                metric.control_mean,
                metric.standardized_difference
            ));
        }

        output
    }

    /// Write the report to a CSV file
    pub fn write_to_csv(&self, file_path: &Path) -> Result<()> {
        let mut file = File::create(file_path)?;
        writeln!(file, "covariate,type,during_mean,before_mean,std_diff")?;
        for metric in self.sorted_metrics() {
            writeln!(
                file,
                "{},{},{:.6},{:.6},{:.6}",
                metric.name,
                if metric.categorical { "categorical" } else { "continuous" },
                metric.treated_mean,
                metric.control_mean,
                metric.standardized_difference
            )?;
        }
        Ok(())
    }

    /// Metrics sorted by absolute standardized difference, descending
    fn sorted_metrics(&self) -> Vec<BalanceMetric> {
        let mut sorted = self.metrics.clone();
        sorted.sort_by(|a, b| {
            b.standardized_difference
                .abs()
                .total_cmp(&a.standardized_difference.abs())
        });
        sorted
    }
}

/// Calculator for balance metrics between the period groups
#[derive(Debug, Clone)]
pub struct BalanceCalculator {
    /// Threshold for marking a covariate as imbalanced
    imbalance_threshold: f64,
}

impl Default for BalanceCalculator {
    fn default() -> Self {
        Self {
            imbalance_threshold: 0.1,
        }
    }
}

impl BalanceCalculator {
    /// Create a new balance calculator with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the imbalance threshold
    #[must_use]
    pub const fn with_imbalance_threshold(mut self, threshold: f64) -> Self {
        self.imbalance_threshold = threshold;
        self
    }

    /// Assess covariate balance over a record slice
    ///
    /// Covariates are the matching set: gender and age-bracket indicators
    /// plus the test month as a continuous covariate.
    #[must_use]
    pub fn assess(&self, records: &[MeasurementRecord]) -> BalanceReport {
        let treated: Vec<&MeasurementRecord> =
            records.iter().filter(|r| r.treated()).collect();
        let control: Vec<&MeasurementRecord> =
            records.iter().filter(|r| !r.treated()).collect();

        let mut metrics = Vec::new();

        let indicators: [(&str, fn(&MeasurementRecord) -> bool); 4] = [
            ("gender_f", |r| r.gender == Gender::Female),
            ("age_under_30", |r| r.age_bracket == AgeBracket::Young),
            ("age_30_59", |r| r.age_bracket == AgeBracket::Middle),
            ("age_60_plus", |r| r.age_bracket == AgeBracket::Senior),
        ];
        for (name, indicator) in indicators {
            metrics.push(binary_metric(name, &treated, &control, indicator));
        }
        metrics.push(continuous_metric("test_month", &treated, &control, |r| {
            f64::from(r.test_month)
        }));

        let abs_diffs: Vec<f64> = metrics
            .iter()
            .map(|m| m.standardized_difference.abs())
            .collect();
        let summary = BalanceSummary {
            imbalanced_covariates: abs_diffs
                .iter()
                .filter(|d| **d > self.imbalance_threshold)
                .count(),
            max_standardized_difference: abs_diffs.iter().copied().fold(0.0, f64::max),
            mean_absolute_standardized_difference: abs_diffs.iter().sum::<f64>()
                / abs_diffs.len() as f64,
            total_covariates: metrics.len(),
        };

        BalanceReport { metrics, summary }
    }
}

fn proportion(records: &[&MeasurementRecord], indicator: fn(&MeasurementRecord) -> bool) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().filter(|r| indicator(r)).count() as f64 / records.len() as f64
}

fn binary_metric(
    name: &str,
    treated: &[&MeasurementRecord],
    control: &[&MeasurementRecord],
    indicator: fn(&MeasurementRecord) -> bool,
) -> BalanceMetric {
    let p_t = proportion(treated, indicator);
    let p_c = proportion(control, indicator);
    let pooled_var = (p_t * (1.0 - p_t) + p_c * (1.0 - p_c)) / 2.0;
    let standardized_difference = if pooled_var > 0.0 {
        (p_t - p_c) / pooled_var.sqrt()
    } else {
        0.0
    };
    BalanceMetric {
        name: name.to_string(),
        standardized_difference,
        treated_mean: p_t,
        control_mean: p_c,
        categorical: true,
    }
}

fn continuous_metric(
    name: &str,
    treated: &[&MeasurementRecord],
    control: &[&MeasurementRecord],
    value: fn(&MeasurementRecord) -> f64,
) -> BalanceMetric {
    let mean_of = |records: &[&MeasurementRecord]| -> (f64, f64) {
        if records.len() < 2 {
            return (records.first().map_or(0.0, |r| value(r)), 0.0);
        }
        let values: Vec<f64> = records.iter().map(|r| value(r)).collect();
        let m = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>()
            / (values.len() as f64 - 1.0);
        (m, var)
    };
    let (mean_t, var_t) = mean_of(treated);
    let (mean_c, var_c) = mean_of(control);
    let pooled_var = (var_t + var_c) / 2.0;
    let standardized_difference = if pooled_var > 0.0 {
        (mean_t - mean_c) / pooled_var.sqrt()
    } else {
        0.0
    };
    BalanceMetric {
        name: name.to_string(),
        standardized_difference,
        treated_mean: mean_t,
        control_mean: mean_c,
        categorical: false,
    }
}
