//! Chart-data and summary artifacts
//!
//! Writes the plotted series as CSV files and the headline estimates as a
//! JSON summary under the configured output directory.

use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::algorithm::bootstrap::BootstrapResult;
use crate::algorithm::forest::EffectEstimate;
use crate::algorithm::statistics::ComparisonTable;
use crate::error::Result;

/// Write monthly mean series for both periods as chart data
pub fn write_monthly_means_csv(
    path: &Path,
    before: &[(u32, f64, usize)],
    during: &[(u32, f64, usize)],
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["period", "month", "mean", "n"])?;
    for (label, series) in [("before", before), ("during", during)] {
        for (month, mean, n) in series {
            writer.write_record([
                label.to_string(),
                month.to_string(),
                format!("{mean:.4}"),
                n.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write a comparison table as chart data
pub fn write_comparison_csv(path: &Path, table: &ComparisonTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "stratum",
        "before_n",
        "during_n",
        "before_mean",
        "during_mean",
        "mean_diff",
        "t_p_value",
        "before_deficient",
        "before_classified",
        "during_deficient",
        "during_classified",
        "chi2_p_value",
    ])?;
    for row in &table.strata {
        let opt = |v: Option<f64>| v.map_or(String::new(), |v| format!("{v:.6}"));
        writer.write_record([
            row.label.clone(),
            row.before_n.to_string(),
            row.during_n.to_string(),
            opt(row.before_mean),
            opt(row.during_mean),
            opt(row.mean_diff),
            opt(row.t_p_value),
            row.before_deficient.0.to_string(),
            row.before_deficient.1.to_string(),
            row.during_deficient.0.to_string(),
            row.during_deficient.1.to_string(),
            opt(row.chi2_p_value),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write effect estimates as forest-plot data
pub fn write_effects_csv(path: &Path, estimates: &[EffectEstimate]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["group", "n", "estimate", "se", "ci_lower", "ci_upper"])?;
    for estimate in estimates {
        writer.write_record([
            estimate.label.clone(),
            estimate.n.to_string(),
            format!("{:.6}", estimate.estimate),
            format!("{:.6}", estimate.standard_error),
            format!("{:.6}", estimate.ci_lower),
            format!("{:.6}", estimate.ci_upper),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Headline numbers of one full analysis run
#[derive(Debug, Serialize)]
pub struct StudySummary {
    /// Retained cohort size
    pub cohort_size: usize,
    /// Overall unmatched difference of means (during minus before)
    pub unadjusted_difference: Option<f64>,
    /// Welch p-value for the unadjusted difference
    pub unadjusted_p_value: Option<f64>,
    /// Matched-pair count of the headline matching run
    pub matched_pairs: usize,
    /// Match rate of the headline matching run
    pub match_rate: f64,
    /// Bootstrap point estimate
    pub bootstrap_estimate: f64,
    /// Bootstrap interval bounds
    pub bootstrap_ci: (f64, f64),
    /// Bootstrap trial accounting (succeeded, dropped)
    pub bootstrap_trials: (usize, usize),
    /// Causal-forest estimates, population first
    pub effects: Vec<EffectSummary>,
    /// Covariate importance shares
    pub importance: Vec<(String, f64)>,
}

/// Serializable view of one effect estimate
#[derive(Debug, Serialize)]
pub struct EffectSummary {
    pub label: String,
    pub n: usize,
    pub estimate: f64,
    pub standard_error: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl From<&EffectEstimate> for EffectSummary {
    fn from(estimate: &EffectEstimate) -> Self {
        Self {
            label: estimate.label.clone(),
            n: estimate.n,
            estimate: estimate.estimate,
            standard_error: estimate.standard_error,
            ci_lower: estimate.ci_lower,
            ci_upper: estimate.ci_upper,
        }
    }
}

impl StudySummary {
    /// Carry the bootstrap block over from a batch result
    pub fn set_bootstrap(&mut self, result: &BootstrapResult) {
        self.bootstrap_estimate = result.point_estimate;
        self.bootstrap_ci = (result.ci_lower, result.ci_upper);
        self.bootstrap_trials = (result.succeeded, result.failed);
    }
}

/// Write the run summary as pretty-printed JSON
pub fn write_summary_json(path: &Path, summary: &StudySummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| crate::error::StudyError::Parse(format!("summary serialization: {e}")))?;
    fs::write(path, json)?;
    info!("Wrote summary to {}", path.display());
    Ok(())
}

/// Ensure the output directory exists
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}
