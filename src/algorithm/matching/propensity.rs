//! Propensity model for period membership
//!
//! Fits a logistic regression predicting "measured during the pandemic
//! window" from the matching covariates (age bracket, gender, test month),
//! via iteratively reweighted least squares on the normal equations. The
//! fitted probabilities are the propensity scores used as the matching
//! distance.

use log::debug;

use crate::algorithm::statistics::regression::solve_spd;
use crate::error::{Result, StudyError};
use crate::models::{AgeBracket, Gender, MeasurementRecord};

const MAX_ITERATIONS: usize = 50;
const CONVERGENCE_TOL: f64 = 1e-8;
// Small ridge keeps the weighted system positive definite under separation
const RIDGE: f64 = 1e-6;

/// A fitted propensity model
#[derive(Debug, Clone)]
pub struct PropensityModel {
    /// Coefficients, aligned with `feature_names`
    pub coefficients: Vec<f64>,
    /// Design column names (intercept first)
    pub feature_names: Vec<String>,
    /// IRLS iterations used
    pub iterations: usize,
}

impl PropensityModel {
    /// Fitted probability for one design row
    #[must_use]
    fn predict_row(&self, row: &[f64]) -> f64 {
        let eta: f64 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(c, x)| c * x)
            .sum();
        sigmoid(eta)
    }
}

fn sigmoid(eta: f64) -> f64 {
    let p = 1.0 / (1.0 + (-eta).exp());
    p.clamp(1e-10, 1.0 - 1e-10)
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Design row for one record: intercept, bracket dummies, gender, month
/// dummies
fn design_row(record: &MeasurementRecord) -> Vec<f64> {
    let mut row = Vec::with_capacity(16);
    row.push(1.0);
    row.push(indicator(record.age_bracket == AgeBracket::Middle));
    row.push(indicator(record.age_bracket == AgeBracket::Senior));
    row.push(indicator(record.age_bracket == AgeBracket::Unknown));
    row.push(indicator(record.gender == Gender::Female));
    for month in 2..=12u32 {
        row.push(indicator(record.test_month == month));
    }
    row
}

fn design_names() -> Vec<String> {
    let mut names = vec![
        "intercept".to_string(),
        "age_30_59".to_string(),
        "age_60_plus".to_string(),
        "age_unknown".to_string(),
        "gender_f".to_string(),
    ];
    for month in 2..=12u32 {
        names.push(format!("month_{month}"));
    }
    names
}

/// Fit the propensity model and score every record
///
/// Returns the model and one score per input record, aligned by index.
/// Fails when either period is empty or the weighted system is singular.
pub fn fit_propensity(records: &[MeasurementRecord]) -> Result<(PropensityModel, Vec<f64>)> {
    let n = records.len();
    let treated_count = records.iter().filter(|r| r.treated()).count();
    if treated_count == 0 || treated_count == n {
        return Err(StudyError::Estimation(format!(
            "propensity fit needs both periods, got {treated_count} treated of {n}"
        )));
    }

    let rows: Vec<Vec<f64>> = records.iter().map(design_row).collect();
    let y: Vec<f64> = records.iter().map(|r| indicator(r.treated())).collect();
    let k = rows[0].len();

    let mut beta = vec![0.0_f64; k];
    let mut iterations = 0;
    for iter in 0..MAX_ITERATIONS {
        iterations = iter + 1;

        // Accumulate the weighted normal equations X'WX b = X'Wz
        let mut xtwx = vec![vec![0.0_f64; k]; k];
        let mut xtwz = vec![0.0_f64; k];
        for (row, &yi) in rows.iter().zip(&y) {
            let eta: f64 = beta.iter().zip(row).map(|(b, x)| b * x).sum();
            let mu = sigmoid(eta);
            let w = mu * (1.0 - mu);
            let z = eta + (yi - mu) / w;
            for i in 0..k {
                xtwz[i] += w * row[i] * z;
                for j in 0..k {
                    xtwx[i][j] += w * row[i] * row[j];
                }
            }
        }
        for (i, row) in xtwx.iter_mut().enumerate() {
            row[i] += RIDGE;
        }

        let updated = solve_spd(&xtwx, &xtwz)
            .map_err(|e| StudyError::Estimation(format!("propensity IRLS step failed: {e}")))?;

        let max_delta = beta
            .iter()
            .zip(&updated)
            .map(|(old, new)| (old - new).abs())
            .fold(0.0_f64, f64::max);
        beta = updated;
        if max_delta < CONVERGENCE_TOL {
            break;
        }
    }

    let model = PropensityModel {
        coefficients: beta,
        feature_names: design_names(),
        iterations,
    };
    debug!("Propensity model converged in {} iterations", model.iterations);

    let scores = rows.iter().map(|row| model.predict_row(row)).collect();
    Ok((model, scores))
}
