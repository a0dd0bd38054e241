//! Ordinary least squares on small design matrices
//!
//! The design matrices in this analysis are tiny (an intercept plus a
//! handful of encoded covariates), so the normal equations with a dense
//! Cholesky factorization are all that is needed. The same solver backs the
//! propensity model's IRLS iterations.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Result, StudyError};

/// Solve `A x = b` for symmetric positive-definite `A` via Cholesky
///
/// `A` is given as dense rows. Fails if the matrix is not positive definite
/// (collinear design, empty system).
pub fn solve_spd(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = a.len();
    if n == 0 || b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(StudyError::validation("solve_spd: malformed system"));
    }

    // Lower-triangular factor, row by row
    let mut l = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(StudyError::degenerate(
                        "matrix is not positive definite".to_string(),
                    ));
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = vec![0.0_f64; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i][k] * y[k];
        }
        y[i] = sum / l[i][i];
    }

    // Back substitution: L^T x = y
    let mut x = vec![0.0_f64; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }

    Ok(x)
}

/// A fitted linear model
#[derive(Debug, Clone)]
pub struct LinearFit {
    /// Coefficients, intercept first, then one per predictor column
    pub coefficients: Vec<f64>,
    /// Standard errors aligned with `coefficients`
    pub standard_errors: Vec<f64>,
    /// Two-sided p-values aligned with `coefficients`
    pub p_values: Vec<f64>,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Number of observations
    pub n: usize,
}

impl LinearFit {
    /// Slope of the single-predictor model (first non-intercept coefficient)
    #[must_use]
    pub fn slope(&self) -> f64 {
        self.coefficients[1]
    }
}

/// Fit `y ~ 1 + x` by ordinary least squares
///
/// `rows` holds one predictor vector per observation; an intercept column is
/// prepended internally. Needs more observations than parameters and a
/// non-collinear design.
pub fn linear_regression(rows: &[Vec<f64>], y: &[f64]) -> Result<LinearFit> {
    let n = rows.len();
    if n == 0 || n != y.len() {
        return Err(StudyError::validation(
            "linear_regression: predictor/outcome length mismatch",
        ));
    }
    let k = rows[0].len() + 1;
    if n <= k {
        return Err(StudyError::degenerate(format!(
            "linear_regression: {n} observations for {k} parameters"
        )));
    }

    // Normal equations X'X and X'y with an implicit leading intercept
    let mut xtx = vec![vec![0.0_f64; k]; k];
    let mut xty = vec![0.0_f64; k];
    for (row, &yi) in rows.iter().zip(y) {
        if row.len() + 1 != k {
            return Err(StudyError::validation("linear_regression: ragged design"));
        }
        let mut xi = Vec::with_capacity(k);
        xi.push(1.0);
        xi.extend_from_slice(row);
        for i in 0..k {
            xty[i] += xi[i] * yi;
            for j in 0..k {
                xtx[i][j] += xi[i] * xi[j];
            }
        }
    }

    let coefficients = solve_spd(&xtx, &xty)?;

    // Residual variance
    let mut rss = 0.0;
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let mut tss = 0.0;
    for (row, &yi) in rows.iter().zip(y) {
        let mut fitted = coefficients[0];
        for (c, x) in coefficients[1..].iter().zip(row) {
            fitted += c * x;
        }
        rss += (yi - fitted).powi(2);
        tss += (yi - y_mean).powi(2);
    }
    let df = (n - k) as f64;
    let sigma2 = rss / df;
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };

    // Coefficient covariance: sigma^2 (X'X)^-1, column by column
    let mut standard_errors = Vec::with_capacity(k);
    for j in 0..k {
        let mut e = vec![0.0_f64; k];
        e[j] = 1.0;
        let col = solve_spd(&xtx, &e)?;
        standard_errors.push((sigma2 * col[j]).sqrt());
    }

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| StudyError::degenerate(format!("t distribution: {e}")))?;
    let p_values = coefficients
        .iter()
        .zip(&standard_errors)
        .map(|(c, se)| {
            if *se > 0.0 {
                2.0 * (1.0 - dist.cdf((c / se).abs()))
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(LinearFit {
        coefficients,
        standard_errors,
        p_values,
        r_squared,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_spd_identity() {
        let a = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let x = solve_spd(&a, &[3.0, -2.0]).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-12);
        assert!((x[1] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_spd_rejects_singular() {
        let a = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        assert!(solve_spd(&a, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_recovers_exact_line() {
        // y = 2 + 3x with a little structure in x
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..20).map(|i| 2.0 + 3.0 * f64::from(i)).collect();
        let fit = linear_regression(&rows, &y).unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((fit.slope() - 3.0).abs() < 1e-9);
        assert!(fit.r_squared > 0.999_999);
    }

    #[test]
    fn test_noisy_slope_is_significant() {
        // Deterministic pseudo-noise keeps the test reproducible
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..60)
            .map(|i| 1.0 + 0.5 * f64::from(i) + f64::from(i % 7) * 0.3)
            .collect();
        let fit = linear_regression(&rows, &y).unwrap();
        assert!((fit.slope() - 0.5).abs() < 0.05);
        assert!(fit.p_values[1] < 0.001);
    }

    #[test]
    fn test_too_few_observations() {
        let rows = vec![vec![1.0], vec![2.0]];
        let y = vec![1.0, 2.0];
        assert!(linear_regression(&rows, &y).is_err());
    }
}
