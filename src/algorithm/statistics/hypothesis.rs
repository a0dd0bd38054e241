//! Two-sample hypothesis tests
//!
//! Welch's t-test for mean comparisons and Pearson's chi-square test for
//! contingency tables, with p-values from `statrs` distributions. A
//! degenerate input is an error the caller records as a missing p-value;
//! it never aborts a whole summary table.

use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

use crate::error::{Result, StudyError};

/// Result of a two-sample Welch t-test
#[derive(Debug, Clone)]
pub struct TTestResult {
    /// Mean of the first sample
    pub mean_a: f64,
    /// Mean of the second sample
    pub mean_b: f64,
    /// Difference of means (first minus second)
    pub estimate: f64,
    /// t statistic
    pub statistic: f64,
    /// Welch-Satterthwaite degrees of freedom
    pub df: f64,
    /// Two-sided p-value
    pub p_value: f64,
}

/// Result of a chi-square independence test
#[derive(Debug, Clone)]
pub struct ChiSquareResult {
    /// Chi-square statistic
    pub statistic: f64,
    /// Degrees of freedom
    pub df: f64,
    /// Upper-tail p-value
    pub p_value: f64,
}

/// Sample mean
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

/// Two-sample Welch t-test (unequal variances)
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<TTestResult> {
    if a.len() < 2 || b.len() < 2 {
        return Err(StudyError::degenerate(format!(
            "t-test needs at least 2 observations per group, got {} and {}",
            a.len(),
            b.len()
        )));
    }

    let (mean_a, mean_b) = (mean(a), mean(b));
    let (var_a, var_b) = (variance(a), variance(b));
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);

    let se2 = var_a / n_a + var_b / n_b;
    if se2 <= 0.0 || !se2.is_finite() {
        return Err(StudyError::degenerate(
            "t-test standard error is zero or undefined".to_string(),
        ));
    }

    let statistic = (mean_a - mean_b) / se2.sqrt();
    let df = se2.powi(2)
        / ((var_a / n_a).powi(2) / (n_a - 1.0) + (var_b / n_b).powi(2) / (n_b - 1.0));

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| StudyError::degenerate(format!("t distribution: {e}")))?;
    let p_value = 2.0 * (1.0 - dist.cdf(statistic.abs()));

    Ok(TTestResult {
        mean_a,
        mean_b,
        estimate: mean_a - mean_b,
        statistic,
        df,
        p_value,
    })
}

/// Pearson chi-square test of independence on an r x c count table
pub fn chi_square_test(table: &[Vec<u64>]) -> Result<ChiSquareResult> {
    let rows = table.len();
    let cols = table.first().map_or(0, Vec::len);
    if rows < 2 || cols < 2 {
        return Err(StudyError::degenerate(format!(
            "chi-square table must be at least 2x2, got {rows}x{cols}"
        )));
    }
    if table.iter().any(|row| row.len() != cols) {
        return Err(StudyError::validation("ragged contingency table"));
    }

    let row_totals: Vec<f64> = table
        .iter()
        .map(|row| row.iter().sum::<u64>() as f64)
        .collect();
    let col_totals: Vec<f64> = (0..cols)
        .map(|j| table.iter().map(|row| row[j] as f64).sum())
        .collect();
    let grand_total: f64 = row_totals.iter().sum();

    if row_totals.iter().chain(col_totals.iter()).any(|&t| t == 0.0) {
        return Err(StudyError::degenerate(
            "contingency table has a zero margin".to_string(),
        ));
    }

    let mut statistic = 0.0;
    for (i, row) in table.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = row_totals[i] * col_totals[j] / grand_total;
            statistic += (observed as f64 - expected).powi(2) / expected;
        }
    }

    let df = ((rows - 1) * (cols - 1)) as f64;
    let dist = ChiSquared::new(df)
        .map_err(|e| StudyError::degenerate(format!("chi-square distribution: {e}")))?;
    let p_value = 1.0 - dist.cdf(statistic);

    Ok(ChiSquareResult {
        statistic,
        df,
        p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welch_detects_a_clear_shift() {
        let a: Vec<f64> = (0..50).map(|i| 55.0 + f64::from(i % 5)).collect();
        let b: Vec<f64> = (0..50).map(|i| 50.0 + f64::from(i % 5)).collect();
        let result = welch_t_test(&a, &b).unwrap();
        assert!((result.estimate - 5.0).abs() < 1e-9);
        assert!(result.p_value < 0.05);
    }

    #[test]
    fn test_welch_on_identical_groups_is_insignificant() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = welch_t_test(&a, &a).unwrap();
        assert!(result.statistic.abs() < 1e-12);
        assert!(result.p_value > 0.99);
    }

    #[test]
    fn test_welch_degenerate_inputs() {
        assert!(welch_t_test(&[1.0], &[1.0, 2.0]).is_err());
        // Zero variance in both groups
        assert!(welch_t_test(&[2.0, 2.0], &[2.0, 2.0]).is_err());
    }

    #[test]
    fn test_chi_square_known_value() {
        // Classic 2x2 with a strong association
        let table = vec![vec![30, 10], vec![10, 30]];
        let result = chi_square_test(&table).unwrap();
        assert!((result.df - 1.0).abs() < 1e-12);
        assert!((result.statistic - 20.0).abs() < 1e-9);
        assert!(result.p_value < 0.001);
    }

    #[test]
    fn test_chi_square_zero_margin_is_degenerate() {
        let table = vec![vec![0, 0], vec![10, 30]];
        assert!(chi_square_test(&table).is_err());
    }
}
