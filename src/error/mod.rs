//! Error handling for the cohort analysis pipeline.

use thiserror::Error;

/// Specialized error type for cohort analysis operations
#[derive(Debug, Error)]
pub enum StudyError {
    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error decoding a CSV record
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error parsing a raw field into a domain value
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input data failed a structural check
    #[error("Validation error: {0}")]
    Validation(String),

    /// A statistical computation was degenerate (zero margin, too few
    /// observations, singular system)
    #[error("Degenerate statistic: {0}")]
    Degenerate(String),

    /// A model fit failed to converge or produce usable estimates
    #[error("Estimation error: {0}")]
    Estimation(String),
}

impl StudyError {
    /// Shorthand for a validation error from a format string
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a degenerate-statistic error from a format string
    #[must_use]
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::Degenerate(msg.into())
    }
}

/// Result type for cohort analysis operations
pub type Result<T> = std::result::Result<T, StudyError>;
