//! Numeric design data for the causal forest
//!
//! The forest consumes a fully numeric covariate matrix; categorical
//! covariates are integer-encoded here, with the level mapping kept in the
//! feature descriptions.

use crate::error::{Result, StudyError};
use crate::models::{AgeBracket, Gender, MeasurementRecord};

/// Numeric covariates, outcome and treatment for the estimator
#[derive(Debug, Clone)]
pub struct ForestData {
    /// Row-major covariate matrix
    pub features: Vec<Vec<f64>>,
    /// Covariate names aligned with matrix columns
    pub feature_names: Vec<String>,
    /// Continuous outcome per row
    pub outcome: Vec<f64>,
    /// Binary treatment indicator per row
    pub treatment: Vec<bool>,
    /// Index of the source record behind each row, for subgroup masks
    pub source_indices: Vec<usize>,
    /// Records that were skipped for a missing outcome
    pub skipped_missing_outcome: usize,
}

impl ForestData {
    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    /// Whether the data holds no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    /// Number of covariate columns
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Fraction of rows under treatment
    #[must_use]
    pub fn treated_fraction(&self) -> f64 {
        self.treatment.iter().filter(|t| **t).count() as f64 / self.len() as f64
    }

    /// Row mask selecting the records matching a predicate
    ///
    /// `records` must be the slice this data was encoded from.
    #[must_use]
    pub fn subgroup_mask<F>(&self, records: &[MeasurementRecord], predicate: F) -> Vec<bool>
    where
        F: Fn(&MeasurementRecord) -> bool,
    {
        self.source_indices
            .iter()
            .map(|&index| predicate(&records[index]))
            .collect()
    }
}

/// Integer code for an age bracket column
///
/// `Unknown` carries no usable ordinal; callers exclude those records
/// before encoding.
fn age_code(bracket: AgeBracket) -> Option<f64> {
    bracket.ordinal().map(f64::from)
}

/// Encode measurement records into forest data
///
/// Columns: age bracket ordinal (0/1/2), gender indicator (female = 1),
/// calendar test month (1-12). Records with a missing outcome value or an
/// unknown age bracket are skipped and counted.
pub fn encode_records(records: &[MeasurementRecord]) -> Result<ForestData> {
    let feature_names = vec![
        "age_bracket".to_string(),
        "gender_f".to_string(),
        "test_month".to_string(),
    ];

    let mut features = Vec::with_capacity(records.len());
    let mut outcome = Vec::with_capacity(records.len());
    let mut treatment = Vec::with_capacity(records.len());
    let mut source_indices = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for (index, record) in records.iter().enumerate() {
        let (Some(value), Some(age)) = (record.value, age_code(record.age_bracket)) else {
            skipped += 1;
            continue;
        };
        features.push(vec![
            age,
            if record.gender == Gender::Female { 1.0 } else { 0.0 },
            f64::from(record.test_month),
        ]);
        outcome.push(value);
        treatment.push(record.treated());
        source_indices.push(index);
    }

    if outcome.is_empty() {
        return Err(StudyError::validation(
            "no records usable for causal estimation",
        ));
    }
    let treated = treatment.iter().filter(|t| **t).count();
    if treated == 0 || treated == treatment.len() {
        return Err(StudyError::Estimation(format!(
            "causal estimation needs both arms, got {treated} treated of {}",
            treatment.len()
        )));
    }

    Ok(ForestData {
        features,
        feature_names,
        outcome,
        treatment,
        source_indices,
        skipped_missing_outcome: skipped,
    })
}
