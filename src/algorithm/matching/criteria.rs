//! Matching criteria definitions for period matching
//!
//! This module provides the structure and logic for defining how
//! during-period records are paired with before-period records.

/// Criteria for pairing during-period records with before-period records
///
/// Pairing always uses propensity-score distance; the exact flags restrict
/// candidate partners to identical covariate levels, and the caliper caps
/// the accepted score distance.
#[derive(Debug, Clone)]
pub struct MatchingCriteria {
    /// Whether partners must share the age bracket
    pub exact_age_bracket: bool,

    /// Whether partners must share the gender
    pub exact_gender: bool,

    /// Whether partners must share the calendar test month
    pub exact_month: bool,

    /// Maximum allowed propensity-score distance for an accepted match
    pub caliper: Option<f64>,
}

impl Default for MatchingCriteria {
    fn default() -> Self {
        Self {
            exact_age_bracket: true,  // Match within the same age bracket
            exact_gender: true,       // Match on gender
            exact_month: false,       // Let the propensity score absorb month
            caliper: Some(0.05),      // Reject pairs further apart than this
        }
    }
}

impl MatchingCriteria {
    /// Create a new instance with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for constructing matching criteria
    #[must_use]
    pub fn builder() -> MatchingCriteriaBuilder {
        MatchingCriteriaBuilder::new()
    }

    /// Check whether a score distance passes the caliper
    #[must_use]
    pub fn within_caliper(&self, distance: f64) -> bool {
        self.caliper.is_none_or(|c| distance <= c)
    }

    /// Convert to a human-readable string representation
    #[must_use]
    pub fn to_string_representation(&self) -> String {
        format!(
            "Matching Criteria:\n\
             - Exact age bracket: {}\n\
             - Exact gender: {}\n\
             - Exact test month: {}\n\
             - Caliper: {}",
            self.exact_age_bracket,
            self.exact_gender,
            self.exact_month,
            self.caliper
                .map_or_else(|| "none".to_string(), |c| format!("{c:.4}")),
        )
    }
}

/// Builder for constructing matching criteria
#[derive(Debug, Clone, Default)]
pub struct MatchingCriteriaBuilder {
    criteria: MatchingCriteria,
}

impl MatchingCriteriaBuilder {
    /// Create a new builder with default criteria
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether partners must share the age bracket
    #[must_use]
    pub const fn exact_age_bracket(mut self, exact: bool) -> Self {
        self.criteria.exact_age_bracket = exact;
        self
    }

    /// Set whether partners must share the gender
    #[must_use]
    pub const fn exact_gender(mut self, exact: bool) -> Self {
        self.criteria.exact_gender = exact;
        self
    }

    /// Set whether partners must share the calendar test month
    #[must_use]
    pub const fn exact_month(mut self, exact: bool) -> Self {
        self.criteria.exact_month = exact;
        self
    }

    /// Set the propensity-score caliper
    #[must_use]
    pub const fn caliper(mut self, caliper: Option<f64>) -> Self {
        self.criteria.caliper = caliper;
        self
    }

    /// Build the matching criteria
    #[must_use]
    pub fn build(self) -> MatchingCriteria {
        self.criteria
    }
}

/// Configuration for the matching process
#[derive(Debug, Clone, Default)]
pub struct MatchingConfig {
    /// The criteria to use for matching
    pub criteria: MatchingCriteria,

    /// Optional random seed; when set, the order in which during-period
    /// records claim partners is shuffled reproducibly instead of running
    /// in score order
    pub random_seed: Option<u64>,
}

impl MatchingConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for constructing matching configuration
    #[must_use]
    pub fn builder() -> MatchingConfigBuilder {
        MatchingConfigBuilder::new()
    }
}

/// Builder for constructing matching configuration
#[derive(Debug, Clone, Default)]
pub struct MatchingConfigBuilder {
    config: MatchingConfig,
}

impl MatchingConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the matching criteria
    #[must_use]
    pub fn criteria(mut self, criteria: MatchingCriteria) -> Self {
        self.config.criteria = criteria;
        self
    }

    /// Set the random seed
    #[must_use]
    pub const fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    /// Build the matching configuration
    #[must_use]
    pub fn build(self) -> MatchingConfig {
        self.config
    }
}
