//! Configuration for the cohort analysis pipeline.

use std::path::PathBuf;

use crate::models::PeriodWindows;

/// Configuration for the cohort analysis pipeline
///
/// Thresholds and calendar windows are explicit here rather than constants
/// buried in the classification helpers, so every stage receives its policy
/// from one place.
#[derive(Debug, Clone)]
pub struct StudyConfig {
    /// Path to the measurement CSV
    pub measurements_path: PathBuf,
    /// Path to the daily stringency CSV
    pub stringency_path: PathBuf,
    /// Directory for chart-data and summary artifacts
    pub output_dir: PathBuf,
    /// Biomarker analysis code to retain
    pub biomarker_code: String,
    /// Deficiency threshold on the measurement scale (nmol/L)
    pub deficiency_threshold: f64,
    /// The two study-period calendar windows
    pub windows: PeriodWindows,
    /// Whether records with an unknown age bracket enter matching and
    /// causal estimation (they always appear in descriptive counts)
    pub keep_unknown_age_bracket: bool,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            measurements_path: PathBuf::from("data/vitd_measurements.csv"),
            stringency_path: PathBuf::from("data/stringency_index.csv"),
            output_dir: PathBuf::from("output"),
            biomarker_code: "NPU10267".to_string(),
            deficiency_threshold: 50.0,
            windows: PeriodWindows::default(),
            keep_unknown_age_bracket: false,
        }
    }
}

impl StudyConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for constructing a study configuration
    #[must_use]
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder::new()
    }

    /// Build a configuration from the environment, falling back to defaults
    ///
    /// Recognized variables: `VITD_MEASUREMENTS`, `VITD_STRINGENCY`,
    /// `VITD_OUTPUT_DIR`. The binary has no CLI flags; these are the only
    /// external knobs.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("VITD_MEASUREMENTS") {
            config.measurements_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("VITD_STRINGENCY") {
            config.stringency_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("VITD_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(path);
        }
        config
    }
}

/// Builder for constructing a study configuration
#[derive(Debug, Clone, Default)]
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl StudyConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: StudyConfig::default(),
        }
    }

    /// Set the measurement CSV path
    #[must_use]
    pub fn measurements_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.measurements_path = path.into();
        self
    }

    /// Set the stringency CSV path
    #[must_use]
    pub fn stringency_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.stringency_path = path.into();
        self
    }

    /// Set the artifact output directory
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_dir = path.into();
        self
    }

    /// Set the biomarker analysis code to retain
    #[must_use]
    pub fn biomarker_code(mut self, code: impl Into<String>) -> Self {
        self.config.biomarker_code = code.into();
        self
    }

    /// Set the deficiency threshold
    #[must_use]
    pub const fn deficiency_threshold(mut self, threshold: f64) -> Self {
        self.config.deficiency_threshold = threshold;
        self
    }

    /// Set the study-period windows
    #[must_use]
    pub fn windows(mut self, windows: PeriodWindows) -> Self {
        self.config.windows = windows;
        self
    }

    /// Set whether unknown age brackets enter matching and estimation
    #[must_use]
    pub const fn keep_unknown_age_bracket(mut self, keep: bool) -> Self {
        self.config.keep_unknown_age_bracket = keep;
        self
    }

    /// Build the study configuration
    #[must_use]
    pub fn build(self) -> StudyConfig {
        self.config
    }
}
