//! Progress reporting utilities for long-running operations
//!
//! Standardized progress bars for the resampling batch and forest growth,
//! using the indicatif crate.

use indicatif::{ProgressBar, ProgressStyle};

/// Default style for a batch progress bar
pub const DEFAULT_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

/// Create a batch progress bar with a standardized style
///
/// # Arguments
/// * `length` - Total length for the progress bar
/// * `description` - Optional description to display as the initial message
///
/// # Returns
/// A configured `ProgressBar`
#[must_use]
pub fn create_progress_bar(length: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(length);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(DEFAULT_TEMPLATE)
            .unwrap()
            .progress_chars("#>-"),
    );

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    match message {
        Some(msg) => pb.finish_with_message(msg.to_string()),
        None => pb.finish(),
    }
}
