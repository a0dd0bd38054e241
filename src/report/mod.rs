//! Reporting: console tables, text charts and file artifacts

pub mod artifacts;
pub mod charts;
pub mod tables;

pub use artifacts::{StudySummary, ensure_output_dir, write_summary_json};
pub use charts::{bar_chart, error_bar_chart, forest_plot, line_chart};
pub use tables::{
    render_cohort_summary, render_comparison_table, render_effect_estimates,
    render_importance, render_matching_summary,
};
