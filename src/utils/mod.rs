//! Shared utilities

pub mod progress;

/// Format a count with its percentage of a total, e.g. `123 (4.5%)`
#[must_use]
pub fn format_count_pct(count: usize, total: usize) -> String {
    if total == 0 {
        return format!("{count} (-)");
    }
    format!("{count} ({:.1}%)", 100.0 * count as f64 / total as f64)
}
