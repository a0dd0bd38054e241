//! Text-rendered charts
//!
//! Console renderings of the analysis charts: bar, line, error-bar and
//! forest plots. The same series are written as CSV artifacts for external
//! plotting (see `report::artifacts`).

use crate::algorithm::forest::EffectEstimate;

const CHART_WIDTH: usize = 50;

/// Horizontal bar chart over labeled values
#[must_use]
pub fn bar_chart(title: &str, rows: &[(String, f64)]) -> String {
    let mut output = format!("{title}\n");
    let max = rows.iter().map(|(_, v)| v.abs()).fold(0.0_f64, f64::max);
    if max == 0.0 {
        output.push_str("  (no data)\n");
        return output;
    }
    for (label, value) in rows {
        let width = ((value.abs() / max) * CHART_WIDTH as f64).round() as usize;
        output.push_str(&format!(
            "  {label:<12} | {} {value:.2}\n",
            "#".repeat(width)
        ));
    }
    output
}

/// Line chart of an ordered series, rendered as a level grid
///
/// Each column is one point; the marker row encodes the scaled level.
#[must_use]
pub fn line_chart(title: &str, points: &[(String, f64)]) -> String {
    const HEIGHT: usize = 12;

    let mut output = format!("{title}\n");
    if points.is_empty() {
        output.push_str("  (no data)\n");
        return output;
    }

    let min = points.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max = points
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };

    let levels: Vec<usize> = points
        .iter()
        .map(|(_, v)| (((v - min) / span) * (HEIGHT - 1) as f64).round() as usize)
        .collect();

    for row in (0..HEIGHT).rev() {
        let level_value = min + span * row as f64 / (HEIGHT - 1) as f64;
        output.push_str(&format!("  {level_value:>7.1} |"));
        for &level in &levels {
            output.push_str(if level == row { "  *" } else { "   " });
        }
        output.push('\n');
    }
    output.push_str("          +");
    output.push_str(&"---".repeat(points.len()));
    output.push('\n');
    output.push_str("           ");
    for (label, _) in points {
        output.push_str(&format!("{label:>3}"));
    }
    output.push('\n');
    output
}

/// Horizontal error-bar chart over (label, lower, point, upper) rows
#[must_use]
pub fn error_bar_chart(title: &str, rows: &[(String, f64, f64, f64)]) -> String {
    let mut output = format!("{title}\n");
    if rows.is_empty() {
        output.push_str("  (no data)\n");
        return output;
    }
    let min = rows.iter().map(|r| r.1).fold(f64::INFINITY, f64::min);
    let max = rows.iter().map(|r| r.3).fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let scale = |v: f64| -> usize {
        ((((v - min) / span) * (CHART_WIDTH - 1) as f64).round() as usize).min(CHART_WIDTH - 1)
    };

    for (label, lower, point, upper) in rows {
        let (lo, mid, hi) = (scale(*lower), scale(*point), scale(*upper));
        let mut lane = vec![b' '; CHART_WIDTH];
        for cell in lane.iter_mut().take(hi + 1).skip(lo) {
            *cell = b'-';
        }
        lane[lo] = b'[';
        lane[hi] = b']';
        lane[mid] = b'o';
        output.push_str(&format!(
            "  {label:<12} {} {point:.2} [{lower:.2}, {upper:.2}]\n",
            String::from_utf8_lossy(&lane)
        ));
    }
    output
}

/// Forest plot of effect estimates with a reference line at zero
#[must_use]
pub fn forest_plot(title: &str, estimates: &[EffectEstimate]) -> String {
    let mut output = format!("{title}\n");
    if estimates.is_empty() {
        output.push_str("  (no data)\n");
        return output;
    }

    let min = estimates
        .iter()
        .map(|e| e.ci_lower)
        .fold(0.0_f64, f64::min);
    let max = estimates
        .iter()
        .map(|e| e.ci_upper)
        .fold(0.0_f64, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let scale = |v: f64| -> usize {
        ((((v - min) / span) * (CHART_WIDTH - 1) as f64).round() as usize).min(CHART_WIDTH - 1)
    };
    let zero = scale(0.0);

    for estimate in estimates {
        let (lo, mid, hi) = (
            scale(estimate.ci_lower),
            scale(estimate.estimate),
            scale(estimate.ci_upper),
        );
        let mut lane = vec![b' '; CHART_WIDTH];
        lane[zero] = b'|';
        for cell in lane.iter_mut().take(hi + 1).skip(lo) {
            if *cell == b' ' {
                *cell = b'-';
            }
        }
        lane[mid] = b'o';
        output.push_str(&format!(
            "  {:<23} {} {:.2} [{:.2}, {:.2}] n={}\n",
            estimate.label,
            String::from_utf8_lossy(&lane),
            estimate.estimate,
            estimate.ci_lower,
            estimate.ci_upper,
            estimate.n,
        ));
    }
    output.push_str(&format!(
        "  {:<23} {}^ zero\n",
        "",
        " ".repeat(zero)
    ));
    output
}
