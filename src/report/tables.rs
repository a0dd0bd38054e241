//! Aligned text tables for console reporting

use crate::algorithm::cohort::CohortSummary;
use crate::algorithm::forest::EffectEstimate;
use crate::algorithm::matching::MatchingResult;
use crate::algorithm::statistics::ComparisonTable;
use crate::utils::format_count_pct;

/// Format an optional p-value; degenerate tests show a placeholder
#[must_use]
pub fn format_p(p: Option<f64>) -> String {
    match p {
        Some(p) if p < 0.001 => "<0.001".to_string(),
        Some(p) => format!("{p:.3}"),
        None => "n/a".to_string(),
    }
}

fn format_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

/// Render a before/during comparison table
#[must_use]
pub fn render_comparison_table(table: &ComparisonTable) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", table.title));
    output.push_str(
        "Stratum   |    N bef |   N dur | Mean bef | Mean dur |   Diff |  p(t)  | Def bef | Def dur | p(chi2)\n\
         ----------|----------|---------|----------|----------|--------|--------|---------|---------|--------\n",
    );
    for row in &table.strata {
        let def_before = format_count_pct(row.before_deficient.0, row.before_deficient.1);
        let def_during = format_count_pct(row.during_deficient.0, row.during_deficient.1);
        output.push_str(&format!(
            "{:<9} | {:>8} | {:>7} | {:>8} | {:>8} | {:>6} | {:>6} | {:>7} | {:>7} | {:>6}\n",
            row.label,
            row.before_n,
            row.during_n,
            format_opt(row.before_mean),
            format_opt(row.during_mean),
            format_opt(row.mean_diff),
            format_p(row.t_p_value),
            def_before,
            def_during,
            format_p(row.chi2_p_value),
        ));
    }
    output
}

/// Render the cohort exclusion accounting
#[must_use]
pub fn render_cohort_summary(summary: &CohortSummary) -> String {
    let mut output = String::new();
    output.push_str("Cohort Summary:\n");
    output.push_str(&format!("  Input rows: {}\n", summary.input_rows));
    output.push_str(&format!(
        "  Retained: {}\n",
        format_count_pct(summary.retained, summary.input_rows)
    ));
    output.push_str(&format!(
        "  Dropped, gender outside M/F: {}\n",
        summary.dropped_gender
    ));
    output.push_str(&format!(
        "  Dropped, invalid date: {}\n",
        summary.dropped_invalid_date
    ));
    output.push_str(&format!(
        "  Dropped, outside period windows: {}\n",
        summary.dropped_outside_windows
    ));
    output.push_str(&format!(
        "  Missing values among retained: {}\n",
        format_count_pct(summary.missing_values, summary.retained)
    ));
    output.push_str(&format!(
        "  Unknown age bracket among retained: {}\n",
        format_count_pct(summary.unknown_age_bracket, summary.retained)
    ));
    output.push_str(&format!(
        "  During-period records without stringency score: {}\n",
        summary.unmatched_stringency_dates
    ));
    output
}

/// Render the match-rate accounting of a matching run
#[must_use]
pub fn render_matching_summary(result: &MatchingResult) -> String {
    let mut output = String::new();
    output.push_str("Matching Summary:\n");
    output.push_str(&format!("  Pairs formed: {}\n", result.pairs.len()));
    output.push_str(&format!(
        "  During-period matched: {}\n",
        format_count_pct(result.pairs.len(), result.treated_total)
    ));
    output.push_str(&format!(
        "  During-period unmatched: {}\n",
        result.dropped_treated
    ));
    output.push_str(&format!(
        "  Before-period unclaimed: {}\n",
        result.dropped_controls
    ));
    output.push_str(&format!("  Elapsed: {:.2?}\n", result.matching_time));
    output
}

/// Render effect estimates as a table, sample sizes included
#[must_use]
pub fn render_effect_estimates(estimates: &[EffectEstimate]) -> String {
    let mut output = String::new();
    output.push_str(
        "Group                   |     N | Estimate |     SE |        95% CI\n\
         ------------------------|-------|----------|--------|----------------\n",
    );
    for estimate in estimates {
        output.push_str(&format!(
            "{:<23} | {:>5} | {:>8.3} | {:>6.3} | [{:>6.3}, {:>6.3}]\n",
            estimate.label,
            estimate.n,
            estimate.estimate,
            estimate.standard_error,
            estimate.ci_lower,
            estimate.ci_upper,
        ));
    }
    output
}

/// Render variable importance shares
#[must_use]
pub fn render_importance(importance: &[(String, f64)]) -> String {
    let mut sorted = importance.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut output = String::new();
    output.push_str("Covariate importance:\n");
    for (name, share) in sorted {
        output.push_str(&format!("  {name:<12} {:>5.1}%\n", 100.0 * share));
    }
    output
}
