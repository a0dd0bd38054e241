use anyhow::Result;
use log::{info, warn};

use vitd_cohort::algorithm::bootstrap::{BootstrapConfig, run_bootstrap};
use vitd_cohort::algorithm::cohort::build_cohort;
use vitd_cohort::algorithm::forest::{
    CausalForest, EffectEstimate, ForestConfig, average_treatment_effect, encode_records,
    subgroup_effect,
};
use vitd_cohort::algorithm::matching::{BalanceCalculator, Matcher, MatchingConfig, fit_propensity};
use vitd_cohort::algorithm::statistics::{
    compare_by_age_bracket, compare_by_gender, compare_by_season, monthly_means,
    overall_comparison, period_mean_sd, stringency_association,
};
use vitd_cohort::config::StudyConfig;
use vitd_cohort::loader::load_measurements;
use vitd_cohort::models::{AgeBracket, Gender, Period, Season, StringencyTable};
use vitd_cohort::report;
use vitd_cohort::report::artifacts::{self, EffectSummary, StudySummary};

fn main() -> Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = StudyConfig::from_env();
    if !config.measurements_path.exists() {
        warn!(
            "Measurement file not found: {}",
            config.measurements_path.display()
        );
        return Ok(());
    }
    if !config.stringency_path.exists() {
        warn!(
            "Stringency file not found: {}",
            config.stringency_path.display()
        );
        return Ok(());
    }
    artifacts::ensure_output_dir(&config.output_dir)?;

    // Stage 1-3: ingest, label, enrich
    let raw = load_measurements(&config.measurements_path, &config.biomarker_code)?;
    let stringency = StringencyTable::from_path(&config.stringency_path)?;
    let cohort = build_cohort(&raw.rows, &stringency, &config);
    println!("{}", report::render_cohort_summary(&cohort.summary));

    // Stage 4: descriptive statistics
    let overall = overall_comparison(&cohort.records);
    println!("{}", report::render_comparison_table(&overall));
    for table in [
        compare_by_season(&cohort.records),
        compare_by_gender(&cohort.records),
        compare_by_age_bracket(&cohort.records),
    ] {
        println!("{}", report::render_comparison_table(&table));
        let file_name = format!(
            "comparison_{}.csv",
            table.title.rsplit(' ').next().unwrap_or("table")
        );
        artifacts::write_comparison_csv(&config.output_dir.join(file_name), &table)?;
    }

    let before_monthly = monthly_means(&cohort.records, Period::Before);
    let during_monthly = monthly_means(&cohort.records, Period::During);
    let monthly_points: Vec<(String, f64)> = during_monthly
        .iter()
        .map(|(month, mean, _)| (month.to_string(), *mean))
        .collect();
    println!(
        "{}",
        report::line_chart("Monthly mean level, during period", &monthly_points)
    );
    artifacts::write_monthly_means_csv(
        &config.output_dir.join("monthly_means.csv"),
        &before_monthly,
        &during_monthly,
    )?;

    let deficiency_bars: Vec<(String, f64)> = overall
        .strata
        .iter()
        .flat_map(|row| {
            let rate = |(deficient, classified): (usize, usize)| {
                if classified == 0 {
                    0.0
                } else {
                    100.0 * deficient as f64 / classified as f64
                }
            };
            [
                ("before".to_string(), rate(row.before_deficient)),
                ("during".to_string(), rate(row.during_deficient)),
            ]
        })
        .collect();
    println!(
        "{}",
        report::bar_chart("Deficiency rate by period (%)", &deficiency_bars)
    );

    match stringency_association(&cohort.records) {
        Ok(fit) => info!(
            "Stringency association: slope {:.4} per index point (p = {:.4}, R2 = {:.3}, n = {})",
            fit.slope(),
            fit.p_values[1],
            fit.r_squared,
            fit.n
        ),
        Err(e) => warn!("Stringency association skipped: {e}"),
    }

    // Stage 5: matching
    let estimation = cohort.estimation_records(&config);
    let balance_before = BalanceCalculator::new().assess(&estimation);
    println!("Covariate balance before matching\n{}", balance_before.render());

    let (model, scores) = fit_propensity(&estimation)?;
    info!(
        "Propensity model fitted in {} iterations over {} columns",
        model.iterations,
        model.feature_names.len()
    );
    let matching_config = MatchingConfig::default();
    let matching = Matcher::new(matching_config.clone()).perform_matching(&estimation, &scores)?;
    println!("{}", report::render_matching_summary(&matching));

    let (matched_records, _weights) = matching.matched_records(&estimation);
    let balance_after = BalanceCalculator::new().assess(&matched_records);
    println!("Covariate balance after matching\n{}", balance_after.render());
    balance_after.write_to_csv(&config.output_dir.join("balance_matched.csv"))?;

    let matched_difference = matching.estimate_mean_difference(&estimation)?;
    info!("Matched difference of means: {matched_difference:.3}");

    let mut mean_bars = Vec::new();
    for period in [Period::Before, Period::During] {
        if let Some((mean, sd, n)) = period_mean_sd(&cohort.records, period) {
            let half_width = 1.96 * sd / (n as f64).sqrt();
            mean_bars.push((
                period.label().to_string(),
                mean - half_width,
                mean,
                mean + half_width,
            ));
        }
    }
    println!(
        "{}",
        report::error_bar_chart("Mean level by period with 95% interval", &mean_bars)
    );

    // Stage 6: resampled inference
    let bootstrap_config = BootstrapConfig {
        matching: matching_config,
        ..BootstrapConfig::default()
    };
    let bootstrap = run_bootstrap(&estimation, &bootstrap_config)?;
    let error_bars = vec![(
        "bootstrap".to_string(),
        bootstrap.ci_lower,
        bootstrap.point_estimate,
        bootstrap.ci_upper,
    )];
    println!(
        "{}",
        report::error_bar_chart("Bootstrap estimate with 95% interval", &error_bars)
    );

    // Stage 7: causal effect estimation
    let data = encode_records(&estimation)?;
    let forest = CausalForest::fit(&data, &ForestConfig::default())?;
    let predictions = forest.predict_all(&data);
    let mut effects: Vec<EffectEstimate> =
        vec![average_treatment_effect(&data, &predictions)?];

    let subgroups: Vec<(String, Box<dyn Fn(&vitd_cohort::MeasurementRecord) -> bool>)> = vec![
        (
            "age <30".to_string(),
            Box::new(|r| r.age_bracket == AgeBracket::Young),
        ),
        (
            "age 30-59".to_string(),
            Box::new(|r| r.age_bracket == AgeBracket::Middle),
        ),
        (
            "age 60+".to_string(),
            Box::new(|r| r.age_bracket == AgeBracket::Senior),
        ),
        ("men".to_string(), Box::new(|r| r.gender == Gender::Male)),
        ("women".to_string(), Box::new(|r| r.gender == Gender::Female)),
        (
            "winter tests".to_string(),
            Box::new(|r| r.season == Season::Winter),
        ),
        (
            "women 60+".to_string(),
            Box::new(|r| r.gender == Gender::Female && r.age_bracket == AgeBracket::Senior),
        ),
    ];
    for (label, predicate) in subgroups {
        let mask = data.subgroup_mask(&estimation, predicate.as_ref());
        match subgroup_effect(&data, &predictions, &mask, &label) {
            Ok(estimate) => effects.push(estimate),
            Err(e) => warn!("Subgroup {label} skipped: {e}"),
        }
    }

    println!("{}", report::render_effect_estimates(&effects));
    println!(
        "{}",
        report::forest_plot("Treatment effect by subgroup", &effects)
    );
    let importance = forest.variable_importance();
    println!("{}", report::render_importance(&importance));
    artifacts::write_effects_csv(&config.output_dir.join("effects.csv"), &effects)?;

    // Summary artifact
    let overall_row = &overall.strata[0];
    let mut summary = StudySummary {
        cohort_size: cohort.summary.retained,
        unadjusted_difference: overall_row.mean_diff,
        unadjusted_p_value: overall_row.t_p_value,
        matched_pairs: matching.pairs.len(),
        match_rate: matching.match_rate,
        bootstrap_estimate: 0.0,
        bootstrap_ci: (0.0, 0.0),
        bootstrap_trials: (0, 0),
        effects: effects.iter().map(EffectSummary::from).collect(),
        importance,
    };
    summary.set_bootstrap(&bootstrap);
    artifacts::write_summary_json(&config.output_dir.join("summary.json"), &summary)?;

    info!("Analysis complete; artifacts in {}", config.output_dir.display());
    Ok(())
}
