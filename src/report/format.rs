//! Formatted terminal output.
//!
//! Formatting lives in one place so the model and the calibrator stay free
//! of presentation concerns and output changes are localized.

use crate::domain::{
    CalibrationResult, Gr4jParams, ModelState, PARAM_COUNT, RunConfig, SkillReport, WindowScore,
};
use crate::fit::DifferentialEvolution;
use crate::io::ingest::DatasetStats;

const PARAM_LABELS: [&str; PARAM_COUNT] = [
    "production store, mm",
    "exchange, mm/day",
    "routing store, mm",
    "time constant, days",
];

/// Format the calibration run summary (dataset, optimizer, parameters, skill).
pub fn format_run_summary(
    stats: &DatasetStats,
    config: &RunConfig,
    result: &CalibrationResult,
    skill: &SkillReport,
) -> String {
    let mut out = String::new();
    let opt = &config.optimizer;

    out.push_str("=== gr4j - rainfall-runoff calibration ===\n");
    out.push_str(&format!("Input: {}\n", config.input.display()));
    out.push_str(&fmt_dataset(stats));
    out.push_str(&format!(
        "Split: {} (calibration before, validation on/after)\n",
        config.split_date
    ));
    out.push_str(&format!(
        "Optimizer: differential evolution | generations<={} | population={} | seed={} | tol={} | threads={}\n",
        opt.max_generations,
        DifferentialEvolution::new(opt.clone()).population_size(PARAM_COUNT),
        opt.seed,
        opt.tol,
        if opt.parallel { "on" } else { "off" }
    ));
    out.push_str(&format!(
        "Stopped: {} after {} generations ({} evaluations)\n",
        result.termination.describe(),
        result.generations,
        result.evaluations
    ));
    out.push_str(&format!(
        "Validation start: {}\n",
        if config.warm_start {
            "stores carried over from calibration"
        } else {
            "default stores"
        }
    ));

    out.push_str("\nBest parameters:\n");
    out.push_str(&fmt_params(&result.params));

    out.push_str("\nSkill (NSE):\n");
    out.push_str(&format_skill_table(skill));
    out
}

/// Format the summary of a plain simulation run.
pub fn format_simulation_summary(
    stats: &DatasetStats,
    params: &Gr4jParams,
    initial: Option<ModelState>,
    score: Option<&WindowScore>,
) -> String {
    let mut out = String::new();

    out.push_str("=== gr4j - rainfall-runoff simulation ===\n");
    out.push_str(&fmt_dataset(stats));
    out.push_str(&match initial {
        Some(s) => format!(
            "Initial stores: S={:.3} mm | R={:.3} mm\n",
            s.production_store, s.routing_store
        ),
        None => "Initial stores: half-full (default)\n".to_string(),
    });

    out.push_str("\nParameters:\n");
    out.push_str(&fmt_params(params));
    out.push('\n');

    match score {
        Some(w) => out.push_str(&format!(
            "Full-series NSE: {} ({} observed of {} days)\n",
            fmt_nse(w.nse),
            w.n_observed,
            w.n
        )),
        None => out.push_str("No observed discharge; skill not computed.\n"),
    }
    out
}

/// Per-window skill table.
pub fn format_skill_table(skill: &SkillReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<12} {:>8} {:>9} {:>10}\n", "window", "days", "observed", "nse"));
    out.push_str(&format!("{:-<12} {:-<8} {:-<9} {:-<10}\n", "", "", "", ""));
    for (name, w) in [
        ("calibration", &skill.calibration),
        ("validation", &skill.validation),
        ("full", &skill.full),
    ] {
        out.push_str(&format!(
            "{:<12} {:>8} {:>9} {:>10}\n",
            name,
            w.n,
            w.n_observed,
            fmt_nse(w.nse)
        ));
    }
    out
}

fn fmt_dataset(stats: &DatasetStats) -> String {
    let mut line = format!(
        "Data: n={} | {} to {} | observed={} | gaps={}",
        stats.n_rows, stats.first_date, stats.last_date, stats.n_observed, stats.gaps
    );
    if stats.invalid_observed > 0 {
        line.push_str(&format!(" | unreadable Q={}", stats.invalid_observed));
    }
    line.push('\n');
    line
}

fn fmt_params(params: &Gr4jParams) -> String {
    Gr4jParams::NAMES
        .iter()
        .zip(PARAM_LABELS)
        .zip(params.to_array())
        .map(|((name, label), v)| format!("- {name} ({label}): {v:.4}\n"))
        .collect()
}

/// NSE with 4 decimals, or `n/a` when undefined.
pub fn fmt_nse(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.4}")
    } else {
        "n/a".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OptimizerConfig, ParamBounds, Termination};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn stats() -> DatasetStats {
        DatasetStats {
            n_rows: 730,
            n_observed: 700,
            first_date: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
            last_date: NaiveDate::from_ymd_opt(2015, 12, 31).unwrap(),
            gaps: 0,
            invalid_observed: 0,
        }
    }

    fn window(n: usize, n_observed: usize, nse: f64) -> WindowScore {
        WindowScore { n, n_observed, nse }
    }

    fn skill() -> SkillReport {
        SkillReport {
            calibration: window(365, 350, 0.81234),
            validation: window(365, 350, f64::NEG_INFINITY),
            full: window(730, 700, 0.7),
            discharge: Vec::new(),
        }
    }

    #[test]
    fn skill_table_layout() {
        let expected = concat!(
            "window           days  observed        nse\n",
            "------------ -------- --------- ----------\n",
            "calibration       365       350     0.8123\n",
            "validation        365       350        n/a\n",
            "full              730       700     0.7000\n",
        );
        assert_eq!(format_skill_table(&skill()), expected);
    }

    #[test]
    fn run_summary_lists_parameters_and_stop_reason() {
        let config = RunConfig {
            input: PathBuf::from("basin.csv"),
            split_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            bounds: ParamBounds::default(),
            optimizer: OptimizerConfig::default(),
            warm_start: false,
            plot: false,
            plot_years: 2,
            plot_width: 100,
            plot_height: 25,
            export_results: None,
            export_params: None,
        };
        let result = CalibrationResult {
            params: Gr4jParams::new(312.5, -0.25, 88.0, 2.5),
            score: 0.81234,
            generations: 12,
            evaluations: 780,
            termination: Termination::Converged,
        };
        let txt = format_run_summary(&stats(), &config, &result, &skill());
        assert!(txt.contains("Input: basin.csv\n"));
        assert!(txt.contains("population=60 | seed=123"));
        assert!(txt.contains("Stopped: population converged after 12 generations (780 evaluations)\n"));
        assert!(txt.contains("- X1 (production store, mm): 312.5000\n"));
        assert!(txt.contains("- X2 (exchange, mm/day): -0.2500\n"));
        assert!(txt.contains("Validation start: default stores\n"));
    }

    #[test]
    fn simulation_summary_without_observations() {
        let txt = format_simulation_summary(
            &stats(),
            &Gr4jParams::new(300.0, 0.0, 90.0, 1.5),
            Some(ModelState::new(150.0, 45.0)),
            None,
        );
        assert!(txt.contains("Initial stores: S=150.000 mm | R=45.000 mm\n"));
        assert!(txt.contains("| gaps=0\n"));

        let mut thin = stats();
        thin.invalid_observed = 3;
        let txt = format_simulation_summary(&thin, &Gr4jParams::new(300.0, 0.0, 90.0, 1.5), None, None);
        assert!(txt.contains("| gaps=0 | unreadable Q=3\n"));
        assert!(txt.ends_with("No observed discharge; skill not computed.\n"));
    }
}
