//! Calibration: search the parameter box for the best skill on one window,
//! then re-run the winner on both windows and the full series for reporting.

use std::ops::Range;

use log::{debug, info, warn};

use crate::domain::{
    CalibrationResult, Gr4jParams, OptimizerConfig, ParamBounds, SkillReport, WindowScore,
};
use crate::error::{AppError, ErrorKind};
use crate::fit::de::DifferentialEvolution;
use crate::fit::optimizer::{CancelToken, Minimizer};
use crate::fit::split::WindowSplit;
use crate::metrics::{count_observed, nse};
use crate::models::{run, simulate};

/// Borrowed forcing and observation series of equal length.
///
/// `observed` uses NaN for missing values.
#[derive(Debug, Clone, Copy)]
pub struct Forcing<'a> {
    pub precip: &'a [f64],
    pub pet: &'a [f64],
    pub observed: &'a [f64],
}

impl<'a> Forcing<'a> {
    pub fn new(precip: &'a [f64], pet: &'a [f64], observed: &'a [f64]) -> Result<Self, AppError> {
        if precip.len() != pet.len() || precip.len() != observed.len() {
            return Err(AppError::new(
                ErrorKind::Input,
                format!(
                    "Series lengths differ: P={}, E={}, Q={}.",
                    precip.len(),
                    pet.len(),
                    observed.len()
                ),
            ));
        }
        Ok(Self {
            precip,
            pet,
            observed,
        })
    }

    pub fn len(&self) -> usize {
        self.precip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precip.is_empty()
    }

    /// Sub-series over `range`.
    pub fn window(&self, range: Range<usize>) -> Forcing<'a> {
        Forcing {
            precip: &self.precip[range.clone()],
            pet: &self.pet[range.clone()],
            observed: &self.observed[range],
        }
    }
}

/// Objective to minimize: negated skill of a candidate parameter vector.
///
/// Candidates the simulator rejects score `+inf`.
pub fn objective(forcing: &Forcing<'_>, point: &[f64]) -> f64 {
    let Ok(params) = Gr4jParams::from_point(point) else {
        return f64::INFINITY;
    };
    match simulate(forcing.precip, forcing.pet, &params, None) {
        Ok(q) => -nse(forcing.observed, &q),
        Err(_) => f64::INFINITY,
    }
}

/// Calibrate with differential evolution.
pub fn calibrate(
    forcing: &Forcing<'_>,
    bounds: &ParamBounds,
    config: &OptimizerConfig,
) -> Result<CalibrationResult, AppError> {
    info!(
        "calibrating on {} steps: {} generations max, population factor {}, seed {}",
        forcing.len(),
        config.max_generations,
        config.population_factor,
        config.seed
    );
    calibrate_with(&DifferentialEvolution::new(config.clone()), forcing, bounds, None)
}

/// Calibrate with any minimizer.
pub fn calibrate_with<M: Minimizer>(
    minimizer: &M,
    forcing: &Forcing<'_>,
    bounds: &ParamBounds,
    cancel: Option<&CancelToken>,
) -> Result<CalibrationResult, AppError> {
    bounds.validate()?;
    check_calibration_data(forcing)?;

    let minimum = minimizer.minimize(|x| objective(forcing, x), &bounds.to_array(), cancel)?;
    let params = Gr4jParams::from_point(&minimum.point)?;
    if !minimum.value.is_finite() {
        return Err(AppError::new(
            ErrorKind::Compute,
            "No candidate produced a finite skill score.",
        ));
    }

    Ok(CalibrationResult {
        params,
        score: -minimum.value,
        generations: minimum.generations,
        evaluations: minimum.evaluations,
        termination: minimum.termination,
    })
}

fn check_calibration_data(forcing: &Forcing<'_>) -> Result<(), AppError> {
    if forcing.is_empty() {
        return Err(AppError::new(
            ErrorKind::InsufficientData,
            "Calibration series is empty.",
        ));
    }
    // Rejects non-finite forcing up front instead of scoring every candidate +inf.
    simulate(
        forcing.precip,
        forcing.pet,
        &Gr4jParams::new(1.0, 0.0, 1.0, 1.0),
        None,
    )?;

    let n_observed = count_observed(forcing.observed);
    if n_observed == 0 {
        return Err(AppError::new(
            ErrorKind::InsufficientData,
            "Calibration window has no observed discharge.",
        ));
    }
    if nse(forcing.observed, forcing.observed) == f64::NEG_INFINITY {
        return Err(AppError::new(
            ErrorKind::InsufficientData,
            "Observed discharge is constant over the calibration window; skill is undefined.",
        ));
    }
    debug!("calibration window: {} steps, {n_observed} observed", forcing.len());
    Ok(())
}

/// Re-run `params` on the calibration window, the validation window and the
/// full series, and score each.
///
/// Each run starts from the default stores unless `warm_start` is set, in
/// which case the validation run continues from the calibration run's final
/// stores.
pub fn evaluate_windows(
    params: &Gr4jParams,
    forcing: &Forcing<'_>,
    split: &WindowSplit,
    warm_start: bool,
) -> Result<SkillReport, AppError> {
    if split.len() != forcing.len() {
        return Err(AppError::new(
            ErrorKind::Input,
            format!(
                "Split covers {} steps but the series has {}.",
                split.len(),
                forcing.len()
            ),
        ));
    }

    let cal = forcing.window(split.calibration.clone());
    let val = forcing.window(split.validation.clone());

    let cal_run = run(params, cal.precip, cal.pet, None)?;
    let val_initial = warm_start.then_some(cal_run.final_state);
    let val_q = simulate(val.precip, val.pet, params, val_initial)?;
    let full_q = simulate(forcing.precip, forcing.pet, params, None)?;

    let validation = score_window(val.observed, &val_q);
    if validation.n == 0 {
        warn!("Validation window is empty; its score is undefined.");
    }

    Ok(SkillReport {
        calibration: score_window(cal.observed, &cal_run.discharge),
        validation,
        full: score_window(forcing.observed, &full_q),
        discharge: full_q,
    })
}

/// Size, observation count and NSE of one scored window.
pub fn score_window(observed: &[f64], simulated: &[f64]) -> WindowScore {
    WindowScore {
        n: observed.len(),
        n_observed: count_observed(observed),
        nse: nse(observed, simulated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Termination;
    use crate::fit::random_search::{RandomSearch, RandomSearchConfig};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TRUE_PARAMS: Gr4jParams = Gr4jParams {
        x1: 300.0,
        x2: 0.5,
        x3: 100.0,
        x4: 3.0,
    };

    fn synthetic(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let precip: Vec<f64> = (0..n)
            .map(|_| {
                if rng.gen_bool(0.3) {
                    rng.gen_range(1.0..40.0)
                } else {
                    0.0
                }
            })
            .collect();
        let pet: Vec<f64> = (0..n)
            .map(|i| {
                let season = (2.0 * std::f64::consts::PI * i as f64 / 365.0).sin();
                3.0 + 1.5 * season
            })
            .collect();
        let observed = simulate(&precip, &pet, &TRUE_PARAMS, None).unwrap();
        (precip, pet, observed)
    }

    fn fast_config() -> OptimizerConfig {
        OptimizerConfig {
            max_generations: 30,
            population_factor: 5,
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn recovers_synthetic_parameters() {
        let (p, e, q) = synthetic(730, 11);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let config = OptimizerConfig {
            max_generations: 200,
            tol: 0.0,
            ..OptimizerConfig::default()
        };
        let result = calibrate(&forcing, &ParamBounds::default(), &config).unwrap();
        assert!(result.score > 0.99, "score {}", result.score);
        assert!(ParamBounds::default().contains(&result.params));
        assert_eq!(result.termination, Termination::MaxGenerations);
    }

    #[test]
    fn score_matches_rerun() {
        let (p, e, q) = synthetic(365, 3);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let result = calibrate(&forcing, &ParamBounds::default(), &fast_config()).unwrap();
        let rerun = nse(&q, &simulate(&p, &e, &result.params, None).unwrap());
        assert_eq!(result.score, rerun);
    }

    #[test]
    fn same_seed_same_result_with_or_without_threads() {
        let (p, e, q) = synthetic(365, 5);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let bounds = ParamBounds::default();
        let serial = OptimizerConfig {
            parallel: false,
            ..fast_config()
        };
        let a = calibrate(&forcing, &bounds, &fast_config()).unwrap();
        let b = calibrate(&forcing, &bounds, &fast_config()).unwrap();
        let c = calibrate(&forcing, &bounds, &serial).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn missing_observations_are_skipped() {
        let (p, e, mut q) = synthetic(365, 8);
        for v in q.iter_mut().step_by(3) {
            *v = f64::NAN;
        }
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let result = calibrate(&forcing, &ParamBounds::default(), &fast_config()).unwrap();
        assert!(result.score.is_finite());
    }

    #[test]
    fn any_minimizer_can_drive_calibration() {
        let (p, e, q) = synthetic(365, 13);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let rs = RandomSearch::new(RandomSearchConfig {
            samples: 300,
            ..RandomSearchConfig::default()
        });
        let result = calibrate_with(&rs, &forcing, &ParamBounds::default(), None).unwrap();
        assert_eq!(result.evaluations, 300);
        assert!(result.score.is_finite());
        assert!(ParamBounds::default().contains(&result.params));
    }

    #[test]
    fn pinned_bounds_fix_parameters() {
        let (p, e, q) = synthetic(365, 2);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let bounds = ParamBounds {
            x2: (0.5, 0.5),
            x4: (3.0, 3.0),
            ..ParamBounds::default()
        };
        let result = calibrate(&forcing, &bounds, &fast_config()).unwrap();
        assert_eq!(result.params.x2, 0.5);
        assert_eq!(result.params.x4, 3.0);
    }

    #[test]
    fn rejects_unusable_inputs() {
        let bounds = ParamBounds::default();
        let config = fast_config();

        let empty = Forcing::new(&[], &[], &[]).unwrap();
        let err = calibrate(&empty, &bounds, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let err = Forcing::new(&[1.0, 2.0], &[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);

        let missing = [f64::NAN; 3];
        let forcing = Forcing::new(&[1.0; 3], &[1.0; 3], &missing).unwrap();
        let err = calibrate(&forcing, &bounds, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let forcing = Forcing::new(&[1.0; 3], &[1.0; 3], &[2.0; 3]).unwrap();
        assert!(calibrate(&forcing, &bounds, &config).is_err());

        let forcing = Forcing::new(&[1.0, f64::NAN], &[1.0; 2], &[1.0, 2.0]).unwrap();
        let err = calibrate(&forcing, &bounds, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);

        let inverted = ParamBounds {
            x1: (10.0, 1.0),
            ..bounds
        };
        let forcing = Forcing::new(&[1.0; 3], &[1.0; 3], &[1.0, 2.0, 3.0]).unwrap();
        let err = calibrate(&forcing, &inverted, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn rejects_nonpositive_capacity_bounds() {
        let (p, e, q) = synthetic(200, 5);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let bounds = ParamBounds {
            x1: (-500.0, -10.0),
            x3: (-50.0, -1.0),
            ..ParamBounds::default()
        };
        let err = calibrate(&forcing, &bounds, &fast_config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);

        let zero_delay = ParamBounds {
            x4: (0.0, 20.0),
            ..ParamBounds::default()
        };
        assert!(calibrate(&forcing, &zero_delay, &fast_config()).is_err());
    }

    #[test]
    fn windows_are_scored_independently() {
        let (p, e, q) = synthetic(400, 21);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let split = WindowSplit::at(300, 400);
        let report = evaluate_windows(&TRUE_PARAMS, &forcing, &split, false).unwrap();

        assert_eq!(report.calibration.n, 300);
        assert_eq!(report.validation.n, 100);
        assert_eq!(report.full.n, 400);
        assert_eq!(report.discharge, q);
        assert!((report.full.nse - 1.0).abs() < 1e-12);
        assert!((report.calibration.nse - 1.0).abs() < 1e-12);
        // Cold restart on the validation window differs from the continuous run.
        assert!(report.validation.nse < 1.0);
    }

    #[test]
    fn warm_start_continues_from_calibration_state() {
        let (p, e, q) = synthetic(400, 21);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let split = WindowSplit::at(300, 400);
        let report = evaluate_windows(&TRUE_PARAMS, &forcing, &split, true).unwrap();
        assert!((report.validation.nse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_validation_window_scores_sentinel() {
        let (p, e, q) = synthetic(100, 4);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        let report = evaluate_windows(&TRUE_PARAMS, &forcing, &WindowSplit::at(100, 100), false).unwrap();
        assert_eq!(report.validation.n, 0);
        assert_eq!(report.validation.nse, f64::NEG_INFINITY);
    }

    #[test]
    fn split_must_cover_the_series() {
        let (p, e, q) = synthetic(50, 4);
        let forcing = Forcing::new(&p, &e, &q).unwrap();
        assert!(evaluate_windows(&TRUE_PARAMS, &forcing, &WindowSplit::at(10, 40), false).is_err());
    }
}
