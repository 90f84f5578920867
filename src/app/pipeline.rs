//! Shared run logic behind the `calibrate` and `simulate` commands.
//!
//! Keeping the workflow here leaves `app` with presentation only:
//! ingest -> split -> calibrate -> re-run per window -> scores
//!
//! Everything returned is plain data, so callers decide what to print,
//! plot or export.

use std::path::Path;

use chrono::Utc;
use log::info;

use crate::domain::{
    CalibrationResult, Gr4jParams, ModelState, ParamsFile, RunConfig, SkillReport, WindowScore,
};
use crate::error::{AppError, ErrorKind};
use crate::fit::{Forcing, WindowSplit, calibrate, evaluate_windows, score_window, split_by_date};
use crate::io::ingest::{IngestedData, load_records};
use crate::io::params::TOOL_NAME;
use crate::models::simulate;

/// All computed outputs of a single `gr4j calibrate` run.
#[derive(Debug, Clone)]
pub struct CalibrationOutput {
    pub ingest: IngestedData,
    pub split: WindowSplit,
    pub result: CalibrationResult,
    pub skill: SkillReport,
}

impl CalibrationOutput {
    /// Parameter file describing this run.
    pub fn params_file(&self, config: &RunConfig) -> ParamsFile {
        ParamsFile {
            tool: TOOL_NAME.to_string(),
            created: Utc::now(),
            params: self.result.params,
            split_date: Some(config.split_date),
            scores: Some(self.skill.clone()),
            optimizer: Some(config.optimizer.clone()),
        }
    }
}

/// Execute the full calibration pipeline and return the computed outputs.
pub fn run_calibration(config: &RunConfig) -> Result<CalibrationOutput, AppError> {
    config.bounds.validate()?;

    // 1) Ingest and split by date.
    let ingest = load_records(&config.input, true)?;
    let precip = ingest.precip();
    let pet = ingest.pet();
    let observed = ingest.observed();
    let forcing = Forcing::new(&precip, &pet, &observed)?;
    let split = split_by_date(&ingest.dates(), config.split_date)?;
    info!(
        "split at {}: {} calibration days, {} validation days",
        config.split_date,
        split.calibration.len(),
        split.validation.len()
    );

    // 2) Search on the calibration window only.
    let result = calibrate(
        &forcing.window(split.calibration.clone()),
        &config.bounds,
        &config.optimizer,
    )?;

    // 3) Re-run the winner on each window for reporting.
    let skill = evaluate_windows(&result.params, &forcing, &split, config.warm_start)?;

    Ok(CalibrationOutput {
        ingest,
        split,
        result,
        skill,
    })
}

/// All computed outputs of a single `gr4j simulate` run.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub ingest: IngestedData,
    pub params: Gr4jParams,
    pub initial: Option<ModelState>,
    pub discharge: Vec<f64>,
    /// Full-series skill, when the input carries observations.
    pub score: Option<WindowScore>,
}

/// Run the model with fixed parameters over a forcing file.
pub fn run_simulation(
    input: &Path,
    params: Gr4jParams,
    initial: Option<ModelState>,
) -> Result<SimulationOutput, AppError> {
    validate_params(&params)?;
    if let Some(state) = initial {
        validate_initial_state(&params, &state)?;
    }

    let ingest = load_records(input, false)?;
    let observed = ingest.observed();
    let discharge = simulate(&ingest.precip(), &ingest.pet(), &params, initial)?;
    let score = (ingest.stats.n_observed > 0).then(|| score_window(&observed, &discharge));

    Ok(SimulationOutput {
        ingest,
        params,
        initial,
        discharge,
        score,
    })
}

/// X1, X3 and X4 must be strictly positive, the same rule the calibration box follows.
pub fn validate_params(params: &Gr4jParams) -> Result<(), AppError> {
    let [x1, x2, x3, x4] = params.to_array();
    if !(x1.is_finite() && x2.is_finite() && x3.is_finite() && x4.is_finite()) {
        return Err(AppError::new(ErrorKind::Input, "Parameters must be finite."));
    }
    if x1 <= 0.0 || x3 <= 0.0 || x4 <= 0.0 {
        return Err(AppError::new(
            ErrorKind::Input,
            format!("X1, X3 and X4 must be strictly positive (got X1={x1}, X3={x3}, X4={x4})."),
        ));
    }
    Ok(())
}

fn validate_initial_state(params: &Gr4jParams, state: &ModelState) -> Result<(), AppError> {
    let s = state.production_store;
    let r = state.routing_store;
    if !(0.0..=params.x1).contains(&s) || !(0.0..=params.x3).contains(&r) {
        return Err(AppError::new(
            ErrorKind::Input,
            format!(
                "Initial stores must lie within capacity: S={s} in [0, {}], R={r} in [0, {}].",
                params.x1, params.x3
            ),
        ));
    }
    Ok(())
}
