//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - threaded through the simulator and the optimizer
//! - written to the calibrated-parameter JSON file
//! - reloaded later for simulation on new forcing

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};

/// Number of free model parameters.
pub const PARAM_COUNT: usize = 4;

/// The four free parameters of the rainfall-runoff model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gr4jParams {
    /// Production store capacity (mm).
    pub x1: f64,
    /// Groundwater exchange added to the routing store every step (mm/day, signed).
    pub x2: f64,
    /// Routing store capacity (mm).
    pub x3: f64,
    /// Routing time constant (days).
    pub x4: f64,
}

impl Gr4jParams {
    pub const NAMES: [&'static str; PARAM_COUNT] = ["X1", "X2", "X3", "X4"];

    pub fn new(x1: f64, x2: f64, x3: f64, x4: f64) -> Self {
        Self { x1, x2, x3, x4 }
    }

    /// Build from an optimizer point `[x1, x2, x3, x4]`.
    pub fn from_point(point: &[f64]) -> Result<Self, AppError> {
        match point {
            [x1, x2, x3, x4] => Ok(Self::new(*x1, *x2, *x3, *x4)),
            _ => Err(AppError::new(
                ErrorKind::Input,
                format!("Expected {PARAM_COUNT} parameters, got {}.", point.len()),
            )),
        }
    }

    pub fn to_array(self) -> [f64; PARAM_COUNT] {
        [self.x1, self.x2, self.x3, self.x4]
    }
}

/// Levels of the two stores carried from one step to the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    /// Production (soil moisture) store level S, in `[0, X1]`.
    pub production_store: f64,
    /// Routing store level R, in `[0, X3]`.
    pub routing_store: f64,
}

impl ModelState {
    pub fn new(production_store: f64, routing_store: f64) -> Self {
        Self {
            production_store,
            routing_store,
        }
    }

    /// Half-full stores: `S = X1/2`, `R = X3/2`.
    pub fn initial(params: &Gr4jParams) -> Self {
        Self::new(params.x1 * 0.5, params.x3 * 0.5)
    }
}

/// Search box for calibration, one `(lo, hi)` pair per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub x1: (f64, f64),
    pub x2: (f64, f64),
    pub x3: (f64, f64),
    pub x4: (f64, f64),
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            x1: (50.0, 2500.0),
            x2: (-5.0, 5.0),
            x3: (20.0, 500.0),
            x4: (1.0, 20.0),
        }
    }
}

impl ParamBounds {
    /// Parameters that must be strictly positive: X1, X3 and X4. X2 is signed.
    const POSITIVE: [bool; PARAM_COUNT] = [true, false, true, true];

    pub fn to_array(self) -> [(f64, f64); PARAM_COUNT] {
        [self.x1, self.x2, self.x3, self.x4]
    }

    /// Every pair must be finite with `lo <= hi`. `lo == hi` pins the parameter.
    /// X1, X3 and X4 must be strictly positive over the whole box.
    pub fn validate(&self) -> Result<(), AppError> {
        for (i, (name, (lo, hi))) in Gr4jParams::NAMES.iter().zip(self.to_array()).enumerate() {
            if !(lo.is_finite() && hi.is_finite()) {
                return Err(AppError::new(
                    ErrorKind::Input,
                    format!("Bounds for {name} must be finite (got [{lo}, {hi}])."),
                ));
            }
            if lo > hi {
                return Err(AppError::new(
                    ErrorKind::Input,
                    format!("Bounds for {name} are inverted: lower {lo} > upper {hi}."),
                ));
            }
            if Self::POSITIVE[i] && lo <= 0.0 {
                return Err(AppError::new(
                    ErrorKind::Input,
                    format!("Bounds for {name} must be strictly positive (got lower {lo})."),
                ));
            }
        }
        Ok(())
    }

    pub fn contains(&self, params: &Gr4jParams) -> bool {
        self.to_array()
            .iter()
            .zip(params.to_array())
            .all(|(&(lo, hi), v)| v >= lo && v <= hi)
    }
}

/// Settings for the global optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Maximum number of generations after the initial population.
    pub max_generations: usize,
    /// Population size is `population_factor * 4` (at least 5).
    pub population_factor: usize,
    /// Seed for every random draw the optimizer makes.
    pub seed: u64,
    /// Mutation factor range; a fresh factor is drawn from it every generation.
    pub mutation: (f64, f64),
    /// Crossover probability.
    pub recombination: f64,
    /// Relative convergence tolerance on the spread of population energies.
    pub tol: f64,
    /// Absolute convergence tolerance on the spread of population energies.
    pub atol: f64,
    /// Evaluate candidates of one generation on the rayon pool.
    pub parallel: bool,
    /// Optional wall-clock budget in seconds, checked once per generation.
    pub time_budget_secs: Option<f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_generations: 40,
            population_factor: 15,
            seed: 123,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            parallel: true,
            time_budget_secs: None,
        }
    }
}

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    MaxGenerations,
    Cancelled,
    TimeBudget,
}

impl Termination {
    pub fn describe(self) -> &'static str {
        match self {
            Termination::Converged => "population converged",
            Termination::MaxGenerations => "generation budget exhausted",
            Termination::Cancelled => "cancelled",
            Termination::TimeBudget => "time budget exhausted",
        }
    }
}

/// One dated row of forcing and (optional) observed discharge.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub precip: f64,
    pub pet: f64,
    pub observed: Option<f64>,
}

/// Best parameters found by a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub params: Gr4jParams,
    /// NSE reached on the calibration series (the negated objective).
    #[serde(with = "score_serde")]
    pub score: f64,
    pub generations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

/// Skill on one window of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowScore {
    /// Number of time steps in the window.
    pub n: usize,
    /// Number of steps with an observed value.
    pub n_observed: usize,
    /// Nash-Sutcliffe efficiency; `-inf` when there is no basis for scoring.
    #[serde(with = "score_serde")]
    pub nse: f64,
}

/// Reporting re-runs of the best parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillReport {
    pub calibration: WindowScore,
    pub validation: WindowScore,
    pub full: WindowScore,
    /// Simulated discharge over the full series.
    #[serde(skip)]
    pub discharge: Vec<f64>,
}

/// A full calibration run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub split_date: NaiveDate,
    pub bounds: ParamBounds,
    pub optimizer: OptimizerConfig,
    /// Start the validation run from the calibration run's final stores.
    pub warm_start: bool,

    pub plot: bool,
    pub plot_years: u32,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_results: Option<PathBuf>,
    pub export_params: Option<PathBuf>,
}

/// A saved parameter file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub params: Gr4jParams,
    #[serde(default)]
    pub split_date: Option<NaiveDate>,
    #[serde(default)]
    pub scores: Option<SkillReport>,
    #[serde(default)]
    pub optimizer: Option<OptimizerConfig>,
}

/// JSON has no infinity: an undefined score is written as `null` and read back as `-inf`.
mod score_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        value.is_finite().then_some(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_half_full() {
        let params = Gr4jParams::new(100.0, 0.0, 50.0, 2.0);
        let state = ModelState::initial(&params);
        assert_eq!(state.production_store, 50.0);
        assert_eq!(state.routing_store, 25.0);
    }

    #[test]
    fn from_point_rejects_wrong_arity() {
        assert!(Gr4jParams::from_point(&[1.0, 2.0, 3.0]).is_err());
        let p = Gr4jParams::from_point(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(p.to_array(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn bounds_validation() {
        assert!(ParamBounds::default().validate().is_ok());

        let pinned = ParamBounds {
            x2: (0.0, 0.0),
            ..ParamBounds::default()
        };
        assert!(pinned.validate().is_ok());

        let inverted = ParamBounds {
            x3: (500.0, 20.0),
            ..ParamBounds::default()
        };
        let err = inverted.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.message().contains("X3"));

        let infinite = ParamBounds {
            x1: (50.0, f64::INFINITY),
            ..ParamBounds::default()
        };
        assert!(infinite.validate().is_err());

        for bad in [
            ParamBounds {
                x1: (-500.0, -10.0),
                ..ParamBounds::default()
            },
            ParamBounds {
                x3: (0.0, 100.0),
                ..ParamBounds::default()
            },
            ParamBounds {
                x4: (-2.0, 5.0),
                ..ParamBounds::default()
            },
        ] {
            let err = bad.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Input);
            assert!(err.message().contains("strictly positive"));
        }
        let signed = ParamBounds {
            x2: (-5.0, -1.0),
            ..ParamBounds::default()
        };
        assert!(signed.validate().is_ok());
    }

    #[test]
    fn undefined_score_survives_json() {
        let score = WindowScore {
            n: 0,
            n_observed: 0,
            nse: f64::NEG_INFINITY,
        };
        let json = serde_json::to_string(&score).unwrap();
        assert_eq!(json, r#"{"n":0,"n_observed":0,"nse":null}"#);
        let back: WindowScore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, score);
    }

    #[test]
    fn bounds_contains() {
        let b = ParamBounds::default();
        assert!(b.contains(&Gr4jParams::new(300.0, 0.5, 100.0, 3.0)));
        assert!(!b.contains(&Gr4jParams::new(3000.0, 0.5, 100.0, 3.0)));
    }
}
