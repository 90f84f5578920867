//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model parameters and store state (`Gr4jParams`, `ModelState`)
//! - calibration settings (`ParamBounds`, `OptimizerConfig`, `RunConfig`)
//! - dated input rows (`DailyRecord`)
//! - calibration outputs (`CalibrationResult`, `SkillReport`, `ParamsFile`)

pub mod types;

pub use types::*;
