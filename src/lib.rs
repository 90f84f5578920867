//! `gr4j-calib` library crate.
//!
//! The binary (`gr4j`) is a thin wrapper around this library so that:
//!
//! - the model, the skill metric and the calibrator are testable without spawning processes
//! - a calibration can be driven from other code with any [`fit::Minimizer`]
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod metrics;
pub mod models;
pub mod plot;
pub mod report;
