//! Reporting utilities: formatted terminal output for calibration and simulation runs.

pub mod format;

pub use format::*;
