//! Goodness-of-fit scores used as the calibration objective.

pub mod nse;

pub use nse::*;
