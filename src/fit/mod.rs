//! Calibration orchestration.
//!
//! Responsibilities:
//!
//! - pluggable bounded minimizers (differential evolution, random search)
//! - objective = negated skill of a simulated run (candidates evaluated in parallel)
//! - chronological calibration / validation split and the reporting re-runs

pub mod calibrate;
pub mod de;
pub mod optimizer;
pub mod random_search;
pub mod split;

pub use calibrate::*;
pub use de::*;
pub use optimizer::{CancelToken, Minimizer, Minimum};
pub use random_search::*;
pub use split::*;
