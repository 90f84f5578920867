//! Rainfall-runoff model implementation.
//!
//! The model is a pure step function plus a run loop that threads the
//! store state through the forcing series, so each run owns its state and
//! many runs can be evaluated side by side.

pub mod gr4j;

pub use gr4j::*;
