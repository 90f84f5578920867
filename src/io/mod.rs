//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - result and weather CSV exports (`export`)
//! - calibrated parameter JSON read/write (`params`)

pub mod export;
pub mod ingest;
pub mod params;

pub use export::*;
pub use ingest::*;
pub use params::*;
