//! Derivative-free minimization over a bounded box.
//!
//! The calibrator only needs "minimize this scalar function inside these
//! bounds"; concrete search strategies implement [`Minimizer`] so they can be
//! swapped without touching the model or the skill metric.
//!
//! Shared conventions for implementations:
//! - candidates are generated in the unit cube and scaled into the box, so a
//!   proposed point never leaves the box
//! - all random draws come from one seeded generator in a fixed order
//! - one batch of candidates may be evaluated on the rayon pool; results are
//!   collected in index order, so the outcome does not depend on threading
//! - a non-finite objective value ranks as `+inf`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::domain::Termination;
use crate::error::{AppError, ErrorKind};

/// Best point found by a minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    /// Completed iterations after the initial sample.
    pub generations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

/// A bounded, derivative-free global minimizer.
pub trait Minimizer {
    fn minimize<F>(
        &self,
        objective: F,
        bounds: &[(f64, f64)],
        cancel: Option<&CancelToken>,
    ) -> Result<Minimum, AppError>
    where
        F: Fn(&[f64]) -> f64 + Sync;
}

/// Cooperative cancellation flag, checked by minimizers between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Optional wall-clock budget measured from construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    started: Instant,
    limit: Option<Duration>,
}

impl Budget {
    pub(crate) fn new(limit_secs: Option<f64>) -> Result<Self, AppError> {
        let limit = match limit_secs {
            None => None,
            Some(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(AppError::new(
                    ErrorKind::Input,
                    format!("Time budget must be a non-negative number of seconds (got {secs})."),
                ));
            }
        };
        Ok(Self {
            started: Instant::now(),
            limit,
        })
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.started.elapsed() >= limit)
    }
}

/// Reason to stop before the next iteration, if any.
pub(crate) fn interruption(cancel: Option<&CancelToken>, budget: &Budget) -> Option<Termination> {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        Some(Termination::Cancelled)
    } else if budget.exhausted() {
        Some(Termination::TimeBudget)
    } else {
        None
    }
}

pub(crate) fn validate_bounds(bounds: &[(f64, f64)]) -> Result<(), AppError> {
    if bounds.is_empty() {
        return Err(AppError::new(ErrorKind::Input, "Search box has no dimensions."));
    }
    for (i, &(lo, hi)) in bounds.iter().enumerate() {
        if !(lo.is_finite() && hi.is_finite()) || lo > hi {
            return Err(AppError::new(
                ErrorKind::Input,
                format!("Invalid bounds for dimension {i}: [{lo}, {hi}]."),
            ));
        }
    }
    Ok(())
}

/// Map a unit-cube point into the box.
pub(crate) fn scale(unit: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    unit.iter()
        .zip(bounds)
        .map(|(&u, &(lo, hi))| lo + u * (hi - lo))
        .collect()
}

pub(crate) fn energy(value: f64) -> f64 {
    if value.is_nan() { f64::INFINITY } else { value }
}

/// Evaluate unit-cube candidates, in order.
pub(crate) fn evaluate<F>(objective: &F, unit_points: &[Vec<f64>], bounds: &[(f64, f64)], parallel: bool) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let eval = |u: &Vec<f64>| energy(objective(&scale(u, bounds)));
    if parallel {
        unit_points.par_iter().map(eval).collect()
    } else {
        unit_points.iter().map(eval).collect()
    }
}

/// Index of the lowest energy; ties go to the lowest index.
pub(crate) fn argmin(energies: &[f64]) -> usize {
    let mut best = 0;
    for (i, &e) in energies.iter().enumerate().skip(1) {
        if e < energies[best] {
            best = i;
        }
    }
    best
}
