//! Nash-Sutcliffe efficiency with missing observations.
//!
//! `NSE = 1 - Σ(obs - sim)² / Σ(obs - mean(obs))²`, computed only where the
//! observation is present (not NaN). Range: `(-inf, 1]`, 1 = perfect,
//! 0 = as good as predicting the observed mean.

use crate::error::{AppError, ErrorKind};

/// Pairs `(observed, simulated)` at the steps where an observation exists.
pub fn observed_pairs<'a>(
    observed: &'a [f64],
    simulated: &'a [f64],
) -> impl Iterator<Item = (f64, f64)> + 'a {
    observed
        .iter()
        .zip(simulated)
        .filter(|(o, _)| !o.is_nan())
        .map(|(&o, &s)| (o, s))
}

/// Number of steps carrying an observation.
pub fn count_observed(observed: &[f64]) -> usize {
    observed.iter().filter(|o| !o.is_nan()).count()
}

/// Nash-Sutcliffe efficiency of `simulated` against `observed`.
///
/// NaN in `observed` marks a missing value; those steps are excluded from
/// both the error term and the mean. Returns `f64::NEG_INFINITY` when no
/// observation is present or when the observed values have zero variance.
///
/// # Panics
/// Panics if the slices differ in length. Use [`skill_score`] when the
/// lengths come from outside the crate.
pub fn nse(observed: &[f64], simulated: &[f64]) -> f64 {
    assert_eq!(
        observed.len(),
        simulated.len(),
        "observed and simulated series must have equal length"
    );

    let n = count_observed(observed);
    if n == 0 {
        return f64::NEG_INFINITY;
    }

    let mean_obs = observed_pairs(observed, simulated).map(|(o, _)| o).sum::<f64>() / n as f64;
    let (numerator, denominator) = observed_pairs(observed, simulated).fold(
        (0.0, 0.0),
        |(num, den), (o, s)| (num + (o - s).powi(2), den + (o - mean_obs).powi(2)),
    );

    if denominator == 0.0 {
        return f64::NEG_INFINITY;
    }
    1.0 - numerator / denominator
}

/// Checked [`nse`] for callers whose series lengths are not known to match.
///
/// A length mismatch is an `ErrorKind::Input` error instead of a panic.
/// Degenerate windows still score `f64::NEG_INFINITY`.
pub fn skill_score(observed: &[f64], simulated: &[f64]) -> Result<f64, AppError> {
    if observed.len() != simulated.len() {
        return Err(AppError::new(
            ErrorKind::Input,
            format!(
                "Observed series has {} values but simulated has {}.",
                observed.len(),
                simulated.len()
            ),
        ));
    }
    Ok(nse(observed, simulated))
}
