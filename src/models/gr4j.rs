//! Four-parameter soil-moisture accounting and routing model.
//!
//! One step of the recurrence, given stores `(S, R)` and forcing `(P, E)`:
//!
//! 1. net flux: `Pn = max(P - E, 0)`, `En = max(E - P, 0)`
//! 2. wetting (`Pn > 0`): `added = X1 * (1 - 1 / (1 + Pn / (X1 + ε)))`, capped at `Pn`;
//!    `S = min(X1, S + added)` and `Pn - added` becomes runoff
//! 3. drying (`Pn == 0`): `S = max(0, S - min(En, S))`, no runoff
//! 4. split: `q_quick = 0.1 * runoff`, `q_slow = 0.9 * runoff + X2` (exchange on every step)
//! 5. routing: `R' = min(R + q_slow, X3)`, `Rout = R' / (X4 + 1)`, `R = max(0, R' - Rout)`
//! 6. discharge: `Q = Rout + q_quick`
//!
//! Routing overflow above `X3` leaves the water balance.

use crate::domain::{Gr4jParams, ModelState};
use crate::error::{AppError, ErrorKind};

/// Guard against division by zero in the saturation curve when `X1 → 0`.
const SATURATION_EPS: f64 = 1e-12;

/// Share of runoff that bypasses the routing store.
const QUICK_FRACTION: f64 = 0.1;

/// Output of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    /// Simulated discharge, one value per input step.
    pub discharge: Vec<f64>,
    /// Stores after the last step.
    pub final_state: ModelState,
}

/// Apply one time step. Pure: the caller threads the returned state into the next call.
pub fn step(state: ModelState, params: &Gr4jParams, precip: f64, pet: f64) -> (ModelState, f64) {
    let (net_precip, net_evap) = if precip >= pet {
        (precip - pet, 0.0)
    } else {
        (0.0, pet - precip)
    };

    let (production_store, runoff) = if net_precip > 0.0 {
        let saturation = 1.0 - 1.0 / (1.0 + net_precip / (params.x1 + SATURATION_EPS));
        let added = (params.x1 * saturation).min(net_precip);
        (
            params.x1.min(state.production_store + added),
            net_precip - added,
        )
    } else {
        let withdrawn = net_evap.min(state.production_store);
        ((state.production_store - withdrawn).max(0.0), 0.0)
    };

    let quick = QUICK_FRACTION * runoff;
    let slow = (1.0 - QUICK_FRACTION) * runoff + params.x2;

    let routed = (state.routing_store + slow).min(params.x3);
    let outflow = routed / (params.x4 + 1.0);
    let routing_store = (routed - outflow).max(0.0);

    (
        ModelState::new(production_store, routing_store),
        outflow + quick,
    )
}

/// Run the model over a forcing series.
///
/// `initial` defaults to half-full stores. Fails before any step runs if
/// the series differ in length or carry non-finite values.
pub fn run(
    params: &Gr4jParams,
    precip: &[f64],
    pet: &[f64],
    initial: Option<ModelState>,
) -> Result<Simulation, AppError> {
    validate_forcing(precip, pet)?;

    let mut discharge = Vec::with_capacity(precip.len());
    let final_state = precip.iter().zip(pet).fold(
        initial.unwrap_or_else(|| ModelState::initial(params)),
        |state, (&p, &e)| {
            let (next, q) = step(state, params, p, e);
            discharge.push(q);
            next
        },
    );

    Ok(Simulation {
        discharge,
        final_state,
    })
}

/// Simulated discharge for the given forcing and parameters.
pub fn simulate(
    precip: &[f64],
    pet: &[f64],
    params: &Gr4jParams,
    initial: Option<ModelState>,
) -> Result<Vec<f64>, AppError> {
    run(params, precip, pet, initial).map(|sim| sim.discharge)
}

fn validate_forcing(precip: &[f64], pet: &[f64]) -> Result<(), AppError> {
    if precip.len() != pet.len() {
        return Err(AppError::new(
            ErrorKind::Input,
            format!(
                "Precipitation has {} values but evapotranspiration has {}.",
                precip.len(),
                pet.len()
            ),
        ));
    }
    if let Some(i) = precip.iter().position(|v| !v.is_finite()) {
        return Err(AppError::new(
            ErrorKind::Input,
            format!("Non-finite precipitation at step {i}."),
        ));
    }
    if let Some(i) = pet.iter().position(|v| !v.is_finite()) {
        return Err(AppError::new(
            ErrorKind::Input,
            format!("Non-finite evapotranspiration at step {i}."),
        ));
    }
    Ok(())
}
