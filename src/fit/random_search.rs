//! Uniform random sampling of the box, kept as a baseline minimizer.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::Termination;
use crate::error::{AppError, ErrorKind};
use crate::fit::optimizer::{
    Budget, CancelToken, Minimizer, Minimum, argmin, evaluate, interruption, scale, validate_bounds,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSearchConfig {
    /// Total number of sampled points.
    pub samples: usize,
    /// Points drawn and evaluated together; one batch counts as a generation.
    pub batch: usize,
    pub seed: u64,
    pub parallel: bool,
    pub time_budget_secs: Option<f64>,
}

impl Default for RandomSearchConfig {
    fn default() -> Self {
        Self {
            samples: 2_000,
            batch: 100,
            seed: 123,
            parallel: true,
            time_budget_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RandomSearch {
    config: RandomSearchConfig,
}

impl RandomSearch {
    pub fn new(config: RandomSearchConfig) -> Self {
        Self { config }
    }
}

impl Minimizer for RandomSearch {
    fn minimize<F>(
        &self,
        objective: F,
        bounds: &[(f64, f64)],
        cancel: Option<&CancelToken>,
    ) -> Result<Minimum, AppError>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        validate_bounds(bounds)?;
        if self.config.samples == 0 || self.config.batch == 0 {
            return Err(AppError::new(
                ErrorKind::Input,
                "Random search needs at least one sample and a non-zero batch size.",
            ));
        }
        let budget = Budget::new(self.config.time_budget_secs)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut evaluations = 0;
        let mut generations = 0;
        let mut termination = Termination::MaxGenerations;

        while evaluations < self.config.samples {
            if let Some(reason) = interruption(cancel, &budget) {
                termination = reason;
                break;
            }

            let size = self.config.batch.min(self.config.samples - evaluations);
            let batch: Vec<Vec<f64>> = (0..size)
                .map(|_| (0..bounds.len()).map(|_| rng.r#gen::<f64>()).collect())
                .collect();
            let energies = evaluate(&objective, &batch, bounds, self.config.parallel);
            evaluations += size;
            generations += 1;

            let i = argmin(&energies);
            if best.as_ref().is_none_or(|(_, value)| energies[i] < *value) {
                best = Some((batch[i].clone(), energies[i]));
            }
            if let Some((_, value)) = &best {
                debug!("random search: batch {generations}, best energy {value:.6}");
            }
        }

        let Some((unit, value)) = best else {
            return Err(AppError::new(
                ErrorKind::Compute,
                format!("Random search stopped before any evaluation ({}).", termination.describe()),
            ));
        };
        info!(
            "random search: {evaluations} evaluations ({}), best energy {value:.6}",
            termination.describe()
        );

        Ok(Minimum {
            point: scale(&unit, bounds),
            value,
            generations,
            evaluations,
            termination,
        })
    }
}
