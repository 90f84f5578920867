//! Differential evolution (best/1/bin).
//!
//! Per generation:
//! - draw a mutation factor `F` from the configured range (dither)
//! - for each member `i`, pick two distinct others `r0, r1` and form
//!   `v = best + F * (x[r0] - x[r1])` in the unit cube
//! - binomial crossover with probability `CR`, one coordinate always taken
//!   from `v`; coordinates that left `[0, 1]` are resampled uniformly
//! - evaluate all trials, then replace members whose trial is no worse
//!
//! Selection is deferred until the whole generation has been evaluated, so
//! parallel and serial evaluation give bitwise-identical results.
//!
//! Stops when the spread of population energies satisfies
//! `std <= atol + tol * |mean|`, or after `max_generations`.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::domain::{OptimizerConfig, Termination};
use crate::error::{AppError, ErrorKind};
use crate::fit::optimizer::{
    Budget, CancelToken, Minimizer, Minimum, argmin, evaluate, interruption, scale, validate_bounds,
};

/// Smallest population the mutation scheme can work with.
const MIN_POPULATION: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct DifferentialEvolution {
    config: OptimizerConfig,
}

impl DifferentialEvolution {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn population_size(&self, dims: usize) -> usize {
        (self.config.population_factor * dims).max(MIN_POPULATION)
    }

    fn validate(&self) -> Result<(), AppError> {
        let c = &self.config;
        let (f_lo, f_hi) = c.mutation;
        if !(f_lo.is_finite() && f_hi.is_finite()) || f_lo < 0.0 || f_lo > f_hi || f_hi > 2.0 {
            return Err(AppError::new(
                ErrorKind::Input,
                format!("Mutation range must satisfy 0 <= lo <= hi <= 2 (got [{f_lo}, {f_hi}])."),
            ));
        }
        if !(0.0..=1.0).contains(&c.recombination) {
            return Err(AppError::new(
                ErrorKind::Input,
                format!("Recombination must be in [0, 1] (got {}).", c.recombination),
            ));
        }
        if c.population_factor == 0 {
            return Err(AppError::new(ErrorKind::Input, "Population factor must be at least 1."));
        }
        if !(c.tol >= 0.0 && c.atol >= 0.0) {
            return Err(AppError::new(
                ErrorKind::Input,
                format!("Tolerances must be non-negative (tol={}, atol={}).", c.tol, c.atol),
            ));
        }
        Ok(())
    }

    fn draw_mutation(&self, rng: &mut StdRng) -> f64 {
        let (lo, hi) = self.config.mutation;
        if lo < hi { rng.gen_range(lo..hi) } else { lo }
    }

    fn trial(&self, rng: &mut StdRng, population: &[Vec<f64>], best: usize, i: usize, f: f64) -> Vec<f64> {
        let (r0, r1) = pick_two_others(rng, population.len(), i);
        let dims = population[i].len();
        let forced = rng.gen_range(0..dims);

        let mut trial = population[i].clone();
        for j in 0..dims {
            let cross = rng.gen_bool(self.config.recombination);
            if cross || j == forced {
                trial[j] = population[best][j] + f * (population[r0][j] - population[r1][j]);
            }
        }
        for v in trial.iter_mut() {
            if !(0.0..=1.0).contains(v) {
                *v = rng.gen_range(0.0..1.0);
            }
        }
        trial
    }

    fn converged(&self, energies: &[f64]) -> bool {
        if energies.iter().any(|e| !e.is_finite()) {
            return false;
        }
        let n = energies.len() as f64;
        let mean = energies.iter().sum::<f64>() / n;
        let var = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
        var.sqrt() <= self.config.atol + self.config.tol * mean.abs()
    }
}

impl Minimizer for DifferentialEvolution {
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
        self.validate()?;
        let budget = Budget::new(self.config.time_budget_secs)?;

        let dims = bounds.len();
        let pop_size = self.population_size(dims);
        let parallel = self.config.parallel;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut population = latin_hypercube(&mut rng, pop_size, dims);
        let mut energies = evaluate(&objective, &population, bounds, parallel);
        let mut evaluations = pop_size;
        let mut best = argmin(&energies);
        debug!("de: initial population {pop_size}, best energy {:.6}", energies[best]);

        let mut generations = 0;
        let mut termination = Termination::MaxGenerations;

        while generations < self.config.max_generations {
            if let Some(reason) = interruption(cancel, &budget) {
                termination = reason;
                break;
            }

            let f = self.draw_mutation(&mut rng);
            let trials: Vec<Vec<f64>> = (0..pop_size)
                .map(|i| self.trial(&mut rng, &population, best, i, f))
                .collect();
            let trial_energies = evaluate(&objective, &trials, bounds, parallel);
            evaluations += pop_size;

            for (i, (trial, e)) in trials.into_iter().zip(trial_energies).enumerate() {
                if e <= energies[i] {
                    population[i] = trial;
                    energies[i] = e;
                }
            }
            best = argmin(&energies);
            generations += 1;
            debug!("de: generation {generations}, F={f:.3}, best energy {:.6}", energies[best]);

            if self.converged(&energies) {
                termination = Termination::Converged;
                break;
            }
        }

        info!(
            "de: stopped after {generations} generations ({}), {evaluations} evaluations, best energy {:.6}",
            termination.describe(),
            energies[best]
        );

        Ok(Minimum {
            point: scale(&population[best], bounds),
            value: energies[best],
            generations,
            evaluations,
            termination,
        })
    }
}

/// Latin hypercube sample of `n` points in the unit cube: each coordinate
/// puts exactly one point in each of `n` equal strata.
fn latin_hypercube(rng: &mut StdRng, n: usize, dims: usize) -> Vec<Vec<f64>> {
    let mut points = vec![vec![0.0; dims]; n];
    let mut strata: Vec<usize> = (0..n).collect();
    for j in 0..dims {
        strata.shuffle(rng);
        for (point, &k) in points.iter_mut().zip(&strata) {
            point[j] = (k as f64 + rng.r#gen::<f64>()) / n as f64;
        }
    }
    points
}

/// Two distinct indices in `0..n`, both different from `exclude`.
fn pick_two_others(rng: &mut StdRng, n: usize, exclude: usize) -> (usize, usize) {
    let mut draw = |taken: &[usize]| loop {
        let k = rng.gen_range(0..n);
        if k != exclude && !taken.contains(&k) {
            return k;
        }
    };
    let r0 = draw(&[]);
    let r1 = draw(&[r0]);
    (r0, r1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 1.0).powi(2)).sum()
    }

    fn rosenbrock(x: &[f64]) -> f64 {
        x.windows(2)
            .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
            .sum()
    }

    fn config(max_generations: usize) -> OptimizerConfig {
        OptimizerConfig {
            max_generations,
            tol: 0.0,
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn finds_sphere_minimum() {
        let de = DifferentialEvolution::new(config(200));
        let min = de.minimize(sphere, &[(-5.0, 5.0); 3], None).unwrap();
        assert!(min.value < 1e-6, "value {}", min.value);
        for v in &min.point {
            assert!((v - 1.0).abs() < 1e-2);
        }
    }

    #[test]
    fn finds_rosenbrock_valley() {
        let de = DifferentialEvolution::new(config(400));
        let min = de.minimize(rosenbrock, &[(-2.0, 2.0); 2], None).unwrap();
        assert!(min.value < 1e-4, "value {}", min.value);
    }

    #[test]
    fn stays_inside_the_box() {
        // Unconstrained minimum at 1.0 lies outside the box; the best point must sit on the edge.
        let de = DifferentialEvolution::new(config(100));
        let min = de.minimize(sphere, &[(2.0, 3.0), (-3.0, -2.0)], None).unwrap();
        assert!(min.point[0] >= 2.0 && min.point[0] <= 3.0);
        assert!(min.point[1] >= -3.0 && min.point[1] <= -2.0);
        assert!((min.point[0] - 2.0).abs() < 1e-2);
        assert!((min.point[1] + 2.0).abs() < 1e-2);
    }

    #[test]
    fn pinned_dimension_stays_fixed() {
        let de = DifferentialEvolution::new(config(30));
        let min = de.minimize(sphere, &[(-5.0, 5.0), (4.0, 4.0)], None).unwrap();
        assert_eq!(min.point[1], 4.0);
    }

    #[test]
    fn same_seed_gives_identical_result() {
        let serial = DifferentialEvolution::new(OptimizerConfig {
            parallel: false,
            ..config(50)
        });
        let parallel = DifferentialEvolution::new(OptimizerConfig {
            parallel: true,
            ..config(50)
        });
        let a = serial.minimize(rosenbrock, &[(-2.0, 2.0); 3], None).unwrap();
        let b = parallel.minimize(rosenbrock, &[(-2.0, 2.0); 3], None).unwrap();
        let c = parallel.minimize(rosenbrock, &[(-2.0, 2.0); 3], None).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn different_seeds_explore_differently() {
        let a = DifferentialEvolution::new(config(5))
            .minimize(rosenbrock, &[(-2.0, 2.0); 2], None)
            .unwrap();
        let b = DifferentialEvolution::new(OptimizerConfig { seed: 7, ..config(5) })
            .minimize(rosenbrock, &[(-2.0, 2.0); 2], None)
            .unwrap();
        assert_ne!(a.point, b.point);
    }

    #[test]
    fn counts_generations_and_evaluations() {
        let de = DifferentialEvolution::new(config(10));
        let min = de.minimize(sphere, &[(-5.0, 5.0); 4], None).unwrap();
        assert_eq!(min.termination, Termination::MaxGenerations);
        assert_eq!(min.generations, 10);
        assert_eq!(min.evaluations, 60 * 11);
    }

    #[test]
    fn flat_objective_converges_immediately() {
        let de = DifferentialEvolution::new(OptimizerConfig::default());
        let min = de.minimize(|_| 3.0, &[(0.0, 1.0); 2], None).unwrap();
        assert_eq!(min.termination, Termination::Converged);
        assert_eq!(min.generations, 1);
    }

    #[test]
    fn nan_objective_does_not_poison_search() {
        let f = |x: &[f64]| if x[0] < 0.0 { f64::NAN } else { sphere(x) };
        let de = DifferentialEvolution::new(config(100));
        let min = de.minimize(f, &[(-5.0, 5.0); 2], None).unwrap();
        assert!(min.value.is_finite());
        assert!(min.value < 1e-4);
    }

    #[test]
    fn cancelled_before_start_keeps_initial_best() {
        let token = CancelToken::new();
        token.cancel();
        let de = DifferentialEvolution::new(config(100));
        let min = de.minimize(sphere, &[(-5.0, 5.0); 2], Some(&token)).unwrap();
        assert_eq!(min.termination, Termination::Cancelled);
        assert_eq!(min.generations, 0);
        assert_eq!(min.evaluations, 30);
    }

    #[test]
    fn time_budget_stops_search() {
        let de = DifferentialEvolution::new(OptimizerConfig {
            time_budget_secs: Some(0.0),
            ..config(100)
        });
        let min = de.minimize(sphere, &[(-5.0, 5.0); 2], None).unwrap();
        assert_eq!(min.termination, Termination::TimeBudget);
    }

    #[test]
    fn rejects_bad_settings() {
        let bad_cr = DifferentialEvolution::new(OptimizerConfig {
            recombination: 1.5,
            ..OptimizerConfig::default()
        });
        assert!(bad_cr.minimize(sphere, &[(0.0, 1.0)], None).is_err());

        let bad_f = DifferentialEvolution::new(OptimizerConfig {
            mutation: (1.0, 0.5),
            ..OptimizerConfig::default()
        });
        assert!(bad_f.minimize(sphere, &[(0.0, 1.0)], None).is_err());

        let de = DifferentialEvolution::default();
        assert!(de.minimize(sphere, &[(1.0, 0.0)], None).is_err());
    }

    #[test]
    fn latin_hypercube_fills_every_stratum() {
        let mut rng = StdRng::seed_from_u64(1);
        let pts = latin_hypercube(&mut rng, 20, 3);
        for j in 0..3 {
            let mut strata: Vec<usize> = pts.iter().map(|p| (p[j] * 20.0).floor() as usize).collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..20).collect::<Vec<_>>());
        }
    }

    #[test]
    fn population_has_a_floor() {
        let de = DifferentialEvolution::new(OptimizerConfig {
            population_factor: 1,
            ..OptimizerConfig::default()
        });
        assert_eq!(de.population_size(1), 5);
        assert_eq!(DifferentialEvolution::default().population_size(4), 60);
    }
}
