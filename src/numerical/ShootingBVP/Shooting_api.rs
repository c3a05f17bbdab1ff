use super::MultipleShooting_solver::MultipleShooting;
use super::STM_dynamics::DerivativeMethod;
use super::SingleShooting_solver::SingleShooting;
use super::shooting_problem::{BVPSolution, SolverError, TwoPointBVP};
use crate::numerical::propagator_api::Propagator;
use std::collections::HashMap;
use std::sync::Arc;

/// Facade over the two shooting strategies. Construction validates the
/// settings and picks the strategy from the arc count: one arc is plain
/// single shooting, more than one is multiple shooting.
pub enum ShootingSolver {
    Single(SingleShooting),
    Multiple(MultipleShooting),
}

impl ShootingSolver {
    pub fn new(
        tolerance: f64,
        max_iterations: usize,
        max_error: f64,
        derivative_method: DerivativeMethod,
        number_arcs: usize,
        verbose: bool,
    ) -> Result<ShootingSolver, SolverError> {
        match number_arcs {
            0 => Err(SolverError::InvalidConfiguration(
                "at least one arc is required".to_string(),
            )),
            1 => Ok(ShootingSolver::Single(SingleShooting::new(
                tolerance,
                max_iterations,
                max_error,
                derivative_method,
                verbose,
            )?)),
            _ => Ok(ShootingSolver::Multiple(MultipleShooting::new(
                tolerance,
                max_iterations,
                max_error,
                derivative_method,
                number_arcs,
                verbose,
            )?)),
        }
    }

    /// same as new(), with the derivative policy given by its short name
    /// ("fd" or "csd") at the default step
    pub fn from_method_name(
        tolerance: f64,
        max_iterations: usize,
        max_error: f64,
        method_name: &str,
        number_arcs: usize,
        verbose: bool,
    ) -> Result<ShootingSolver, SolverError> {
        let method = DerivativeMethod::from_name(method_name)?;
        ShootingSolver::new(
            tolerance,
            max_iterations,
            max_error,
            method,
            number_arcs,
            verbose,
        )
    }

    pub fn set_worker(&mut self, worker: Arc<dyn Propagator>) {
        match self {
            ShootingSolver::Single(s) => s.set_worker(worker),
            ShootingSolver::Multiple(m) => m.set_worker(worker),
        }
    }

    pub fn set_solver_params(&mut self, loglevel: Option<String>) {
        match self {
            ShootingSolver::Single(s) => s.set_solver_params(loglevel),
            ShootingSolver::Multiple(m) => m.set_solver_params(loglevel),
        }
    }

    pub fn solve(&mut self, bvp: &mut TwoPointBVP) -> BVPSolution {
        match self {
            ShootingSolver::Single(s) => s.solve(bvp),
            ShootingSolver::Multiple(m) => m.solve(bvp),
        }
    }

    pub fn number_arcs(&self) -> usize {
        match self {
            ShootingSolver::Single(_) => 1,
            ShootingSolver::Multiple(m) => m.number_arcs,
        }
    }

    pub fn iterations(&self) -> usize {
        match self {
            ShootingSolver::Single(s) => s.i,
            ShootingSolver::Multiple(m) => m.i,
        }
    }

    pub fn get_statistics(&self) -> &HashMap<String, usize> {
        match self {
            ShootingSolver::Single(s) => s.get_statistics(),
            ShootingSolver::Multiple(m) => m.get_statistics(),
        }
    }
}
