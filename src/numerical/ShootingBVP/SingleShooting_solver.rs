use super::BC_jacobian::bc_jacobian;
use super::STM_dynamics::{DerivativeMethod, stm_ode, stm_seed};
use super::Shooting_utils::{CustomTimer, ShootingArc, elapsed_time, stitch_arcs};
use super::boundary_residual::assemble_residual;
use super::shooting_problem::{
    BVPSolution, ShootingOutcome, SolverError, TwoPointBVP, lift_to_complex,
};
use crate::numerical::propagator_api::{Propagator, RKF45Propagator};
use log::{debug, error, info, warn};
use nalgebra::DVector;
use simplelog::LevelFilter;
use simplelog::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tabled::{builder::Builder, settings::Style};

/// Damped Newton iteration over one arc spanning the whole interval: the
/// classic single shooting method, sharing the residual, Jacobian and
/// sensitivity machinery of the multi-arc solver but with no continuity rows.
pub struct SingleShooting {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub max_error: f64,
    pub derivative_method: DerivativeMethod,
    pub verbose: bool,
    pub loglevel: Option<String>,
    /// iteration count of the last solve
    pub i: usize,
    worker: Option<Arc<dyn Propagator>>,
    custom_timer: CustomTimer,
    calc_statistics: HashMap<String, usize>,
}

impl SingleShooting {
    pub fn new(
        tolerance: f64,
        max_iterations: usize,
        max_error: f64,
        derivative_method: DerivativeMethod,
        verbose: bool,
    ) -> Result<SingleShooting, SolverError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(SolverError::InvalidConfiguration(
                "tolerance must be positive and finite".to_string(),
            ));
        }
        if max_iterations == 0 {
            return Err(SolverError::InvalidConfiguration(
                "at least one iteration must be allowed".to_string(),
            ));
        }
        if !(max_error.is_finite() && max_error > 0.0) {
            return Err(SolverError::InvalidConfiguration(
                "max_error must be positive and finite".to_string(),
            ));
        }
        if !(derivative_method.step().is_finite() && derivative_method.step() > 0.0) {
            return Err(SolverError::InvalidConfiguration(
                "derivative step must be positive and finite".to_string(),
            ));
        }
        Ok(SingleShooting {
            tolerance,
            max_iterations,
            max_error,
            derivative_method,
            verbose,
            loglevel: None,
            i: 0,
            worker: None,
            custom_timer: CustomTimer::new(),
            calc_statistics: HashMap::new(),
        })
    }

    pub fn set_worker(&mut self, worker: Arc<dyn Propagator>) {
        self.worker = Some(worker);
    }

    pub fn set_solver_params(&mut self, loglevel: Option<String>) {
        self.loglevel = loglevel;
    }

    pub fn get_statistics(&self) -> &HashMap<String, usize> {
        &self.calc_statistics
    }

    /// the derivative policy must match what the problem's closures carry;
    /// the mismatch is only visible once the problem is in hand
    fn task_check(&self, bvp: &TwoPointBVP) -> Result<(), SolverError> {
        if self.derivative_method.requires_complex() && !bvp.is_complex_capable() {
            return Err(SolverError::InvalidConfiguration(
                "complex-step differentiation requested for a problem built from real closures"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn main_loop(&mut self, bvp: &TwoPointBVP) -> ShootingOutcome {
        let injected = self.worker.clone();
        let local;
        let ode45: &dyn Propagator = match &injected {
            Some(w) => w.as_ref(),
            None => {
                local = RKF45Propagator::new(1);
                local.start();
                &local
            }
        };
        let outcome = self.newton_loop(bvp, ode45);
        if injected.is_none() {
            ode45.stop();
        }
        outcome
    }

    fn newton_loop(&mut self, bvp: &TwoPointBVP, ode45: &dyn Propagator) -> ShootingOutcome {
        let n_odes = bvp.solution.n_odes();
        let n_params = bvp.solution.n_params();
        let aux = bvp.solution.aux.clone();
        let deriv_func = &bvp.deriv_func;
        let bc_func = &bvp.bc_func;
        let method = self.derivative_method;
        let abstol = self.tolerance / 10.0;

        let mut param_guess: DVector<f64> = match &bvp.solution.parameters {
            Some(p) => p.clone(),
            None => DVector::zeros(0),
        };
        let x = &bvp.solution.x;
        let tspan = (x[0], x[x.len() - 1]);
        let mut y0 = bvp.solution.y.column(0).into_owned();
        let stm0 = stm_seed(n_odes);

        let mut iter: usize = 1;
        loop {
            if iter > self.max_iterations {
                warn!("Maximum iterations exceeded!");
                self.i = iter - 1;
                return ShootingOutcome::MaxIterationsExceeded;
            }
            self.i = iter;

            let mut y_aug = DVector::zeros(n_odes + n_odes * n_odes);
            y_aug.rows_mut(0, n_odes).copy_from(&y0);
            y_aug.rows_mut(n_odes, n_odes * n_odes).copy_from(&stm0);

            let p_c = lift_to_complex(&param_guess);
            let aux_ref = &aux;
            let aug_rhs = |t: f64, y_aug: &DVector<f64>| -> DVector<f64> {
                stm_ode(t, y_aug, n_odes, deriv_func, &p_c, aux_ref, method)
            };

            self.custom_timer.propagation_tic();
            let propagated = ode45.propagate(&aug_rhs, &[tspan], &[y_aug], abstol, 1e-5);
            self.custom_timer.propagation_tac();
            let mut trajs = match propagated {
                Ok(t) => t,
                Err(e) => {
                    warn!("propagation failed: {}", e);
                    return ShootingOutcome::ResidualDiverged;
                }
            };
            *self
                .calc_statistics
                .entry("number of arc propagations".to_string())
                .or_insert(0) += 1;
            let arc = ShootingArc::from_trajectory(n_odes, trajs.remove(0));

            self.custom_timer.residual_tic();
            let heads = [y0.clone()];
            let tails = [arc.yb.clone()];
            let res = assemble_residual(bc_func, &heads, &tails, &param_guess, &aux);
            self.custom_timer.residual_tac();

            let r1 = res.norm();
            let r_max = res.amax();
            if self.verbose {
                info!("Residue: {}", r1);
            } else {
                debug!("Residue: {}", r1);
            }

            if r_max < self.tolerance {
                if self.verbose {
                    info!("Converged in {} iterations.", iter);
                }
                let (x1, y1) = stitch_arcs(std::slice::from_ref(&arc), n_odes);
                let parameters = if n_params > 0 {
                    Some(param_guess.clone())
                } else {
                    None
                };
                let mut sol = BVPSolution::new(x1, y1, parameters).with_aux(aux.clone());
                sol.converged = true;
                return ShootingOutcome::Converged(sol);
            }

            if !r1.is_finite() || r1 > self.max_error {
                warn!("Residue: {}", r1);
                warn!("Residue exceeded max_error");
                return ShootingOutcome::ResidualDiverged;
            }

            self.custom_timer.jacobian_tic();
            let phis = [arc.phi.clone()];
            let jac = bc_jacobian(bc_func, &heads, &tails, &phis, &param_guess, &aux, method);
            self.custom_timer.jacobian_tac();
            *self
                .calc_statistics
                .entry("number of jacobian evaluations".to_string())
                .or_insert(0) += 1;

            let alpha = if r_max < 10.0 * self.tolerance { 1.0 } else { 0.5 };

            self.custom_timer.linear_solve_tic();
            let solved = jac.lu().solve(&(-&res));
            self.custom_timer.linear_solve_tac();
            let delta = match solved {
                Some(d) if d.iter().all(|v| v.is_finite()) => d,
                _ => {
                    warn!("Jacobian is singular, no correction possible");
                    return ShootingOutcome::SingularJacobian;
                }
            };
            *self
                .calc_statistics
                .entry("number of solving linear systems".to_string())
                .or_insert(0) += 1;

            let dy0 = delta * alpha;
            if n_params > 0 {
                param_guess += dy0.rows(n_odes, n_params).into_owned();
            }
            y0 += dy0.rows(0, n_odes).into_owned();
            iter += 1;
        }
    }

    pub fn solver(&mut self, bvp: &mut TwoPointBVP) -> BVPSolution {
        if let Err(err) = self.task_check(bvp) {
            error!("{}", err);
            self.calc_statistics.clear();
            self.i = 0;
            let mut sol = bvp.solution.clone();
            sol.converged = false;
            bvp.solution = sol.clone();
            return sol;
        }
        self.custom_timer.start();
        self.calc_statistics.clear();
        self.i = 0;
        let begin = Instant::now();
        let outcome = self.main_loop(bvp);
        self.custom_timer.get_all();
        let end = begin.elapsed();
        elapsed_time(end);
        let time = end.as_secs_f64() as usize;
        self.calc_statistics
            .insert("time elapsed, s".to_string(), time);

        let sol = match outcome {
            ShootingOutcome::Converged(sol) => {
                info!("solution converged in {} iterations", self.i);
                sol
            }
            other => {
                warn!("solver finished without convergence: {}", other);
                let mut sol = bvp.solution.clone();
                sol.converged = false;
                sol
            }
        };
        self.calc_statistics();
        bvp.solution = sol.clone();
        sol
    }

    // wrapper around solver function to implement logging
    pub fn solve(&mut self, bvp: &mut TwoPointBVP) -> BVPSolution {
        let is_logging_disabled = self
            .loglevel
            .as_ref()
            .map(|level| level == "off" || level == "none")
            .unwrap_or(false);

        if is_logging_disabled {
            self.solver(bvp)
        } else {
            let loglevel = self.loglevel.clone();
            let log_option = if let Some(level) = loglevel {
                match level.as_str() {
                    "debug" => LevelFilter::Debug,
                    "info" => LevelFilter::Info,
                    "warn" => LevelFilter::Warn,
                    "error" => LevelFilter::Error,
                    _ => panic!("loglevel must be debug, info, warn or error"),
                }
            } else {
                LevelFilter::Info
            };
            println!(" \n \n Program started with loglevel: {}", log_option);
            let logger_instance = CombinedLogger::init(vec![TermLogger::new(
                log_option,
                Config::default(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )]);

            match logger_instance {
                Ok(()) => {
                    let res = self.solver(bvp);
                    info!(" \n \n Program ended");
                    res
                }
                Err(_) => self.solver(bvp),
            }
        }
    }

    fn calc_statistics(&self) {
        let mut stats = self.calc_statistics.clone();
        stats.insert("number of iterations".to_string(), self.i);
        let mut table = Builder::from(stats).build();
        table.with(Style::modern_rounded());
        info!("\n \n CALC STATISTICS \n \n {}", table.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn configuration_is_validated_up_front() {
        let fd = DerivativeMethod::finite_difference();
        assert!(SingleShooting::new(1e-6, 50, 100.0, fd, false).is_ok());
        assert!(SingleShooting::new(f64::NAN, 50, 100.0, fd, false).is_err());
        assert!(SingleShooting::new(1e-6, 0, 100.0, fd, false).is_err());
        assert!(SingleShooting::new(1e-6, 50, f64::INFINITY, fd, false).is_err());
    }

    #[test]
    fn complex_step_on_real_closures_is_refused() {
        let x = DVector::from_vec(vec![0.0, 0.5, 1.0]);
        let y = DMatrix::zeros(1, 3);
        let guess_y = y.clone();
        let mut bvp = TwoPointBVP::from_real_functions(
            |_t, y, _p, _aux| y.clone(),
            |ya, _yb, _p, _aux| ya.clone(),
            BVPSolution::new(x, y, None),
        );
        let mut solver =
            SingleShooting::new(1e-6, 10, 100.0, DerivativeMethod::complex_step(), false).unwrap();
        solver.set_solver_params(Some("off".to_string()));
        let sol = solver.solve(&mut bvp);
        assert!(!sol.converged);
        assert_eq!(sol.y, guess_y);
        assert_eq!(solver.i, 0);
        assert!(solver.get_statistics().is_empty());
    }
}
