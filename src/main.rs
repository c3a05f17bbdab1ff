#![allow(non_snake_case)]
pub mod Utils;
pub mod numerical;

use crate::Utils::logger::{default_result_name, default_state_headers, save_solution_to_csv};
use crate::numerical::Examples_and_utils::TestProblem;
use crate::numerical::ShootingBVP::MultipleShooting_solver::MultipleShooting;
use crate::numerical::ShootingBVP::STM_dynamics::DerivativeMethod;
use crate::numerical::ShootingBVP::Shooting_api::ShootingSolver;
use crate::numerical::propagator_api::{Propagator, RKF45Propagator};
use std::sync::Arc;
use strum::IntoEnumIterator;

fn main() {
    let example = 2;
    match example {
        0 => {
            // MULTIPLE SHOOTING FOR A LINEAR OSCILLATOR
            // y'' = -y, y(0) = 0, y(pi/2) = 1, exact solution y = sin(x)
            // four arcs, forward-difference sensitivities, verbose residual log
            let problem = TestProblem::LinearOscillator;
            let mut bvp = problem.bvp(40);
            let mut solver = MultipleShooting::new(
                1e-8,
                50,
                100.0,
                DerivativeMethod::finite_difference(),
                4,
                true,
            )
            .unwrap();
            solver.set_solver_params(Some("info".to_string()));
            let sol = solver.solve(&mut bvp);
            println!("converged: {}, {} grid points", sol.converged, sol.n_points());
            // save the stitched trajectory next to the binary
            let headers = default_state_headers(sol.n_odes());
            let name = default_result_name("csv");
            save_solution_to_csv(&sol, &headers, &name, &"t".to_string()).unwrap();
            println!("result saved to {}", name);
        }
        1 => {
            // EIGENVALUE ESTIMATION
            // y'' = -p*y with y(0) = 0, y(1) = 0, y'(0) = 1; the third
            // boundary condition pays for the free parameter, p -> pi^2
            let problem = TestProblem::SineEigenvalue;
            let mut bvp = problem.bvp(25);
            let mut solver =
                ShootingSolver::from_method_name(1e-8, 60, 100.0, "csd", 4, true).unwrap();
            let sol = solver.solve(&mut bvp);
            let p = sol.parameters.as_ref().unwrap()[0];
            println!("p = {}, pi^2 = {}", p, std::f64::consts::PI.powi(2));
            println!("converged in {} iterations", solver.iterations());
        }
        2 => {
            // WHOLE CATALOG AGAINST EXACT SOLUTIONS
            for problem in TestProblem::iter() {
                let mut bvp = problem.bvp(30);
                let mut solver = ShootingSolver::new(
                    1e-8,
                    60,
                    100.0,
                    DerivativeMethod::finite_difference(),
                    3,
                    false,
                )
                .unwrap();
                solver.set_solver_params(Some("off".to_string()));
                let sol = solver.solve(&mut bvp);
                let mut max_residual = 0.0f64;
                for i in 0..sol.n_points() {
                    let res = (sol.y[(0, i)] - problem.exact(sol.x[i])).abs();
                    max_residual = max_residual.max(res);
                }
                println!(
                    "{}: converged {}, max residual against exact solution {:.3e}",
                    problem.name(),
                    sol.converged,
                    max_residual
                );
            }
        }
        3 => {
            // ONE WORKER POOL SHARED BY A SEQUENCE OF SOLVES
            // the pool outlives every solver, as along a continuation run
            let worker = Arc::new(RKF45Propagator::new(6));
            worker.start();
            for number_arcs in [2usize, 3, 6] {
                let problem = TestProblem::HyperbolicSine;
                let mut bvp = problem.bvp(30);
                let mut solver = MultipleShooting::new(
                    1e-8,
                    50,
                    100.0,
                    DerivativeMethod::finite_difference(),
                    number_arcs,
                    false,
                )
                .unwrap();
                solver.set_worker(worker.clone());
                solver.set_solver_params(Some("off".to_string()));
                let sol = solver.solve(&mut bvp);
                println!(
                    "{} arcs: converged {}, statistics {:?}",
                    number_arcs,
                    sol.converged,
                    solver.get_statistics()
                );
            }
            worker.stop();
        }
        _ => {
            println!("example not found");
        }
    }
}
