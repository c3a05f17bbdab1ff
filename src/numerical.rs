///  Example#1
/// ```
/// // solve the linear oscillator y'' = -y on [0, pi/2] with y(0) = 0, y(pi/2) = 1
/// // split over 4 shooting arcs; exact solution is sin(t)
/// use RustedShooting::numerical::ShootingBVP::STM_dynamics::DerivativeMethod;
/// use RustedShooting::numerical::ShootingBVP::Shooting_api::ShootingSolver;
/// use RustedShooting::numerical::ShootingBVP::shooting_problem::{BVPSolution, TwoPointBVP};
/// use nalgebra::{DMatrix, DVector};
/// use std::f64::consts::FRAC_PI_2;
///
/// let n = 30;
/// let x = DVector::from_fn(n, |i, _| FRAC_PI_2 * i as f64 / (n as f64 - 1.0));
/// let mut y = DMatrix::zeros(2, n);
/// for i in 0..n {
///     y[(0, i)] = x[i] / FRAC_PI_2;
///     y[(1, i)] = 1.0;
/// }
/// let guess = BVPSolution::new(x, y, None);
/// let mut bvp = TwoPointBVP::from_real_functions(
///     |_t, y, _p, _aux| DVector::from_vec(vec![y[1], -y[0]]),
///     |ya, yb, _p, _aux| DVector::from_vec(vec![ya[0], yb[0] - 1.0]),
///     guess,
/// );
/// let mut solver = ShootingSolver::new(
///     1e-8, 50, 100.0, DerivativeMethod::finite_difference(), 4, false,
/// )
/// .unwrap();
/// let solution = solver.solve(&mut bvp);
/// assert!(solution.converged);
/// assert!((solution.y[(0, solution.n_points() - 1)] - 1.0).abs() < 1e-6);
/// ```
pub mod ShootingBVP;
/// adaptive RKF45 stepper behind the worker-pool trait the shooting solvers
/// fan arc propagations through
pub mod propagator_api;
/// small catalog of boundary value problems with known exact solutions,
/// used in tests and benches
pub mod Examples_and_utils;
