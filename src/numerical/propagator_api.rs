use crate::numerical::ShootingBVP::shooting_problem::SolverError;
use log::{debug, info};
use nalgebra::DVector;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

// Runge-Kutta-Fehlberg 4(5) tableau
const RKF45_C: [f64; 6] = [0.0, 0.25, 0.375, 12.0 / 13.0, 1.0, 0.5];
const RKF45_A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [0.25, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0],
    [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0],
    [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0],
    [-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
];
const RKF45_B5: [f64; 6] = [
    16.0 / 135.0,
    0.0,
    6656.0 / 12825.0,
    28561.0 / 56430.0,
    -9.0 / 50.0,
    2.0 / 55.0,
];
const RKF45_B4: [f64; 6] = [
    25.0 / 216.0,
    0.0,
    1408.0 / 2565.0,
    2197.0 / 4104.0,
    -1.0 / 5.0,
    0.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
const MAX_STEPS: usize = 200_000;

/// samples of one integrated arc, a state vector per recorded time
#[derive(Debug, Clone)]
pub struct ArcTrajectory {
    pub t: Vec<f64>,
    pub y: Vec<DVector<f64>>,
}

/// worker handle the shooting solvers dispatch arc propagations through.
/// start()/stop() bracket the pool lifetime, so one pool can serve a whole
/// sequence of solves (e.g. along a continuation run).
pub trait Propagator: Send + Sync {
    fn start(&self);
    fn stop(&self);
    /// integrate every (span, seed) pair concurrently; arcs come back in
    /// submission order, each sampled at its accepted steps
    fn propagate(
        &self,
        rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
        spans: &[(f64, f64)],
        y0set: &[DVector<f64>],
        abstol: f64,
        reltol: f64,
    ) -> Result<Vec<ArcTrajectory>, SolverError>;
    /// integrate one trajectory, sampling exactly at the given grid times
    fn propagate_grid(
        &self,
        rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
        t_grid: &[f64],
        y0: &DVector<f64>,
        abstol: f64,
        reltol: f64,
    ) -> Result<ArcTrajectory, SolverError>;
}

fn rkf45_step(
    rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
    t: f64,
    y: &DVector<f64>,
    h: f64,
) -> (DVector<f64>, DVector<f64>) {
    let mut k: Vec<DVector<f64>> = Vec::with_capacity(6);
    k.push(rhs(t, y) * h);
    for i in 1..6 {
        let mut y_stage = y.clone();
        for j in 0..i {
            if RKF45_A[i][j] != 0.0 {
                y_stage += &k[j] * RKF45_A[i][j];
            }
        }
        k.push(rhs(t + RKF45_C[i] * h, &y_stage) * h);
    }
    let mut y_next = y.clone();
    let mut err = DVector::zeros(y.len());
    for i in 0..6 {
        if RKF45_B5[i] != 0.0 {
            y_next += &k[i] * RKF45_B5[i];
        }
        err += &k[i] * (RKF45_B5[i] - RKF45_B4[i]);
    }
    (y_next, err)
}

/// RMS of the error estimate against the mixed tolerance abstol + reltol*|y|
fn error_norm(
    err: &DVector<f64>,
    y: &DVector<f64>,
    y_next: &DVector<f64>,
    abstol: f64,
    reltol: f64,
) -> f64 {
    let mut acc = 0.0;
    for i in 0..err.len() {
        let scale = abstol + reltol * y[i].abs().max(y_next[i].abs());
        let e = err[i] / scale;
        acc += e * e;
    }
    (acc / err.len() as f64).sqrt()
}

/// advance (t, y) to target with the adaptive controller; h carries the step
/// size across calls. Accepted steps are recorded only when record_steps is
/// set, the caller samples the endpoint itself otherwise.
fn advance_to(
    rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
    t: &mut f64,
    y: &mut DVector<f64>,
    h: &mut f64,
    target: f64,
    abstol: f64,
    reltol: f64,
    traj: &mut ArcTrajectory,
    record_steps: bool,
) -> Result<(), SolverError> {
    if target == *t {
        return Ok(());
    }
    let dir = if target > *t { 1.0 } else { -1.0 };
    if *h == 0.0 || *h * dir < 0.0 {
        *h = (target - *t) / 100.0;
    }
    let h_min = (target - *t).abs() * 1e-14;
    let mut steps = 0usize;
    while (target - *t) * dir > 0.0 {
        if steps > MAX_STEPS {
            return Err(SolverError::PropagationFailed(format!(
                "step budget exhausted at t = {}",
                t
            )));
        }
        if h.abs() < h_min {
            return Err(SolverError::PropagationFailed(format!(
                "step size underflow at t = {}",
                t
            )));
        }
        let mut h_step = *h;
        let mut hit_target = false;
        if (*t + h_step - target) * dir >= 0.0 {
            h_step = target - *t;
            hit_target = true;
        }
        let (y_next, err) = rkf45_step(rhs, *t, y, h_step);
        if !y_next.iter().all(|v| v.is_finite()) {
            return Err(SolverError::PropagationFailed(format!(
                "non-finite state at t = {}",
                t
            )));
        }
        let err_norm = error_norm(&err, y, &y_next, abstol, reltol);
        let accepted = err_norm <= 1.0;
        if accepted {
            *t = if hit_target { target } else { *t + h_step };
            *y = y_next;
            if record_steps {
                traj.t.push(*t);
                traj.y.push(y.clone());
            }
        }
        let factor = if err_norm == 0.0 {
            MAX_FACTOR
        } else {
            (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
        };
        // keep the controller's step when the endpoint clamp shortened it
        if !(hit_target && accepted) {
            *h = h_step * factor;
        }
        steps += 1;
    }
    Ok(())
}

pub fn rkf45_span(
    rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
    tspan: (f64, f64),
    y0: &DVector<f64>,
    abstol: f64,
    reltol: f64,
) -> Result<ArcTrajectory, SolverError> {
    let (t0, tf) = tspan;
    let mut traj = ArcTrajectory {
        t: vec![t0],
        y: vec![y0.clone()],
    };
    let mut t = t0;
    let mut y = y0.clone();
    let mut h = (tf - t0) / 100.0;
    advance_to(rhs, &mut t, &mut y, &mut h, tf, abstol, reltol, &mut traj, true)?;
    Ok(traj)
}

pub fn rkf45_grid(
    rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
    t_grid: &[f64],
    y0: &DVector<f64>,
    abstol: f64,
    reltol: f64,
) -> Result<ArcTrajectory, SolverError> {
    assert!(!t_grid.is_empty(), "grid propagation needs at least one time");
    let mut traj = ArcTrajectory {
        t: vec![t_grid[0]],
        y: vec![y0.clone()],
    };
    let mut t = t_grid[0];
    let mut y = y0.clone();
    let mut h = (t_grid[t_grid.len() - 1] - t_grid[0]) / 100.0;
    for &target in &t_grid[1..] {
        advance_to(
            rhs, &mut t, &mut y, &mut h, target, abstol, reltol, &mut traj, false,
        )?;
        traj.t.push(t);
        traj.y.push(y.clone());
    }
    Ok(traj)
}

/// adaptive RKF45 behind a rayon pool; the pool is built on start() with one
/// thread per expected arc and torn down on stop()
pub struct RKF45Propagator {
    pub process_count: usize,
    pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
}

impl RKF45Propagator {
    pub fn new(process_count: usize) -> RKF45Propagator {
        assert!(process_count >= 1, "worker pool needs at least one thread");
        RKF45Propagator {
            process_count,
            pool: Mutex::new(None),
        }
    }
}

impl Propagator for RKF45Propagator {
    fn start(&self) {
        let mut slot = self.pool.lock().unwrap();
        if slot.is_none() {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.process_count)
                .build()
                .unwrap();
            *slot = Some(Arc::new(pool));
            info!("propagator pool started with {} threads", self.process_count);
        }
    }

    fn stop(&self) {
        let mut slot = self.pool.lock().unwrap();
        if slot.take().is_some() {
            info!("propagator pool stopped");
        }
    }

    fn propagate(
        &self,
        rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
        spans: &[(f64, f64)],
        y0set: &[DVector<f64>],
        abstol: f64,
        reltol: f64,
    ) -> Result<Vec<ArcTrajectory>, SolverError> {
        assert_eq!(spans.len(), y0set.len(), "one seed per span");
        let pool = {
            let slot = self.pool.lock().unwrap();
            slot.clone().ok_or(SolverError::NotStarted)?
        };
        pool.install(|| {
            spans
                .par_iter()
                .zip(y0set.par_iter())
                .map(|(span, y0)| rkf45_span(rhs, *span, y0, abstol, reltol))
                .collect::<Result<Vec<ArcTrajectory>, SolverError>>()
        })
    }

    fn propagate_grid(
        &self,
        rhs: &(dyn Fn(f64, &DVector<f64>) -> DVector<f64> + Sync),
        t_grid: &[f64],
        y0: &DVector<f64>,
        abstol: f64,
        reltol: f64,
    ) -> Result<ArcTrajectory, SolverError> {
        // serial integration, but the start()/stop() bracket still applies
        if self.pool.lock().unwrap().is_none() {
            return Err(SolverError::NotStarted);
        }
        debug!("grid propagation over {} points", t_grid.len());
        rkf45_grid(rhs, t_grid, y0, abstol, reltol)
    }
}
