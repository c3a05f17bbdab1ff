use super::STM_dynamics::split_augmented;
use crate::numerical::propagator_api::ArcTrajectory;
use itertools::izip;
use log::info;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tabled::{builder::Builder, settings::Style};

/// log a duration in a readable unit; returns the unit label and the value
pub fn elapsed_time(elapsed: Duration) -> (String, f64) {
    let secs = elapsed.as_secs_f64();
    if secs < 1.0 {
        info!("Elapsed {} ms", elapsed.as_millis());
        (" ms ".to_string(), elapsed.as_millis() as f64)
    } else if secs < 60.0 {
        info!("Elapsed {} s", elapsed.as_secs());
        (" s".to_string(), elapsed.as_secs() as f64)
    } else if secs < 3600.0 {
        info!("Elapsed {} min", elapsed.as_secs() / 60);
        (" min".to_string(), elapsed.as_secs() as f64 / 60.0)
    } else {
        info!("Elapsed {} h", elapsed.as_secs() / 3600);
        (" h".to_string(), elapsed.as_secs() as f64 / 3600.0)
    }
}

/// tic/tac accounting of where a solve spends its time. The shooting loop
/// runs its phases strictly one after another, so a single tic instant
/// serves all four accumulators.
#[derive(Debug, Clone)]
pub struct CustomTimer {
    pub start: Instant,
    tic: Instant,
    pub propagation: Duration,
    pub residual: Duration,
    pub jacobian: Duration,
    pub linear_solve: Duration,
}

impl CustomTimer {
    pub fn new() -> CustomTimer {
        CustomTimer {
            start: Instant::now(),
            tic: Instant::now(),
            propagation: Duration::ZERO,
            residual: Duration::ZERO,
            jacobian: Duration::ZERO,
            linear_solve: Duration::ZERO,
        }
    }
    pub fn start(&mut self) {
        *self = CustomTimer::new();
    }
    pub fn propagation_tic(&mut self) {
        self.tic = Instant::now();
    }
    pub fn propagation_tac(&mut self) {
        self.propagation += self.tic.elapsed();
    }
    pub fn residual_tic(&mut self) {
        self.tic = Instant::now();
    }
    pub fn residual_tac(&mut self) {
        self.residual += self.tic.elapsed();
    }
    pub fn jacobian_tic(&mut self) {
        self.tic = Instant::now();
    }
    pub fn jacobian_tac(&mut self) {
        self.jacobian += self.tic.elapsed();
    }
    pub fn linear_solve_tic(&mut self) {
        self.tic = Instant::now();
    }
    pub fn linear_solve_tac(&mut self) {
        self.linear_solve += self.tic.elapsed();
    }

    /// percentage table of the phase shares, logged at info level; phases
    /// under half a percent are left out
    pub fn get_all(&self) -> HashMap<String, String> {
        let total = self.start.elapsed();
        let total_ns = total.as_nanos() as f64;
        let mut timer_data: HashMap<String, String> = HashMap::new();
        let total_string = elapsed_time(total);
        timer_data.insert(
            "time elapsed, ".to_string() + total_string.0.as_str(),
            format!("{}", total_string.1),
        );
        let phases = [
            ("Propagation", self.propagation),
            ("Residual", self.residual),
            ("Jacobian", self.jacobian),
            ("Linear solve", self.linear_solve),
        ];
        let mut accounted = 0.0;
        for (label, spent) in phases {
            let percent = 100.0 * spent.as_nanos() as f64 / total_ns;
            accounted += percent;
            if percent > 0.5 {
                let spent_string = elapsed_time(spent);
                timer_data.insert(
                    format!("{} (%, {})", label, spent_string.0),
                    format!("{}, {}", (percent * 1000.0).round() / 1000.0, spent_string.1),
                );
            }
        }
        let other_percent = 100.0 - accounted;
        if other_percent > 0.5 {
            timer_data.insert(
                "other %".to_string(),
                format!("{} ", (other_percent * 1000.0).round() / 1000.0),
            );
        }
        let mut table = Builder::from(timer_data.clone()).build();
        table.with(Style::modern_rounded());
        info!("\n \n TIMER DATA \n \n {}", table.to_string());
        timer_data
    }
}

pub fn linspace(a: f64, b: f64, n: usize) -> DVector<f64> {
    assert!(n >= 2, "linspace needs at least two points");
    DVector::from_fn(n, |i, _| a + (b - a) * (i as f64) / ((n - 1) as f64))
}

/// arc partition of the guess grid: arc i runs from sample floor(i/m * N) to
/// sample floor((i+1)/m * N), the last arc is clamped to the final sample
pub fn partition_spans(x: &DVector<f64>, number_arcs: usize) -> Vec<(f64, f64)> {
    let n_points = x.len();
    let m = number_arcs as f64;
    let mut spans = Vec::with_capacity(number_arcs);
    for i in 0..number_arcs {
        let left = ((i as f64) / m * (n_points as f64)).floor() as usize;
        let mut right = (((i + 1) as f64) / m * (n_points as f64)).floor() as usize;
        if i == number_arcs - 1 {
            right = n_points - 1;
        }
        spans.push((x[left], x[right]));
    }
    spans
}

/// initial states for every arc, read off the guess at the partition heads
pub fn seed_states(solution_y: &DMatrix<f64>, number_arcs: usize) -> Vec<DVector<f64>> {
    let n_points = solution_y.ncols();
    let m = number_arcs as f64;
    (0..number_arcs)
        .map(|i| {
            let idx = ((i as f64) / m * (n_points as f64)).floor() as usize;
            solution_y.column(idx).into_owned()
        })
        .collect()
}

/// one shooting segment after propagation: the sampled augmented trajectory
/// and the terminal state / sensitivity the correction needs
#[derive(Debug, Clone)]
pub struct ShootingArc {
    pub t: Vec<f64>,
    pub y: Vec<DVector<f64>>,
    pub yb: DVector<f64>,
    pub phi: DMatrix<f64>,
}

impl ShootingArc {
    pub fn from_trajectory(n_odes: usize, traj: ArcTrajectory) -> ShootingArc {
        let last = traj.y.last().unwrap();
        let (yb, phi) = split_augmented(last, n_odes);
        ShootingArc {
            t: traj.t,
            y: traj.y,
            yb,
            phi,
        }
    }
}

/// glue converged arcs into one monotone grid; interior knots are shared, so
/// every arc after the first drops its leading sample
pub fn stitch_arcs(arcs: &[ShootingArc], n_odes: usize) -> (DVector<f64>, DMatrix<f64>) {
    let mut ts: Vec<f64> = Vec::new();
    let mut cols: Vec<DVector<f64>> = Vec::new();
    for (k, arc) in arcs.iter().enumerate() {
        let skip = if k == 0 { 0 } else { 1 };
        for (t, y) in izip!(&arc.t[skip..], &arc.y[skip..]) {
            ts.push(*t);
            cols.push(y.rows(0, n_odes).into_owned());
        }
    }
    (DVector::from_vec(ts), DMatrix::from_columns(&cols))
}
