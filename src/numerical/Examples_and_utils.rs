//! catalog of small two-point boundary value problems with known exact
//! solutions, used in tests, benches and the demo binary
use crate::numerical::ShootingBVP::shooting_problem::{
    BVPSolution, BoundaryFn, DerivFn, TwoPointBVP,
};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::sync::Arc;
use strum_macros::EnumIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum TestProblem {
    /// y'' = -y, y(0) = 0, y(pi/2) = 1, exact y = sin(t)
    LinearOscillator,
    /// y'' = 0, y(0) = 0, y(1) = 1, exact y = t
    StraightLine,
    /// y'' = y, y(0) = 0, y(1) = sinh(1), exact y = sinh(t)
    HyperbolicSine,
    /// y'' = -p*y with y(0) = 0, y(1) = 0, y'(0) = 1; the unknown
    /// parameter converges to pi^2 and the exact solution is sin(pi*t)/pi
    SineEigenvalue,
    /// y'' = -w2*y with the squared frequency w2 = 4 carried in the aux
    /// payload, y(0) = 0, y(pi/4) = 1, exact y = sin(2*t)
    AuxFrequencySpring,
}

impl TestProblem {
    pub fn name(&self) -> String {
        format!("{:?}", self)
    }

    pub fn span(&self) -> (f64, f64) {
        match self {
            TestProblem::LinearOscillator => (0.0, FRAC_PI_2),
            TestProblem::StraightLine => (0.0, 1.0),
            TestProblem::HyperbolicSine => (0.0, 1.0),
            TestProblem::SineEigenvalue => (0.0, 1.0),
            TestProblem::AuxFrequencySpring => (0.0, FRAC_PI_4),
        }
    }

    pub fn n_odes(&self) -> usize {
        2
    }

    pub fn deriv(&self) -> DerivFn {
        match self {
            TestProblem::LinearOscillator => Box::new(|_t, y, _p, _aux| {
                DVector::from_vec(vec![y[1], -y[0]])
            }),
            TestProblem::StraightLine => Box::new(|_t, y, _p, _aux| {
                DVector::from_vec(vec![y[1], Complex64::new(0.0, 0.0)])
            }),
            TestProblem::HyperbolicSine => Box::new(|_t, y, _p, _aux| {
                DVector::from_vec(vec![y[1], y[0]])
            }),
            TestProblem::SineEigenvalue => Box::new(|_t, y, p, _aux| {
                DVector::from_vec(vec![y[1], -p[0] * y[0]])
            }),
            TestProblem::AuxFrequencySpring => Box::new(|_t, y, _p, aux| {
                let w2 = aux
                    .downcast_ref::<f64>()
                    .copied()
                    .unwrap_or(1.0);
                DVector::from_vec(vec![y[1], -Complex64::new(w2, 0.0) * y[0]])
            }),
        }
    }

    pub fn boundary(&self) -> BoundaryFn {
        match self {
            TestProblem::LinearOscillator => Box::new(|ya, yb, _p, _aux| {
                DVector::from_vec(vec![ya[0], yb[0] - Complex64::new(1.0, 0.0)])
            }),
            TestProblem::StraightLine => Box::new(|ya, yb, _p, _aux| {
                DVector::from_vec(vec![ya[0], yb[0] - Complex64::new(1.0, 0.0)])
            }),
            TestProblem::HyperbolicSine => Box::new(|ya, yb, _p, _aux| {
                DVector::from_vec(vec![
                    ya[0],
                    yb[0] - Complex64::new(1.0_f64.sinh(), 0.0),
                ])
            }),
            TestProblem::SineEigenvalue => Box::new(|ya, yb, _p, _aux| {
                DVector::from_vec(vec![
                    ya[0],
                    yb[0],
                    ya[1] - Complex64::new(1.0, 0.0),
                ])
            }),
            TestProblem::AuxFrequencySpring => Box::new(|ya, yb, _p, _aux| {
                DVector::from_vec(vec![ya[0], yb[0] - Complex64::new(1.0, 0.0)])
            }),
        }
    }

    /// initial guess on a uniform grid of n_points nodes
    pub fn guess(&self, n_points: usize) -> BVPSolution {
        assert!(n_points >= 2, "a guess needs at least two grid nodes");
        let (a, b) = self.span();
        let x = DVector::from_fn(n_points, |i, _| {
            a + (b - a) * (i as f64) / ((n_points - 1) as f64)
        });
        match self {
            TestProblem::SineEigenvalue => {
                // exact solution of the ODE for the starting guess p = 9,
                // only the outer boundary condition is violated
                let y = DMatrix::from_fn(2, n_points, |r, c| {
                    let t = x[c];
                    if r == 0 { (3.0 * t).sin() / 3.0 } else { (3.0 * t).cos() }
                });
                BVPSolution::new(x, y, Some(DVector::from_vec(vec![9.0])))
            }
            TestProblem::AuxFrequencySpring => {
                let slope = 1.0 / (b - a);
                let y = DMatrix::from_fn(2, n_points, |r, c| {
                    if r == 0 { slope * (x[c] - a) } else { slope }
                });
                BVPSolution::new(x, y, None).with_aux(Arc::new(4.0_f64))
            }
            _ => {
                let target = self.exact(b);
                let slope = target / (b - a);
                let y = DMatrix::from_fn(2, n_points, |r, c| {
                    if r == 0 { slope * (x[c] - a) } else { slope }
                });
                BVPSolution::new(x, y, None)
            }
        }
    }

    pub fn bvp(&self, n_points: usize) -> TwoPointBVP {
        TwoPointBVP::new(self.deriv(), self.boundary(), self.guess(n_points))
    }

    /// first state component of the exact solution
    pub fn exact(&self, t: f64) -> f64 {
        match self {
            TestProblem::LinearOscillator => t.sin(),
            TestProblem::StraightLine => t,
            TestProblem::HyperbolicSine => t.sinh(),
            TestProblem::SineEigenvalue => (PI * t).sin() / PI,
            TestProblem::AuxFrequencySpring => (2.0 * t).sin(),
        }
    }

    pub fn exact_parameters(&self) -> Option<DVector<f64>> {
        match self {
            TestProblem::SineEigenvalue => Some(DVector::from_vec(vec![PI * PI])),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn catalog_guesses_are_consistent() {
        for problem in TestProblem::iter() {
            let guess = problem.guess(11);
            assert_eq!(guess.n_points(), 11);
            assert_eq!(guess.n_odes(), problem.n_odes());
            let (a, b) = problem.span();
            assert!((guess.x[0] - a).abs() < 1e-14);
            assert!((guess.x[10] - b).abs() < 1e-14);
            let n_bc = problem.n_odes() + guess.n_params();
            let ya = DVector::from_fn(n_bc, |i, _| Complex64::new(i as f64, 0.0));
            let res = (problem.boundary())(&ya, &ya, &DVector::zeros(guess.n_params()), &guess.aux);
            assert_eq!(res.len(), n_bc);
        }
    }

    #[test]
    fn exact_solutions_satisfy_the_boundary_conditions() {
        for problem in TestProblem::iter() {
            let (a, b) = problem.span();
            match problem {
                TestProblem::SineEigenvalue => {
                    assert!(problem.exact(a).abs() < 1e-14);
                    assert!(problem.exact(b).abs() < 1e-14);
                }
                _ => {
                    assert!(problem.exact(a).abs() < 1e-14);
                    let target = match problem {
                        TestProblem::HyperbolicSine => 1.0_f64.sinh(),
                        _ => 1.0,
                    };
                    assert!((problem.exact(b) - target).abs() < 1e-12);
                }
            }
        }
    }
}
