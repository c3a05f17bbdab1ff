use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use strum_macros::Display;

/// opaque user payload handed through to the dynamics and boundary closures;
/// the solver never looks inside it
pub type AuxPayload = Arc<dyn Any + Send + Sync>;

/// right hand side of the ODE system: f(t, y, p, aux) -> dy/dt. Written over
/// complex numbers so the same closure serves both the finite-difference and
/// the complex-step policy; for purely real inputs the imaginary parts are zero.
pub type DerivFn = Box<
    dyn Fn(f64, &DVector<Complex64>, &DVector<Complex64>, &AuxPayload) -> DVector<Complex64>
        + Send
        + Sync,
>;

/// boundary conditions g(ya, yb, p, aux); must return n_odes + n_params residuals
pub type BoundaryFn = Box<
    dyn Fn(
            &DVector<Complex64>,
            &DVector<Complex64>,
            &DVector<Complex64>,
            &AuxPayload,
        ) -> DVector<Complex64>
        + Send
        + Sync,
>;

pub fn lift_to_complex(v: &DVector<f64>) -> DVector<Complex64> {
    v.map(|x| Complex64::new(x, 0.0))
}

pub fn real_part(v: &DVector<Complex64>) -> DVector<f64> {
    v.map(|z| z.re)
}

pub fn imag_part(v: &DVector<Complex64>) -> DVector<f64> {
    v.map(|z| z.im)
}

/// guess on the way in, solution on the way out
#[derive(Clone)]
pub struct BVPSolution {
    /// sample abscissae, strictly increasing
    pub x: DVector<f64>,
    /// state samples, one column per entry of x
    pub y: DMatrix<f64>,
    /// free parameters adjusted alongside the arc initial states, if any
    pub parameters: Option<DVector<f64>>,
    /// user payload carried through the solve untouched
    pub aux: AuxPayload,
    pub converged: bool,
}

impl BVPSolution {
    pub fn new(x: DVector<f64>, y: DMatrix<f64>, parameters: Option<DVector<f64>>) -> BVPSolution {
        assert_eq!(
            x.len(),
            y.ncols(),
            "every grid point must have a state column"
        );
        assert!(x.len() >= 2, "a guess needs at least two grid points");
        BVPSolution {
            x,
            y,
            parameters,
            aux: Arc::new(()),
            converged: false,
        }
    }
    pub fn with_aux(mut self, aux: AuxPayload) -> BVPSolution {
        self.aux = aux;
        self
    }
    pub fn n_odes(&self) -> usize {
        self.y.nrows()
    }
    pub fn n_points(&self) -> usize {
        self.x.len()
    }
    pub fn n_params(&self) -> usize {
        self.parameters.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}

impl fmt::Debug for BVPSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BVPSolution")
            .field("n_odes", &self.n_odes())
            .field("n_points", &self.n_points())
            .field("parameters", &self.parameters)
            .field("converged", &self.converged)
            .finish()
    }
}

/// a two-point boundary value problem: dynamics, boundary conditions and the
/// guess the solver starts from
pub struct TwoPointBVP {
    pub deriv_func: DerivFn,
    pub bc_func: BoundaryFn,
    /// holds the guess before solve() and the final solution after
    pub solution: BVPSolution,
    complex_capable: bool,
}

impl TwoPointBVP {
    pub fn new(deriv_func: DerivFn, bc_func: BoundaryFn, guess: BVPSolution) -> TwoPointBVP {
        TwoPointBVP {
            deriv_func,
            bc_func,
            solution: guess,
            complex_capable: true,
        }
    }

    /// wrap plain real closures; such a problem can only be differentiated by
    /// finite differences, an imaginary perturbation would be silently dropped
    pub fn from_real_functions<F, G>(deriv: F, bc: G, guess: BVPSolution) -> TwoPointBVP
    where
        F: Fn(f64, &DVector<f64>, &DVector<f64>, &AuxPayload) -> DVector<f64>
            + Send
            + Sync
            + 'static,
        G: Fn(&DVector<f64>, &DVector<f64>, &DVector<f64>, &AuxPayload) -> DVector<f64>
            + Send
            + Sync
            + 'static,
    {
        let deriv_func: DerivFn = Box::new(move |t, y, p, aux| {
            lift_to_complex(&deriv(t, &real_part(y), &real_part(p), aux))
        });
        let bc_func: BoundaryFn = Box::new(move |ya, yb, p, aux| {
            lift_to_complex(&bc(&real_part(ya), &real_part(yb), &real_part(p), aux))
        });
        TwoPointBVP {
            deriv_func,
            bc_func,
            solution: guess,
            complex_capable: false,
        }
    }

    pub fn is_complex_capable(&self) -> bool {
        self.complex_capable
    }
}

/// errors surfaced to the caller outside the normal outcome set
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// solver settings rejected up front
    InvalidConfiguration(String),
    /// a propagation was requested before the worker pool was started
    NotStarted,
    /// the integrator met a NaN state, a step underflow or its step budget
    PropagationFailed(String),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
            SolverError::NotStarted => write!(f, "propagator pool is not started"),
            SolverError::PropagationFailed(msg) => write!(f, "propagation failed: {}", msg),
        }
    }
}

impl Error for SolverError {}

/// terminal state of one shooting solve
#[derive(Debug, Clone, Display)]
pub enum ShootingOutcome {
    /// max-abs residual dropped under tolerance; carries the stitched solution
    Converged(BVPSolution),
    /// residual norm exceeded max_error, or the propagation broke down
    ResidualDiverged,
    MaxIterationsExceeded,
    /// LU factorization could not produce a correction
    SingularJacobian,
}

impl ShootingOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, ShootingOutcome::Converged(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn real_wrap_lifts_and_projects() {
        let x = DVector::from_vec(vec![0.0, 1.0]);
        let y = DMatrix::from_column_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let bvp = TwoPointBVP::from_real_functions(
            |_t, y, _p, _aux| DVector::from_vec(vec![y[1], -y[0]]),
            |ya, yb, _p, _aux| DVector::from_vec(vec![ya[0], yb[0]]),
            BVPSolution::new(x, y, None),
        );
        assert!(!bvp.is_complex_capable());
        let yc = lift_to_complex(&DVector::from_vec(vec![2.0, 5.0]));
        let p = DVector::<Complex64>::zeros(0);
        let f = (bvp.deriv_func)(0.0, &yc, &p, &bvp.solution.aux);
        assert_abs_diff_eq!(f[0].re, 5.0, epsilon = 1e-14);
        assert_abs_diff_eq!(f[1].re, -2.0, epsilon = 1e-14);
        assert_eq!(f[0].im, 0.0);
    }

    #[test]
    fn aux_payload_is_shared_not_copied() {
        let x = DVector::from_vec(vec![0.0, 1.0]);
        let y = DMatrix::zeros(1, 2);
        let payload: AuxPayload = Arc::new(42.0_f64);
        let sol = BVPSolution::new(x, y, None).with_aux(payload.clone());
        assert!(Arc::ptr_eq(&sol.aux, &payload));
        let cloned = sol.clone();
        assert!(Arc::ptr_eq(&cloned.aux, &payload));
    }

    #[test]
    #[should_panic(expected = "state column")]
    fn mismatched_guess_shapes_panic() {
        let x = DVector::from_vec(vec![0.0, 0.5, 1.0]);
        let y = DMatrix::zeros(2, 2);
        let _ = BVPSolution::new(x, y, None);
    }

    #[test]
    fn outcome_and_error_names() {
        let x = DVector::from_vec(vec![0.0, 1.0]);
        let y = DMatrix::zeros(1, 2);
        let sol = BVPSolution::new(x, y, None);
        assert_eq!(ShootingOutcome::Converged(sol).to_string(), "Converged");
        assert_eq!(
            ShootingOutcome::MaxIterationsExceeded.to_string(),
            "MaxIterationsExceeded"
        );
        let err = SolverError::PropagationFailed("NaN state".to_string());
        assert!(err.to_string().contains("NaN state"));
        assert_eq!(SolverError::NotStarted.to_string(), "propagator pool is not started");
    }
}
