use super::shooting_problem::{
    AuxPayload, DerivFn, SolverError, imag_part, lift_to_complex, real_part,
};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

/// how state and boundary sensitivities are differentiated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivativeMethod {
    /// forward differences with a real perturbation of the given step
    FiniteDifference { step: f64 },
    /// complex-step derivative Im f(y + i*h*e_k) / h, free of subtractive
    /// cancellation, so the step can be taken absurdly small
    ComplexStep { step: f64 },
}

impl DerivativeMethod {
    pub fn finite_difference() -> DerivativeMethod {
        DerivativeMethod::FiniteDifference { step: 1e-6 }
    }
    pub fn complex_step() -> DerivativeMethod {
        DerivativeMethod::ComplexStep { step: 1e-50 }
    }
    /// "fd" or "csd", the spelling used in solver setups
    pub fn from_name(name: &str) -> Result<DerivativeMethod, SolverError> {
        match name {
            "fd" => Ok(DerivativeMethod::finite_difference()),
            "csd" => Ok(DerivativeMethod::complex_step()),
            _ => Err(SolverError::InvalidConfiguration(format!(
                "unknown derivative method '{}', expected 'fd' or 'csd'",
                name
            ))),
        }
    }
    pub fn step(&self) -> f64 {
        match self {
            DerivativeMethod::FiniteDifference { step } => *step,
            DerivativeMethod::ComplexStep { step } => *step,
        }
    }
    pub fn requires_complex(&self) -> bool {
        matches!(self, DerivativeMethod::ComplexStep { .. })
    }
}

/// flattened identity seeding the sensitivity block of every arc
pub fn stm_seed(n_odes: usize) -> DVector<f64> {
    let eye = DMatrix::<f64>::identity(n_odes, n_odes);
    DVector::from_column_slice(eye.as_slice())
}

/// pull state and sensitivity matrix out of an augmented vector
pub fn split_augmented(y_aug: &DVector<f64>, n_odes: usize) -> (DVector<f64>, DMatrix<f64>) {
    (
        y_aug.rows(0, n_odes).into_owned(),
        DMatrix::from_column_slice(n_odes, n_odes, &y_aug.as_slice()[n_odes..]),
    )
}

/// right hand side of the augmented system [y, vec(Phi)]: the first n_odes
/// entries are f(t, y, p), the rest is A(t)*Phi flattened column-wise, where
/// A is the Jacobian of f along the trajectory obtained by the configured
/// policy. Reshape and flatten are both column-major, so the stored block
/// stays a faithful sensitivity matrix.
pub fn stm_ode(
    t: f64,
    y_aug: &DVector<f64>,
    n_odes: usize,
    deriv_func: &DerivFn,
    p: &DVector<Complex64>,
    aux: &AuxPayload,
    method: DerivativeMethod,
) -> DVector<f64> {
    let (y, phi) = split_augmented(y_aug, n_odes);
    let mut yc = lift_to_complex(&y);
    let fx = real_part(&deriv_func(t, &yc, p, aux));
    let mut a_matrix = DMatrix::<f64>::zeros(n_odes, n_odes);
    match method {
        DerivativeMethod::FiniteDifference { step } => {
            for k in 0..n_odes {
                let saved = yc[k];
                yc[k] += Complex64::new(step, 0.0);
                let fk = real_part(&deriv_func(t, &yc, p, aux));
                a_matrix.set_column(k, &((&fk - &fx) / step));
                yc[k] = saved;
            }
        }
        DerivativeMethod::ComplexStep { step } => {
            for k in 0..n_odes {
                let saved = yc[k];
                yc[k] += Complex64::new(0.0, step);
                let fk = imag_part(&deriv_func(t, &yc, p, aux));
                a_matrix.set_column(k, &(fk / step));
                yc[k] = saved;
            }
        }
    }
    let phi_dot = &a_matrix * &phi;
    let mut out = DVector::zeros(n_odes + n_odes * n_odes);
    out.rows_mut(0, n_odes).copy_from(&fx);
    out.rows_mut(n_odes, n_odes * n_odes)
        .copy_from(&DVector::from_column_slice(phi_dot.as_slice()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn oscillator() -> DerivFn {
        Box::new(|_t, y, _p, _aux| {
            DVector::from_vec(vec![y[1], -y[0]])
        })
    }

    #[test]
    fn seed_reshapes_to_identity() {
        let (_, phi) = split_augmented(
            &DVector::from_fn(3 + 9, |i, _| if i < 3 { 7.0 } else { stm_seed(3)[i - 3] }),
            3,
        );
        assert_eq!(phi, DMatrix::identity(3, 3));
    }

    #[test]
    fn augmented_rhs_reproduces_linear_system_matrix() {
        // for y' = A y with Phi = I the sensitivity block of the rhs is A itself
        let deriv = oscillator();
        let aux: AuxPayload = Arc::new(());
        let p = DVector::<Complex64>::zeros(0);
        let mut y_aug = DVector::zeros(2 + 4);
        y_aug[0] = 0.3;
        y_aug[1] = -1.2;
        y_aug.rows_mut(2, 4).copy_from(&stm_seed(2));

        for method in [
            DerivativeMethod::finite_difference(),
            DerivativeMethod::complex_step(),
        ] {
            let out = stm_ode(0.0, &y_aug, 2, &deriv, &p, &aux, method);
            assert_abs_diff_eq!(out[0], -1.2, epsilon = 1e-9);
            assert_abs_diff_eq!(out[1], -0.3, epsilon = 1e-9);
            let (_, a) = split_augmented(&out, 2);
            let expected = DMatrix::from_column_slice(2, 2, &[0.0, -1.0, 1.0, 0.0]);
            for i in 0..2 {
                for j in 0..2 {
                    assert_abs_diff_eq!(a[(i, j)], expected[(i, j)], epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn complex_step_matches_finite_difference_on_nonlinear_rhs() {
        let deriv: DerivFn = Box::new(|_t, y, _p, _aux| {
            DVector::from_vec(vec![y[1], -y[0].sin()])
        });
        let aux: AuxPayload = Arc::new(());
        let p = DVector::<Complex64>::zeros(0);
        let mut y_aug = DVector::zeros(2 + 4);
        y_aug[0] = 0.8;
        y_aug[1] = 0.1;
        y_aug.rows_mut(2, 4).copy_from(&stm_seed(2));

        let fd = stm_ode(
            0.0,
            &y_aug,
            2,
            &deriv,
            &p,
            &aux,
            DerivativeMethod::finite_difference(),
        );
        let cs = stm_ode(
            0.0,
            &y_aug,
            2,
            &deriv,
            &p,
            &aux,
            DerivativeMethod::complex_step(),
        );
        for i in 0..fd.len() {
            assert_abs_diff_eq!(fd[i], cs[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn method_names_parse() {
        assert_eq!(
            DerivativeMethod::from_name("fd").unwrap(),
            DerivativeMethod::FiniteDifference { step: 1e-6 }
        );
        assert_eq!(
            DerivativeMethod::from_name("csd").unwrap(),
            DerivativeMethod::ComplexStep { step: 1e-50 }
        );
        assert!(DerivativeMethod::from_name("autodiff").is_err());
        assert!(DerivativeMethod::complex_step().requires_complex());
        assert!(!DerivativeMethod::finite_difference().requires_complex());
    }
}
