use super::STM_dynamics::DerivativeMethod;
use super::boundary_residual::assemble_residual_complex;
use super::shooting_problem::{AuxPayload, BoundaryFn, imag_part, lift_to_complex, real_part};
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

/// Jacobian of the composite residual with respect to the stacked shooting
/// variables [ya_0 .. ya_{m-1}, p]. Per arc, the head sensitivity M_i and the
/// tail sensitivity N_i come from the configured derivative policy; the tail
/// dependence is folded back onto the head through the arc sensitivity with
/// J_i = M_i + N_i * Phi_i. The optional parameter columns are differentiated
/// directly. Blocks are laid side by side in arc order, parameters last.
pub fn bc_jacobian(
    bc_func: &BoundaryFn,
    ya: &[DVector<f64>],
    yb: &[DVector<f64>],
    phi: &[DMatrix<f64>],
    p: &DVector<f64>,
    aux: &AuxPayload,
    method: DerivativeMethod,
) -> DMatrix<f64> {
    let number_arcs = ya.len();
    assert_eq!(phi.len(), number_arcs, "one sensitivity matrix per arc");
    let n_odes = ya[0].len();
    let n_params = p.len();
    let n_rows = n_odes * number_arcs + n_params;

    let mut ya_c: Vec<DVector<Complex64>> = ya.iter().map(lift_to_complex).collect();
    let mut yb_c: Vec<DVector<Complex64>> = yb.iter().map(lift_to_complex).collect();
    let mut p_c = lift_to_complex(p);
    let mut jac = DMatrix::<f64>::zeros(n_rows, n_rows);

    match method {
        DerivativeMethod::FiniteDifference { step } => {
            let fx = real_part(&assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux));
            assert_eq!(
                fx.len(),
                n_rows,
                "boundary function must return n_odes + n_params residuals"
            );
            for arc in 0..number_arcs {
                let mut m_block = DMatrix::<f64>::zeros(n_rows, n_odes);
                let mut n_block = DMatrix::<f64>::zeros(n_rows, n_odes);
                for k in 0..n_odes {
                    let saved = ya_c[arc][k];
                    ya_c[arc][k] += Complex64::new(step, 0.0);
                    let f = real_part(&assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux));
                    m_block.set_column(k, &((&f - &fx) / step));
                    ya_c[arc][k] = saved;

                    let saved = yb_c[arc][k];
                    yb_c[arc][k] += Complex64::new(step, 0.0);
                    let f = real_part(&assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux));
                    n_block.set_column(k, &((&f - &fx) / step));
                    yb_c[arc][k] = saved;
                }
                let block = m_block + n_block * &phi[arc];
                jac.view_mut((0, arc * n_odes), (n_rows, n_odes))
                    .copy_from(&block);
            }
            for k in 0..n_params {
                let saved = p_c[k];
                p_c[k] += Complex64::new(step, 0.0);
                let f = real_part(&assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux));
                jac.set_column(number_arcs * n_odes + k, &((&f - &fx) / step));
                p_c[k] = saved;
            }
        }
        DerivativeMethod::ComplexStep { step } => {
            let fx = assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux);
            assert_eq!(
                fx.len(),
                n_rows,
                "boundary function must return n_odes + n_params residuals"
            );
            for arc in 0..number_arcs {
                let mut m_block = DMatrix::<f64>::zeros(n_rows, n_odes);
                let mut n_block = DMatrix::<f64>::zeros(n_rows, n_odes);
                for k in 0..n_odes {
                    let saved = ya_c[arc][k];
                    ya_c[arc][k] += Complex64::new(0.0, step);
                    let f = imag_part(&assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux));
                    m_block.set_column(k, &(&f / step));
                    ya_c[arc][k] = saved;

                    let saved = yb_c[arc][k];
                    yb_c[arc][k] += Complex64::new(0.0, step);
                    let f = imag_part(&assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux));
                    n_block.set_column(k, &(&f / step));
                    yb_c[arc][k] = saved;
                }
                let block = m_block + n_block * &phi[arc];
                jac.view_mut((0, arc * n_odes), (n_rows, n_odes))
                    .copy_from(&block);
            }
            for k in 0..n_params {
                let saved = p_c[k];
                p_c[k] += Complex64::new(0.0, step);
                let f = imag_part(&assemble_residual_complex(bc_func, &ya_c, &yb_c, &p_c, aux));
                jac.set_column(number_arcs * n_odes + k, &(&f / step));
                p_c[k] = saved;
            }
        }
    }
    jac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::ShootingBVP::shooting_problem::BoundaryFn;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    // two arcs, pinned ends: rows are [ya0[0]; yb1[0]-1; yb0-ya1]
    fn pinned_ends() -> BoundaryFn {
        Box::new(|ya, yb, _p, _aux| {
            DVector::from_vec(vec![ya[0], yb[0] - Complex64::new(1.0, 0.0)])
        })
    }

    fn jac_setup() -> (Vec<DVector<f64>>, Vec<DVector<f64>>, Vec<DMatrix<f64>>) {
        let ya = vec![
            DVector::from_vec(vec![0.1, 0.9]),
            DVector::from_vec(vec![0.7, 0.8]),
        ];
        let yb = vec![
            DVector::from_vec(vec![0.6, 0.85]),
            DVector::from_vec(vec![1.1, 0.4]),
        ];
        // synthetic but nontrivial arc sensitivities
        let phi = vec![
            DMatrix::from_column_slice(2, 2, &[1.0, 0.2, -0.3, 1.1]),
            DMatrix::from_column_slice(2, 2, &[0.9, -0.1, 0.4, 1.2]),
        ];
        (ya, yb, phi)
    }

    #[test]
    fn linear_conditions_give_exact_blocks() {
        let bc = pinned_ends();
        let aux: AuxPayload = Arc::new(());
        let (ya, yb, phi) = jac_setup();
        let p = DVector::zeros(0);

        for method in [
            DerivativeMethod::finite_difference(),
            DerivativeMethod::complex_step(),
        ] {
            let jac = bc_jacobian(&bc, &ya, &yb, &phi, &p, &aux, method);
            assert_eq!(jac.shape(), (4, 4));
            // row 0: d ya0[0] / d ya0 = e_0, nothing from arc 1
            assert_abs_diff_eq!(jac[(0, 0)], 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(jac[(0, 1)], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(jac[(0, 2)], 0.0, epsilon = 1e-6);
            // row 1: d (yb1[0]) / d ya1 = first row of phi_1
            assert_abs_diff_eq!(jac[(1, 2)], phi[1][(0, 0)], epsilon = 1e-6);
            assert_abs_diff_eq!(jac[(1, 3)], phi[1][(0, 1)], epsilon = 1e-6);
            assert_abs_diff_eq!(jac[(1, 0)], 0.0, epsilon = 1e-6);
            // continuity rows: d (yb0 - ya1) / d ya0 = phi_0, / d ya1 = -I
            for i in 0..2 {
                for j in 0..2 {
                    assert_abs_diff_eq!(jac[(2 + i, j)], phi[0][(i, j)], epsilon = 1e-6);
                    let minus_eye = if i == j { -1.0 } else { 0.0 };
                    assert_abs_diff_eq!(jac[(2 + i, 2 + j)], minus_eye, epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn parameter_columns_sit_after_all_arc_blocks() {
        // one arc, one parameter entering the conditions linearly
        let bc: BoundaryFn = Box::new(|ya, yb, p, _aux| {
            DVector::from_vec(vec![
                ya[0] - p[0],
                yb[0] - Complex64::new(1.0, 0.0),
                ya[1] + p[0] * Complex64::new(2.0, 0.0),
            ])
        });
        let aux: AuxPayload = Arc::new(());
        let ya = vec![DVector::from_vec(vec![0.2, 0.3])];
        let yb = vec![DVector::from_vec(vec![0.9, 0.1])];
        let phi = vec![DMatrix::identity(2, 2)];
        let p = DVector::from_vec(vec![0.5]);

        for method in [
            DerivativeMethod::finite_difference(),
            DerivativeMethod::complex_step(),
        ] {
            let jac = bc_jacobian(&bc, &ya, &yb, &phi, &p, &aux, method);
            assert_eq!(jac.shape(), (3, 3));
            assert_abs_diff_eq!(jac[(0, 2)], -1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(jac[(1, 2)], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(jac[(2, 2)], 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    #[should_panic(expected = "n_odes + n_params")]
    fn short_residual_is_caught_under_complex_step() {
        let bc: BoundaryFn = Box::new(|ya, _yb, _p, _aux| DVector::from_vec(vec![ya[0]]));
        let aux: AuxPayload = Arc::new(());
        let (ya, yb, phi) = jac_setup();
        let p = DVector::zeros(0);
        let _ = bc_jacobian(&bc, &ya, &yb, &phi, &p, &aux, DerivativeMethod::complex_step());
    }

    #[test]
    fn both_policies_agree_on_a_nonlinear_condition() {
        let bc: BoundaryFn = Box::new(|ya, yb, _p, _aux| {
            DVector::from_vec(vec![ya[0] * ya[1], yb[0].cos() - Complex64::new(0.3, 0.0)])
        });
        let aux: AuxPayload = Arc::new(());
        let (ya, yb, phi) = jac_setup();
        let p = DVector::zeros(0);
        let fd = bc_jacobian(
            &bc,
            &ya,
            &yb,
            &phi,
            &p,
            &aux,
            DerivativeMethod::finite_difference(),
        );
        let cs = bc_jacobian(&bc, &ya, &yb, &phi, &p, &aux, DerivativeMethod::complex_step());
        for i in 0..fd.nrows() {
            for j in 0..fd.ncols() {
                assert_abs_diff_eq!(fd[(i, j)], cs[(i, j)], epsilon = 1e-4);
            }
        }
    }
}
