use super::shooting_problem::{AuxPayload, BoundaryFn, lift_to_complex, real_part};
use itertools::izip;
use nalgebra::DVector;
use num_complex::Complex64;

/// composite residual for a set of arcs: the physical boundary conditions
/// evaluated on the head of the first arc and the tail of the last one,
/// followed by the continuity defects yb_i - ya_{i+1} in arc order
pub fn assemble_residual_complex(
    bc_func: &BoundaryFn,
    ya: &[DVector<Complex64>],
    yb: &[DVector<Complex64>],
    p: &DVector<Complex64>,
    aux: &AuxPayload,
) -> DVector<Complex64> {
    assert_eq!(ya.len(), yb.len(), "every arc must have a head and a tail");
    let number_arcs = ya.len();
    let physical = bc_func(&ya[0], &yb[number_arcs - 1], p, aux);
    let n_odes = ya[0].len();
    let mut res = DVector::zeros(physical.len() + (number_arcs - 1) * n_odes);
    res.rows_mut(0, physical.len()).copy_from(&physical);
    let mut row = physical.len();
    for (tail, head) in izip!(&yb[..number_arcs - 1], &ya[1..]) {
        res.rows_mut(row, n_odes).copy_from(&(tail - head));
        row += n_odes;
    }
    res
}

/// real-valued wrapper used by the solver iteration
pub fn assemble_residual(
    bc_func: &BoundaryFn,
    ya: &[DVector<f64>],
    yb: &[DVector<f64>],
    p: &DVector<f64>,
    aux: &AuxPayload,
) -> DVector<f64> {
    let ya_c: Vec<DVector<Complex64>> = ya.iter().map(lift_to_complex).collect();
    let yb_c: Vec<DVector<Complex64>> = yb.iter().map(lift_to_complex).collect();
    real_part(&assemble_residual_complex(
        bc_func,
        &ya_c,
        &yb_c,
        &lift_to_complex(p),
        aux,
    ))
}
