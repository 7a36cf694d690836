//! Small numerical utilities shared by the solver stack.

use nalgebra::Cholesky;

use crate::MatX;

/// Symmetrize a square matrix in place by averaging with its transpose.
///
/// Value-function Hessians drift slightly asymmetric over long backward
/// passes; averaging keeps the drift from compounding.
pub fn symmetrize(m: &mut MatX) {
    debug_assert_eq!(m.nrows(), m.ncols());
    let mt = m.transpose();
    *m += mt;
    *m *= 0.5;
}

/// Whether a symmetric matrix is positive definite, probed by Cholesky.
pub fn is_positive_definite(m: &MatX) -> bool {
    m.nrows() == m.ncols() && Cholesky::new(m.clone()).is_some()
}

/// Whether a symmetric matrix is positive semidefinite, up to `tol` shift.
///
/// Probes `m + tol * I` with Cholesky, which is cheap and robust for the
/// small, well-scaled matrices in the backward pass.
pub fn is_positive_semidefinite(m: &MatX, tol: f64) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    let shifted = m + MatX::identity(m.nrows(), m.ncols()) * tol;
    Cholesky::new(shifted).is_some()
}
