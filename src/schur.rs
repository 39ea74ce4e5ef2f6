//! Eigenvalue extraction from a real quasi-upper-triangular matrix.

use nalgebra::{DMatrix, DVector};

/// Read the eigenvalues off the diagonal of a real Schur form, top to
/// bottom, into parallel real/imaginary vectors.
///
/// A 1x1 block contributes one real eigenvalue (imaginary part exactly
/// zero). A 2x2 block is solved through its trace and determinant: a
/// negative discriminant yields a conjugate pair stored adjacently with the
/// positive imaginary part first; a non-negative discriminant (two close
/// real eigenvalues that never split) yields both real roots, larger-offset
/// root first.
pub(crate) fn extract(h: &DMatrix<f64>) -> (DVector<f64>, DVector<f64>) {
    let n = h.nrows();
    let mut re = DVector::zeros(n);
    let mut im = DVector::zeros(n);

    let mut i = 0;
    while i < n {
        if i + 1 < n && h[(i + 1, i)] != 0.0 {
            let p = (h[(i, i)] - h[(i + 1, i + 1)]) / 2.0;
            let w = h[(i + 1, i)] * h[(i, i + 1)];
            let q = p * p + w;
            let x = h[(i + 1, i + 1)];
            if q < 0.0 {
                re[i] = x + p;
                re[i + 1] = x + p;
                im[i] = (-q).sqrt();
                im[i + 1] = -im[i];
            } else {
                let z = if p >= 0.0 {
                    p + q.sqrt()
                } else {
                    p - q.sqrt()
                };
                re[i] = x + z;
                re[i + 1] = if z != 0.0 { x - w / z } else { x + z };
            }
            i += 2;
        } else {
            re[i] = h[(i, i)];
            i += 1;
        }
    }
    (re, im)
}
