//! Diagonal similarity scaling applied before the Hessenberg reduction.
//!
//! Wildly different row and column norms amplify rounding errors in the QR
//! iteration. Rescaling row/column pairs by powers of the floating-point
//! radix equalizes the norms without introducing any rounding of its own,
//! and leaves the eigenvalues untouched. The recorded scale factors are
//! applied to the eigenvector rows once the decomposition is done.

use nalgebra::{DMatrix, DVector};

const RADIX: f64 = 2.0;

/// Balance `a` in place with a diagonal similarity transform, so that for
/// each index the off-diagonal row and column 1-norms are within a factor
/// of the radix of each other. Returns the per-row scale factors, each an
/// exact power of two.
pub(crate) fn balance(a: &mut DMatrix<f64>) -> DVector<f64> {
    let n = a.nrows();
    let mut scale = DVector::from_element(n, 1.0);
    let sqrdx = RADIX * RADIX;

    let mut done = false;
    while !done {
        done = true;
        for i in 0..n {
            let mut c = 0.0;
            let mut r = 0.0;
            for j in 0..n {
                if j != i {
                    c += a[(j, i)].abs();
                    r += a[(i, j)].abs();
                }
            }
            if c == 0.0 || r == 0.0 {
                continue;
            }

            let s = c + r;
            let mut f = 1.0;
            let mut g = r / RADIX;
            while c < g {
                f *= RADIX;
                c *= sqrdx;
            }
            g = r * RADIX;
            while c > g {
                f /= RADIX;
                c /= sqrdx;
            }

            if (c + r) / f < 0.95 * s {
                done = false;
                let g = 1.0 / f;
                scale[i] *= f;
                for j in 0..n {
                    a[(i, j)] *= g;
                }
                for j in 0..n {
                    a[(j, i)] *= f;
                }
            }
        }
    }
    scale
}

/// Undo the balancing on the eigenvector matrix: the eigenvectors of the
/// balanced matrix become eigenvectors of the original once row `i` is
/// multiplied by `scale[i]`.
pub(crate) fn balance_back(v: &mut DMatrix<f64>, scale: &DVector<f64>) {
    for i in 0..v.nrows() {
        for j in 0..v.ncols() {
            v[(i, j)] *= scale[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_are_exact_powers_of_two() {
        let mut a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0e6, 1.0e-6, 1.0]);
        let scale = balance(&mut a);
        for i in 0..2 {
            assert!(
                scale[i] > 0.0 && scale[i].log2().fract() == 0.0,
                "scale[{}] = {} is not a power of two",
                i,
                scale[i]
            );
        }
    }

    #[test]
    fn balancing_is_an_exact_similarity() {
        let orig = DMatrix::from_row_slice(
            3,
            3,
            &[1.0, 2.0e5, 0.5, 3.0e-5, 1.0, 4.0e-4, 2.0, 7.0e3, 1.0],
        );
        let mut a = orig.clone();
        let scale = balance(&mut a);

        // Powers of two make D^-1 * A * D exact in floating point.
        for i in 0..3 {
            for j in 0..3 {
                let expected = orig[(i, j)] * scale[j] / scale[i];
                assert_eq!(
                    a[(i, j)],
                    expected,
                    "balanced entry ({}, {}) is not an exact rescaling",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn improves_row_column_norm_ratio() {
        let mut a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0e6, 1.0e-6, 1.0]);
        balance(&mut a);
        let c = a[(1, 0)].abs();
        let r = a[(0, 1)].abs();
        assert!(
            c / r > 1.0 / 16.0 && c / r < 16.0,
            "row/column norms still unbalanced: c = {}, r = {}",
            c,
            r
        );
    }

    #[test]
    fn already_balanced_input_is_untouched() {
        let orig = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, -2.0, 1.0, 2.0, 0.0, -2.0, 0.0, 3.0]);
        let mut a = orig.clone();
        let scale = balance(&mut a);
        assert_eq!(a, orig);
        assert!(scale.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn zero_rows_are_skipped() {
        let orig = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 2.0]);
        let mut a = orig.clone();
        let scale = balance(&mut a);
        assert_eq!(a, orig);
        assert!(scale.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn balance_back_rescales_rows() {
        let mut v = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let scale = DVector::from_row_slice(&[2.0, 0.5]);
        balance_back(&mut v, &scale);
        assert_eq!(v, DMatrix::from_row_slice(2, 2, &[2.0, 4.0, 1.5, 2.0]));
    }
}
