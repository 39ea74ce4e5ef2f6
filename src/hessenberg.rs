//! Orthogonal reduction to upper Hessenberg form.

use nalgebra::{DMatrix, DVector};

/// Reduce `h` in place to upper Hessenberg form by Householder similarity
/// transformations, accumulating the orthogonal factor into `v` so that the
/// input matrix equals `v * h * v.transpose()` on return.
///
/// This is derived from the Algol procedures orthes and ortran, by Martin
/// and Wilkinson, Handbook for Auto. Comp., Vol.ii-Linear Algebra, and the
/// corresponding Fortran subroutines in EISPACK.
pub(crate) fn reduce(h: &mut DMatrix<f64>, v: &mut DMatrix<f64>) {
    let n = h.nrows();

    for i in 0..n {
        for j in 0..n {
            v[(i, j)] = if i == j { 1.0 } else { 0.0 };
        }
    }
    if n < 3 {
        return;
    }

    let high = n - 1;
    let mut ort = DVector::<f64>::zeros(n);

    for m in 1..high {
        // Scale column.
        let mut scale = 0.0;
        for i in m..=high {
            scale += h[(i, m - 1)].abs();
        }
        if scale == 0.0 {
            continue;
        }

        // Compute Householder transformation.
        let mut sum = 0.0;
        for i in (m..=high).rev() {
            ort[i] = h[(i, m - 1)] / scale;
            sum += ort[i] * ort[i];
        }
        let mut g = sum.sqrt();
        if ort[m] > 0.0 {
            g = -g;
        }
        sum -= ort[m] * g;
        ort[m] -= g;

        // Apply Householder similarity transformation
        // H = (I - u*u'/sum) * H * (I - u*u'/sum)
        for j in m..n {
            let mut f = 0.0;
            for i in (m..=high).rev() {
                f += ort[i] * h[(i, j)];
            }
            f /= sum;
            for i in m..=high {
                h[(i, j)] -= f * ort[i];
            }
        }
        for i in 0..=high {
            let mut f = 0.0;
            for j in (m..=high).rev() {
                f += ort[j] * h[(i, j)];
            }
            f /= sum;
            for j in m..=high {
                h[(i, j)] -= f * ort[j];
            }
        }
        ort[m] *= scale;
        h[(m, m - 1)] = scale * g;
    }

    // Accumulate transformations in reverse order.
    for m in (1..high).rev() {
        if h[(m, m - 1)] == 0.0 {
            continue;
        }
        for i in (m + 1)..=high {
            ort[i] = h[(i, m - 1)];
        }
        for j in m..=high {
            let mut g = 0.0;
            for i in m..=high {
                g += ort[i] * v[(i, j)];
            }
            // Double division avoids possible underflow
            g = (g / ort[m]) / h[(m, m - 1)];
            for i in m..=high {
                v[(i, j)] += g * ort[i];
            }
        }
    }

    // Clear the reflector tails stored below the subdiagonal.
    for j in 0..n - 2 {
        for i in (j + 2)..n {
            h[(i, j)] = 0.0;
        }
    }
}
