//! Eigenvector recovery from the real Schur form.
//!
//! Back-substitution runs inside the quasi-triangular matrix and writes the
//! Hessenberg-coordinate vectors into its own columns; the orthogonal
//! accumulator then maps them into original coordinates. The accumulator is
//! overwritten in the process, so ownership of both buffers passes to this
//! stage for good once substitution starts.

use nalgebra::{DMatrix, DVector};

/// Complex scalar division, split on the larger denominator component to
/// avoid overflow in the intermediate products.
fn cdiv(xr: f64, xi: f64, yr: f64, yi: f64) -> (f64, f64) {
    if yr.abs() > yi.abs() {
        let r = yi / yr;
        let d = yr + r * yi;
        ((xr + r * xi) / d, (xi - r * xr) / d)
    } else {
        let r = yr / yi;
        let d = yi + r * yr;
        ((r * xr + xi) / d, (r * xi - xr) / d)
    }
}

/// Solve the singular upper quasi-triangular systems, one per eigenvalue,
/// writing each Hessenberg-coordinate eigenvector into the corresponding
/// column of `h`. Real eigenvalues get a plain back-substitution with the
/// rows of any conjugate-pair block solved as a coupled 2x2 system; complex
/// pairs back-substitute the real and imaginary parts simultaneously, with
/// the real part in the first column of the pair. `norm` is the Hessenberg
/// magnitude from before the QR iteration; `eps * norm` stands in for exact
/// zero pivots so a singular diagonal never turns into a division by zero.
///
/// This is derived from the backsubstitution half of the Algol procedure
/// hqr2 (Martin and Wilkinson) and its EISPACK translation.
pub(crate) fn back_substitute(
    h: &mut DMatrix<f64>,
    re: &DVector<f64>,
    im: &DVector<f64>,
    eps: f64,
    norm: f64,
) {
    let nn = h.nrows();

    for idx in (0..nn).rev() {
        let p = re[idx];
        let q = im[idx];

        if q == 0.0 {
            // Real vector
            let mut l = idx;
            h[(idx, idx)] = 1.0;
            let mut z = 0.0;
            let mut s = 0.0;
            for i in (0..idx).rev() {
                let w = h[(i, i)] - p;
                let mut r = 0.0;
                for j in l..=idx {
                    r += h[(i, j)] * h[(j, idx)];
                }
                if im[i] < 0.0 {
                    z = w;
                    s = r;
                    continue;
                }
                l = i;
                if im[i] == 0.0 {
                    h[(i, idx)] = if w != 0.0 { -r / w } else { -r / (eps * norm) };
                } else {
                    // Solve the coupled real equations of a pair block
                    let x = h[(i, i + 1)];
                    let y = h[(i + 1, i)];
                    let denom = (re[i] - p) * (re[i] - p) + im[i] * im[i];
                    let t = (x * s - z * r) / denom;
                    h[(i, idx)] = t;
                    h[(i + 1, idx)] = if x.abs() > z.abs() {
                        (-r - w * t) / x
                    } else {
                        (-s - y * t) / z
                    };
                }

                // Overflow control
                let t = h[(i, idx)].abs();
                if (eps * t) * t > 1.0 {
                    for j in i..=idx {
                        h[(j, idx)] /= t;
                    }
                }
            }
        } else if q < 0.0 {
            // Complex vector, processed at the second row of its pair
            let na = idx - 1;
            let mut l = na;

            // Last vector component imaginary so matrix is triangular
            if h[(idx, na)].abs() > h[(na, idx)].abs() {
                h[(na, na)] = q / h[(idx, na)];
                h[(na, idx)] = -(h[(idx, idx)] - p) / h[(idx, na)];
            } else {
                let (cr, ci) = cdiv(0.0, -h[(na, idx)], h[(na, na)] - p, q);
                h[(na, na)] = cr;
                h[(na, idx)] = ci;
            }
            h[(idx, na)] = 0.0;
            h[(idx, idx)] = 1.0;

            let mut z = 0.0;
            let mut r = 0.0;
            let mut s = 0.0;
            for i in (0..na).rev() {
                let mut ra = 0.0;
                let mut sa = 0.0;
                for j in l..=idx {
                    ra += h[(i, j)] * h[(j, na)];
                    sa += h[(i, j)] * h[(j, idx)];
                }
                let w = h[(i, i)] - p;

                if im[i] < 0.0 {
                    z = w;
                    r = ra;
                    s = sa;
                    continue;
                }
                l = i;
                if im[i] == 0.0 {
                    let (cr, ci) = cdiv(-ra, -sa, w, q);
                    h[(i, na)] = cr;
                    h[(i, idx)] = ci;
                } else {
                    // Solve complex equations
                    let x = h[(i, i + 1)];
                    let y = h[(i + 1, i)];
                    let mut vr = (re[i] - p) * (re[i] - p) + im[i] * im[i] - q * q;
                    let vi = (re[i] - p) * 2.0 * q;
                    if vr == 0.0 && vi == 0.0 {
                        vr = eps * norm * (w.abs() + q.abs() + x.abs() + y.abs() + z.abs());
                    }
                    let (cr, ci) = cdiv(x * r - z * ra + q * sa, x * s - z * sa - q * ra, vr, vi);
                    h[(i, na)] = cr;
                    h[(i, idx)] = ci;
                    if x.abs() > z.abs() + q.abs() {
                        h[(i + 1, na)] = (-ra - w * h[(i, na)] + q * h[(i, idx)]) / x;
                        h[(i + 1, idx)] = (-sa - w * h[(i, idx)] - q * h[(i, na)]) / x;
                    } else {
                        let (cr, ci) =
                            cdiv(-r - y * h[(i, na)], -s - y * h[(i, idx)], z, q);
                        h[(i + 1, na)] = cr;
                        h[(i + 1, idx)] = ci;
                    }
                }

                // Overflow control
                let t = h[(i, na)].abs().max(h[(i, idx)].abs());
                if (eps * t) * t > 1.0 {
                    for j in i..=idx {
                        h[(j, na)] /= t;
                        h[(j, idx)] /= t;
                    }
                }
            }
        }
    }
}

/// Map the Hessenberg-coordinate eigenvectors stored in the columns of `h`
/// through the accumulated orthogonal transform: `v` becomes the eigenvector
/// matrix of the original (balanced) matrix.
pub(crate) fn back_transform(h: &DMatrix<f64>, v: &mut DMatrix<f64>) {
    let nn = h.nrows();
    for j in (0..nn).rev() {
        for i in 0..nn {
            let mut z = 0.0;
            for k in 0..=j {
                z += v[(i, k)] * h[(k, j)];
            }
            v[(i, j)] = z;
        }
    }
}

/// Rescale the eigenvector columns to a deterministic convention. A real
/// eigenvector is scaled so its largest-magnitude component (first one wins
/// on ties) becomes exactly 1. The two columns of a conjugate pair are
/// scaled by one common factor so the dominant component has unit modulus
/// and non-negative real part, which keeps the pair a valid joint encoding.
pub(crate) fn normalize(v: &mut DMatrix<f64>, im: &DVector<f64>) {
    let n = v.nrows();
    let mut j = 0;
    while j < n {
        if im[j] == 0.0 {
            let mut dom = 0;
            for i in 1..n {
                if v[(i, j)].abs() > v[(dom, j)].abs() {
                    dom = i;
                }
            }
            let pivot = v[(dom, j)];
            if pivot != 0.0 {
                for i in 0..n {
                    v[(i, j)] /= pivot;
                }
            }
            j += 1;
        } else {
            let mut dom = 0;
            let mut best = 0.0;
            for i in 0..n {
                let mag = v[(i, j)] * v[(i, j)] + v[(i, j + 1)] * v[(i, j + 1)];
                if mag > best {
                    best = mag;
                    dom = i;
                }
            }
            if best > 0.0 {
                let mut factor = 1.0 / best.sqrt();
                if v[(dom, j)] < 0.0 || (v[(dom, j)] == 0.0 && v[(dom, j + 1)] < 0.0) {
                    factor = -factor;
                }
                for i in 0..n {
                    v[(i, j)] *= factor;
                    v[(i, j + 1)] *= factor;
                }
            }
            j += 2;
        }
    }
}
