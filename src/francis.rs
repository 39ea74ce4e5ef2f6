//! Francis implicit double-shift QR iteration.
//!
//! Drives an upper Hessenberg matrix to real quasi-upper-triangular (real
//! Schur) form: 1x1 diagonal blocks carry real eigenvalues, 2x2 blocks carry
//! complex conjugate pairs. Every transform is orthogonal and applied to both
//! sides, with the accumulator `v` updated in lock-step, so the similarity
//! `A = V * H * V'` holds at each stage.
//!
//! The shift and deflation logic is derived from the Algol procedure hqr2,
//! by Martin and Wilkinson, Handbook for Auto. Comp., Vol.ii-Linear Algebra,
//! and the corresponding Fortran subroutine in EISPACK.

use nalgebra::DMatrix;

/// Sweeps a single deflation window may consume before the iteration gives
/// up on it and reports the current diagonal as a best-effort result.
const MAX_SWEEPS_PER_WINDOW: u32 = 100;

/// Bookkeeping for the active deflation window. The window always starts at
/// row 0 and shrinks from the bottom as eigenvalues are isolated; splits
/// discovered higher up are revisited once the tail is done.
struct IterationState {
    /// Exclusive upper bound of the rows still being reduced.
    end: usize,
    /// Sweeps spent on the current trailing eigenvalue.
    iter: u32,
    /// Accumulated exceptional-shift offset, restored into the diagonal as
    /// entries deflate.
    exshift: f64,
}

impl IterationState {
    fn new(n: usize) -> Self {
        IterationState {
            end: n,
            iter: 0,
            exshift: 0.0,
        }
    }

    /// Index of the last active row, or `None` once everything is deflated.
    fn last(&self) -> Option<usize> {
        self.end.checked_sub(1)
    }

    fn deflate(&mut self, count: usize) {
        self.end -= count;
        self.iter = 0;
    }
}

/// Magnitude of the Hessenberg part, the reference scale for the relative
/// deflation and near-singularity thresholds.
pub(crate) fn hessenberg_norm(h: &DMatrix<f64>) -> f64 {
    let n = h.nrows();
    let mut norm = 0.0;
    for i in 0..n {
        for j in i.saturating_sub(1)..n {
            norm += h[(i, j)].abs();
        }
    }
    norm
}

/// Iterate `h` to real Schur form, accumulating into `v`. Returns false if
/// any window ran out of sweeps, in which case the affected diagonal entries
/// hold the best values obtained rather than fully converged ones.
pub(crate) fn iterate(h: &mut DMatrix<f64>, v: &mut DMatrix<f64>, eps: f64, norm: f64) -> bool {
    let mut state = IterationState::new(h.nrows());
    let mut converged = true;

    while let Some(end) = state.last() {
        let l = deflation_point(h, end, eps, norm);

        if l == end {
            // One root isolated.
            h[(end, end)] += state.exshift;
            state.deflate(1);
        } else if l + 1 == end {
            // The window is down to a 2x2 block: solve it directly.
            split_trailing_block(h, v, end, state.exshift);
            state.deflate(2);
        } else if state.iter >= MAX_SWEEPS_PER_WINDOW {
            // Out of budget. Take the trailing entry as it stands and move
            // on so the rest of the matrix still gets reduced.
            converged = false;
            h[(end, end)] += state.exshift;
            h[(end, end - 1)] = 0.0;
            state.deflate(1);
        } else {
            let (x, y, w) = select_shift(h, &mut state, end);
            let (m, p, q, r) = first_bulge_row(h, l, end, eps, x, y, w);
            sweep(h, v, l, m, end, p, q, r);
        }
    }
    converged
}

/// Scan the subdiagonal upward from `end` for a negligible entry. A small
/// entry is set to exactly zero, splitting off an independent subproblem;
/// the returned index is the first row of the still-coupled window.
fn deflation_point(h: &mut DMatrix<f64>, end: usize, eps: f64, norm: f64) -> usize {
    let mut l = end;
    while l > 0 {
        let mut s = h[(l - 1, l - 1)].abs() + h[(l, l)].abs();
        if s == 0.0 {
            s = norm;
        }
        if h[(l, l - 1)].abs() <= eps * s {
            h[(l, l - 1)] = 0.0;
            break;
        }
        l -= 1;
    }
    l
}

/// Closed-form handling of a trailing 2x2 block via its trace and
/// determinant. A non-negative discriminant means two real roots: the block
/// is rotated to upper triangular form and the subdiagonal entry vanishes.
/// A negative discriminant is a genuine conjugate pair and the block is left
/// in place for extraction.
fn split_trailing_block(h: &mut DMatrix<f64>, v: &mut DMatrix<f64>, end: usize, exshift: f64) {
    let nn = h.nrows();
    let na = end - 1;

    let w = h[(end, na)] * h[(na, end)];
    let p = (h[(na, na)] - h[(end, end)]) / 2.0;
    let q = p * p + w;
    let mut z = q.abs().sqrt();
    h[(end, end)] += exshift;
    h[(na, na)] += exshift;
    let x = h[(end, end)];

    if q < 0.0 {
        // Complex pair: the block stays.
        return;
    }

    // Real pair: rotate the block so both roots land on the diagonal.
    z = if p >= 0.0 { p + z } else { p - z };
    let sub = h[(end, na)];
    let s = sub.abs() + z.abs();
    let mut pp = sub / s;
    let mut qq = z / s;
    let r = (pp * pp + qq * qq).sqrt();
    pp /= r;
    qq /= r;

    // Row modification
    for j in na..nn {
        let t = h[(na, j)];
        h[(na, j)] = qq * t + pp * h[(end, j)];
        h[(end, j)] = qq * h[(end, j)] - pp * t;
    }
    // Column modification
    for i in 0..=end {
        let t = h[(i, na)];
        h[(i, na)] = qq * t + pp * h[(i, end)];
        h[(i, end)] = qq * h[(i, end)] - pp * t;
    }
    // Accumulate transformations
    for i in 0..nn {
        let t = v[(i, na)];
        v[(i, na)] = qq * t + pp * v[(i, end)];
        v[(i, end)] = qq * v[(i, end)] - pp * t;
    }

    h[(end, na)] = 0.0;
}

/// Pick the double shift from the trailing 2x2 block of the window,
/// substituting an ad hoc exceptional shift after 10 and 30 stagnant sweeps
/// to break the rare cycles the standard shift cannot escape.
fn select_shift(h: &mut DMatrix<f64>, state: &mut IterationState, end: usize) -> (f64, f64, f64) {
    let mut x = h[(end, end)];
    let mut y = h[(end - 1, end - 1)];
    let mut w = h[(end, end - 1)] * h[(end - 1, end)];

    // Wilkinson's original ad hoc shift. The offset is subtracted from every
    // diagonal entry that has not deflated yet, so a single accumulated
    // exshift restores each of them at its own deflation.
    if state.iter == 10 {
        state.exshift += x;
        for i in 0..=end {
            h[(i, i)] -= x;
        }
        let s = h[(end, end - 1)].abs() + h[(end - 1, end - 2)].abs();
        x = 0.75 * s;
        y = x;
        w = -0.4375 * s * s;
    }

    // MATLAB's new ad hoc shift
    if state.iter == 30 {
        let mut s = (y - x) / 2.0;
        s = s * s + w;
        if s > 0.0 {
            let mut root = s.sqrt();
            if y < x {
                root = -root;
            }
            let shift = x - w / ((y - x) / 2.0 + root);
            for i in 0..=end {
                h[(i, i)] -= shift;
            }
            state.exshift += shift;
            x = 0.964;
            y = x;
            w = x;
        }
    }

    state.iter += 1;
    (x, y, w)
}

/// Walk up from the bottom of the window looking for two consecutive small
/// subdiagonal entries, which let the bulge chase start below the top of the
/// window. Returns the starting row and the normalized first reflector.
fn first_bulge_row(
    h: &mut DMatrix<f64>,
    l: usize,
    end: usize,
    eps: f64,
    x: f64,
    y: f64,
    w: f64,
) -> (usize, f64, f64, f64) {
    let mut m = end - 2;
    let (mut p, mut q, mut r);
    loop {
        let z = h[(m, m)];
        let dx = x - z;
        let dy = y - z;
        p = (dx * dy - w) / h[(m + 1, m)] + h[(m, m + 1)];
        q = h[(m + 1, m + 1)] - z - dx - dy;
        r = h[(m + 2, m + 1)];
        let s = p.abs() + q.abs() + r.abs();
        p /= s;
        q /= s;
        r /= s;
        if m == l {
            break;
        }
        if h[(m, m - 1)].abs() * (q.abs() + r.abs())
            < eps * (p.abs() * (h[(m - 1, m - 1)].abs() + z.abs() + h[(m + 1, m + 1)].abs()))
        {
            break;
        }
        m -= 1;
    }

    for i in (m + 2)..=end {
        h[(i, i - 2)] = 0.0;
        if i > m + 2 {
            h[(i, i - 3)] = 0.0;
        }
    }
    (m, p, q, r)
}

/// One double-shift sweep: chase the bulge from row `m` to the bottom of the
/// window with 3x3 (and finally 2x2) Householder reflectors, applied to `h`
/// from both sides and accumulated into `v`.
#[allow(clippy::too_many_arguments)]
fn sweep(
    h: &mut DMatrix<f64>,
    v: &mut DMatrix<f64>,
    l: usize,
    m: usize,
    end: usize,
    mut p: f64,
    mut q: f64,
    mut r: f64,
) {
    let nn = h.nrows();
    let mut x = 0.0;

    for k in m..end {
        let notlast = k != end - 1;
        if k != m {
            p = h[(k, k - 1)];
            q = h[(k + 1, k - 1)];
            r = if notlast { h[(k + 2, k - 1)] } else { 0.0 };
            x = p.abs() + q.abs() + r.abs();
            if x == 0.0 {
                continue;
            }
            p /= x;
            q /= x;
            r /= x;
        }

        let mut s = (p * p + q * q + r * r).sqrt();
        if p < 0.0 {
            s = -s;
        }
        if s == 0.0 {
            continue;
        }

        if k != m {
            h[(k, k - 1)] = -s * x;
        } else if l != m {
            h[(k, k - 1)] = -h[(k, k - 1)];
        }
        p += s;
        let fx = p / s;
        let fy = q / s;
        let fz = r / s;
        q /= p;
        r /= p;

        // Row modification
        for j in k..nn {
            let mut f = h[(k, j)] + q * h[(k + 1, j)];
            if notlast {
                f += r * h[(k + 2, j)];
                h[(k + 2, j)] -= f * fz;
            }
            h[(k, j)] -= f * fx;
            h[(k + 1, j)] -= f * fy;
        }

        // Column modification
        for i in 0..=end.min(k + 3) {
            let mut f = fx * h[(i, k)] + fy * h[(i, k + 1)];
            if notlast {
                f += fz * h[(i, k + 2)];
                h[(i, k + 2)] -= f * r;
            }
            h[(i, k)] -= f;
            h[(i, k + 1)] -= f * q;
        }

        // Accumulate transformations
        for i in 0..nn {
            let mut f = fx * v[(i, k)] + fy * v[(i, k + 1)];
            if notlast {
                f += fz * v[(i, k + 2)];
                v[(i, k + 2)] -= f * r;
            }
            v[(i, k)] -= f;
            v[(i, k + 1)] -= f * q;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hessenberg;

    const TOL: f64 = 1e-10;

    fn schur_of(orig: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>, bool) {
        let n = orig.nrows();
        let mut h = orig.clone();
        let mut v = DMatrix::zeros(n, n);
        hessenberg::reduce(&mut h, &mut v);
        let norm = hessenberg_norm(&h);
        let converged = iterate(&mut h, &mut v, f64::EPSILON, norm);
        (h, v, converged)
    }

    fn check_schur(orig: &DMatrix<f64>, h: &DMatrix<f64>, v: &DMatrix<f64>) {
        let n = orig.nrows();

        // Quasi-triangular: everything below the subdiagonal is exactly
        // zero, and no two consecutive subdiagonal entries are nonzero.
        for i in 0..n {
            for j in 0..i.saturating_sub(1) {
                assert_eq!(h[(i, j)], 0.0, "H[({}, {})] below subdiagonal", i, j);
            }
        }
        for i in 2..n {
            assert!(
                h[(i, i - 1)] == 0.0 || h[(i - 1, i - 2)] == 0.0,
                "overlapping 2x2 blocks at row {}",
                i
            );
        }

        // V stays orthogonal.
        let vtv = v.transpose() * v;
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (vtv[(i, j)] - expected).abs() < TOL,
                    "V'V[({}, {})] = {}",
                    i,
                    j,
                    vtv[(i, j)]
                );
            }
        }

        // Similarity is preserved.
        let vhvt = v * h * v.transpose();
        for i in 0..n {
            for j in 0..n {
                assert!(
                    (vhvt[(i, j)] - orig[(i, j)]).abs() < TOL,
                    "VHV'[({}, {})] = {} vs {}",
                    i,
                    j,
                    vhvt[(i, j)],
                    orig[(i, j)]
                );
            }
        }
    }

    #[test]
    fn triangularizes_real_spectrum() {
        // Companion matrix of (x-1)(x-2)(x-3).
        let a = DMatrix::from_row_slice(
            3,
            3,
            &[0.0, 0.0, 6.0, 1.0, 0.0, -11.0, 0.0, 1.0, 6.0],
        );
        let (h, v, converged) = schur_of(&a);
        assert!(converged);
        check_schur(&a, &h, &v);

        let mut diag: Vec<f64> = (0..3).map(|i| h[(i, i)]).collect();
        diag.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (got, want) in diag.iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < TOL, "diagonal {} vs {}", got, want);
        }
    }

    #[test]
    fn keeps_rotation_block_intact() {
        let (c, s) = (0.6, 0.8);
        let a = DMatrix::from_row_slice(2, 2, &[c, -s, s, c]);
        let (h, v, converged) = schur_of(&a);
        assert!(converged);
        check_schur(&a, &h, &v);
        assert!(
            h[(1, 0)] != 0.0,
            "complex pair must remain a 2x2 block, got subdiagonal 0"
        );
    }

    #[test]
    fn splits_real_2x2_block() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 4.0, 2.0, 3.0]);
        let (h, v, converged) = schur_of(&a);
        assert!(converged);
        check_schur(&a, &h, &v);
        // Eigenvalues of [[1,4],[2,3]] are 5 and -1.
        assert_eq!(h[(1, 0)], 0.0);
        let mut diag = [h[(0, 0)], h[(1, 1)]];
        diag.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((diag[0] + 1.0).abs() < TOL);
        assert!((diag[1] - 5.0).abs() < TOL);
    }

    #[test]
    fn mixed_spectrum_4x4() {
        let a = DMatrix::from_row_slice(
            4,
            4,
            &[
                3.0, 1.0, 0.0, 2.0, //
                -1.0, 3.0, 1.0, 0.0, //
                0.0, 0.0, 2.0, 5.0, //
                0.0, 0.0, 1.0, 0.0,
            ],
        );
        let (h, v, converged) = schur_of(&a);
        assert!(converged);
        check_schur(&a, &h, &v);
    }

    #[test]
    fn trace_is_preserved() {
        let a = DMatrix::from_row_slice(
            3,
            3,
            &[2.0, 1.0, 0.0, 0.0, 3.0, 1.0, 1.0, 0.0, 1.0],
        );
        let (h, _, converged) = schur_of(&a);
        assert!(converged);
        let trace_h: f64 = (0..3).map(|i| h[(i, i)]).sum();
        assert!((trace_h - 6.0).abs() < TOL, "trace drifted to {}", trace_h);
    }

    #[test]
    fn zero_matrix_deflates_immediately() {
        let a = DMatrix::zeros(3, 3);
        let (h, v, converged) = schur_of(&a);
        assert!(converged);
        assert_eq!(h, DMatrix::zeros(3, 3));
        assert_eq!(v, DMatrix::identity(3, 3));
    }
}
