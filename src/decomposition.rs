//! Public entry point tying the pipeline together.

use nalgebra::DMatrix;
use num_complex::Complex64;
use thiserror::Error;

use crate::{balance, francis, hessenberg, schur, vectors};

/// Preconditions rejected before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EigenError {
    /// The input matrix is not square.
    #[error("expected a square matrix, got {nrows}x{ncols}")]
    NotSquare {
        /// Number of rows of the rejected input.
        nrows: usize,
        /// Number of columns of the rejected input.
        ncols: usize,
    },
    /// The convergence tolerance is unusable as a relative threshold.
    #[error("tolerance must be finite and positive, got {epsilon}")]
    InvalidTolerance {
        /// The rejected tolerance.
        epsilon: f64,
    },
}

/// Eigenvalues and eigenvectors of a real square matrix.
///
/// For a matrix A the decomposition produces an eigenvalue sequence and a
/// real matrix V with A * V = V * D, where D is the real block diagonal
/// matrix returned by [`Eigen::eigenvalue_matrix`]: a real eigenvalue
/// occupies a 1x1 block, and a conjugate pair a ± bi occupies the 2x2 block
/// [[a, b], [-b, a]]. For a real eigenvalue, the matching column of V is an
/// ordinary eigenvector; for a conjugate pair the two adjacent columns hold
/// the real and imaginary parts of the complex eigenvector. V may be badly
/// conditioned, or even singular: the decomposition itself does not require
/// V to be invertible.
///
/// Complex eigenvalues always come out as adjacent conjugate pairs with the
/// positive imaginary part first, in the same order as their columns in V.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Eigen {
    values: Vec<Complex64>,
    vectors: DMatrix<f64>,
    converged: bool,
}

impl Eigen {
    /// Decompose `a` with the relative convergence tolerance `epsilon`
    /// (machine epsilon, [`f64::EPSILON`], is the conventional choice).
    ///
    /// The input is balanced with an exact diagonal similarity transform,
    /// reduced to upper Hessenberg form, iterated to real Schur form with
    /// implicit double shifts, and back-transformed; `a` itself is never
    /// modified. Fails only on a non-square matrix or an unusable
    /// tolerance. A window of the QR iteration that refuses to converge
    /// within its sweep budget is reported through [`Eigen::is_converged`]
    /// instead of an error, with best-effort values for the entries
    /// involved.
    pub fn new(a: &DMatrix<f64>, epsilon: f64) -> Result<Eigen, EigenError> {
        if a.nrows() != a.ncols() {
            return Err(EigenError::NotSquare {
                nrows: a.nrows(),
                ncols: a.ncols(),
            });
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(EigenError::InvalidTolerance { epsilon });
        }

        let n = a.nrows();
        let mut h = a.clone_owned();
        let scale = balance::balance(&mut h);
        let mut v = DMatrix::zeros(n, n);
        hessenberg::reduce(&mut h, &mut v);
        let norm = francis::hessenberg_norm(&h);
        let converged = francis::iterate(&mut h, &mut v, epsilon, norm);
        let (re, im) = schur::extract(&h);
        if norm != 0.0 {
            vectors::back_substitute(&mut h, &re, &im, epsilon, norm);
            vectors::back_transform(&h, &mut v);
        }
        balance::balance_back(&mut v, &scale);
        vectors::normalize(&mut v, &im);

        let values = re
            .iter()
            .zip(im.iter())
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect();
        Ok(Eigen {
            values,
            vectors: v,
            converged,
        })
    }

    /// The eigenvalues, in the order of their columns in [`Eigen::vectors`].
    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    /// The eigenvector matrix V.
    pub fn vectors(&self) -> &DMatrix<f64> {
        &self.vectors
    }

    /// False when some eigenvalues exhausted the iteration budget and carry
    /// best-effort values only.
    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// The real block diagonal eigenvalue matrix D with A * V = V * D.
    pub fn eigenvalue_matrix(&self) -> DMatrix<f64> {
        let n = self.values.len();
        let mut d = DMatrix::zeros(n, n);
        for (i, lambda) in self.values.iter().enumerate() {
            d[(i, i)] = lambda.re;
            if lambda.im > 0.0 {
                d[(i, i + 1)] = lambda.im;
            } else if lambda.im < 0.0 {
                d[(i, i - 1)] = lambda.im;
            }
        }
        d
    }

    /// Consume the decomposition, returning the eigenvalues and V.
    pub fn into_parts(self) -> (Vec<Complex64>, DMatrix<f64>) {
        (self.values, self.vectors)
    }
}
