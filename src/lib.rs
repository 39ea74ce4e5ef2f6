//! Eigenvalues and eigenvectors of general real square matrices.
//!
//! The whole computation stays in real arithmetic: a balanced copy of the
//! input is reduced to upper Hessenberg form by orthogonal similarity
//! transformations, driven to real Schur form by Francis implicit
//! double-shift QR steps with deflation, and the eigenvectors are recovered
//! by back-substitution through the quasi-triangular result. Complex
//! conjugate eigenvalue pairs are represented by 2x2 diagonal blocks and by
//! adjacent real/imaginary column pairs of the eigenvector matrix, so the
//! defining relation A * V = V * D holds with every factor real.
//!
//! ```
//! use dense_eigen::Eigen;
//! use nalgebra::DMatrix;
//!
//! let a = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 1.0, 0.0]);
//! let eig = Eigen::new(&a, f64::EPSILON).unwrap();
//!
//! // A 90 degree rotation has eigenvalues +/- i.
//! assert!((eig.values()[0].im - 1.0).abs() < 1e-12);
//! let residual = &a * eig.vectors() - eig.vectors() * eig.eigenvalue_matrix();
//! assert!(residual.amax() < 1e-12);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]
#![warn(missing_docs)]

mod balance;
mod decomposition;
mod francis;
mod hessenberg;
mod schur;
mod vectors;

pub use decomposition::{Eigen, EigenError};
pub use num_complex::Complex64;
