//! # kiln-math
//!
//! Dense small-matrix kernels for the kiln tile renderer.
//!
//! The denoiser works in a low-dimensional feature space (around ten
//! dimensions), so everything here is written for small row-major `f32`
//! buffers rather than a general linear-algebra stack:
//!
//! - element-wise vector helpers ([`vec_add`], [`vec_scale`], [`vec_max`], ...)
//! - lower-triangle accumulation ([`add_gramian`])
//! - symmetric Jacobi eigendecomposition ([`jacobi_eigendecomposition`])
//!
//! # Usage
//!
//! ```rust
//! use kiln_math::{add_gramian, jacobi_eigendecomposition};
//!
//! let n = 3;
//! let mut cov = vec![0.0f32; n * n];
//! add_gramian(&mut cov, n, &[1.0, 2.0, 0.5], 1.0);
//!
//! let mut vectors = vec![0.0f32; n * n];
//! jacobi_eigendecomposition(&mut cov, &mut vectors, n).unwrap();
//! // A rank-1 Gramian has a single non-zero eigenvalue.
//! assert!(cov[0] > 1.0 && cov[4].abs() < 1e-5 && cov[8].abs() < 1e-5);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod jacobi;
mod matrix;
mod vector;

pub use jacobi::*;
pub use matrix::*;
pub use vector::*;
