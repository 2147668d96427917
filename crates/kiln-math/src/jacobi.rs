//! Symmetric Jacobi eigendecomposition for small dense matrices.
//!
//! Feature covariance matrices are at most ~16x16, so cyclic Jacobi
//! sweeps converge in a handful of iterations and need no pivoting
//! strategy beyond skipping negligible off-diagonal entries.
//!
//! # Example
//!
//! ```rust
//! use kiln_math::jacobi_eigendecomposition;
//!
//! // [[2, 1], [1, 2]] has eigenvalues 3 and 1.
//! let mut m = [2.0, 0.0, 1.0, 2.0];
//! let mut v = [0.0; 4];
//! jacobi_eigendecomposition(&mut m, &mut v, 2).unwrap();
//! assert!((m[0] - 3.0).abs() < 1e-5);
//! assert!((m[3] - 1.0).abs() < 1e-5);
//! ```

use thiserror::Error;

use crate::matrix::mirror_lower;

/// Maximum number of full sweeps before giving up.
pub const JACOBI_MAX_SWEEPS: usize = 50;

/// Relative tolerance for treating off-diagonal entries as zero.
pub const JACOBI_EPS: f32 = 1e-7;

/// Error type for the eigendecomposition.
#[derive(Debug, Error)]
pub enum JacobiError {
    /// The sweep cap was reached with off-diagonal mass remaining.
    ///
    /// The diagonal and eigenvector rows still hold the best-effort
    /// result of the last sweep.
    #[error("eigendecomposition did not converge within {0} sweeps")]
    NoConvergence(usize),
}

/// Eigendecomposition of a symmetric matrix via cyclic Jacobi rotations.
///
/// `matrix` is a row-major `n * n` buffer whose lower triangle holds the
/// input. On return its diagonal holds the eigenvalues, sorted descending
/// by absolute value (ties stable by original position). `vectors`
/// receives the matching eigenvectors as rows.
///
/// Rotation angles follow `tan(2θ) = 2·C[p,q] / (C[p,p] − C[q,q])`;
/// entries with `|C[p,q]| <= eps·(|C[p,p]| + |C[q,q]|)` are skipped, and a
/// sweep pass ends once the largest off-diagonal magnitude drops below
/// `eps` times the absolute trace.
pub fn jacobi_eigendecomposition(
    matrix: &mut [f32],
    vectors: &mut [f32],
    n: usize,
) -> Result<(), JacobiError> {
    debug_assert!(matrix.len() >= n * n);
    debug_assert!(vectors.len() >= n * n);

    mirror_lower(matrix, n);

    vectors[..n * n].fill(0.0);
    for i in 0..n {
        vectors[i * n + i] = 1.0;
    }

    for _sweep in 0..JACOBI_MAX_SWEEPS {
        let mut off_max = 0.0f32;
        let mut trace_abs = 0.0f32;
        for r in 0..n {
            trace_abs += matrix[r * n + r].abs();
            for c in (r + 1)..n {
                off_max = off_max.max(matrix[r * n + c].abs());
            }
        }
        if off_max <= JACOBI_EPS * trace_abs {
            sort_descending(matrix, vectors, n);
            return Ok(());
        }

        for p in 0..n - 1 {
            for q in (p + 1)..n {
                let apq = matrix[p * n + q];
                let app = matrix[p * n + p];
                let aqq = matrix[q * n + q];
                if apq.abs() <= JACOBI_EPS * (app.abs() + aqq.abs()) {
                    continue;
                }

                let theta = 0.5 * (2.0 * apq).atan2(app - aqq);
                let c = theta.cos();
                let s = theta.sin();

                // A <- A J (columns p, q)
                for k in 0..n {
                    let akp = matrix[k * n + p];
                    let akq = matrix[k * n + q];
                    matrix[k * n + p] = c * akp + s * akq;
                    matrix[k * n + q] = c * akq - s * akp;
                }
                // A <- J^T A (rows p, q)
                for k in 0..n {
                    let apk = matrix[p * n + k];
                    let aqk = matrix[q * n + k];
                    matrix[p * n + k] = c * apk + s * aqk;
                    matrix[q * n + k] = c * aqk - s * apk;
                }
                // Accumulate the same rotation into the eigenvector rows.
                for k in 0..n {
                    let vpk = vectors[p * n + k];
                    let vqk = vectors[q * n + k];
                    vectors[p * n + k] = c * vpk + s * vqk;
                    vectors[q * n + k] = c * vqk - s * vpk;
                }
            }
        }
    }

    sort_descending(matrix, vectors, n);
    Err(JacobiError::NoConvergence(JACOBI_MAX_SWEEPS))
}

/// Reorders eigenvalues descending by magnitude, permuting the
/// eigenvector rows identically. Stable for equal magnitudes.
fn sort_descending(matrix: &mut [f32], vectors: &mut [f32], n: usize) {
    let diag: Vec<f32> = (0..n).map(|i| matrix[i * n + i]).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        diag[b]
            .abs()
            .partial_cmp(&diag[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let old_vectors = vectors[..n * n].to_vec();
    for (new_r, &old_r) in order.iter().enumerate() {
        matrix[new_r * n + new_r] = diag[old_r];
        vectors[new_r * n..new_r * n + n].copy_from_slice(&old_vectors[old_r * n..old_r * n + n]);
    }
}
