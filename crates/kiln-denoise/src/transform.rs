//! Per-pixel feature transform construction.
//!
//! For every pixel, the features over a spatial window are centered,
//! scaled into a [-1, 1] range and accumulated into a covariance matrix.
//! Its eigendecomposition spans the feature space; eigenvectors carrying
//! too little energy are truncated away, which is the main guard against
//! the regression filter overfitting noisy features. The feature scaling
//! is baked into the surviving eigenvector rows, so filter kernels apply
//! a single matrix.

use kiln_core::Rect;
use kiln_math::{add_gramian, jacobi_eigendecomposition, vec_add, vec_max, vec_mul, vec_scale};
use tracing::warn;

use crate::error::{DenoiseError, DenoiseResult};
use crate::features::{FeatureSource, DENOISE_FEATURES};

/// Features whose value range over a window stays below this are treated
/// as constant and drop out of the transform.
const FEATURE_SCALE_EPS: f32 = 1e-4;

/// The reduced feature basis for one pixel.
#[derive(Debug, Clone)]
pub struct FeatureTransform {
    /// Eigenvector rows, feature scaling baked into the first `rank`
    /// rows.
    pub matrix: [f32; DENOISE_FEATURES * DENOISE_FEATURES],
    /// Number of rows spanning the reduced feature subspace.
    pub rank: usize,
}

/// Builds the feature transform for the pixel (x, y).
///
/// The window is the square of radius `radius` around the pixel, clipped
/// to `rect`. A positive `pca_threshold` is the fraction of total
/// eigenvalue energy that may be discarded; a non-positive value keeps
/// every eigenvector whose singular value reaches `-pca_threshold`. At
/// least two and at most [`DENOISE_FEATURES`] dimensions survive.
pub fn construct_transform<S: FeatureSource>(
    source: &S,
    x: i32,
    y: i32,
    rect: Rect,
    radius: i32,
    pca_threshold: f32,
) -> DenoiseResult<FeatureTransform> {
    let window = rect.window(x, y, radius);
    if window.is_empty() {
        return Err(DenoiseError::EmptyWindow { x, y });
    }
    Ok(transform_for_window(source, x, y, window, pca_threshold))
}

/// Transform construction over an already clipped, non-empty window.
pub(crate) fn transform_for_window<S: FeatureSource>(
    source: &S,
    x: i32,
    y: i32,
    window: Rect,
    pca_threshold: f32,
) -> FeatureTransform {
    const D: usize = DENOISE_FEATURES;
    let mut features = [0.0f32; D];

    // Shift the feature passes to mean zero over the window.
    let mut means = [0.0f32; D];
    for (px, py) in window.iter_coords() {
        source.get_features(px, py, &mut features, None);
        vec_add(&mut means, &features);
    }
    vec_scale(&mut means, 1.0 / window.area() as f32);

    // Scale the shifted features to [-1, 1]; applied during accumulation
    // and baked into the transform at the end.
    let mut scale = [0.0f32; D];
    for (px, py) in window.iter_coords() {
        source.get_feature_scales(px, py, &mut features, &means);
        vec_max(&mut scale, &features);
    }
    calculate_scale(&mut scale);

    // Covariance of the scaled, centered features.
    let mut covariance = [0.0f32; D * D];
    for (px, py) in window.iter_coords() {
        source.get_features(px, py, &mut features, Some(&means));
        vec_mul(&mut features, &scale);
        add_gramian(&mut covariance, D, &features, 1.0);
    }

    // The eigenbasis of the covariance spans the feature space with
    // decreasing energy; truncation keeps the significant directions.
    let mut matrix = [0.0f32; D * D];
    let rank = match jacobi_eigendecomposition(&mut covariance, &mut matrix, D) {
        Ok(()) => select_rank(&covariance, &mut matrix, &scale, pca_threshold),
        Err(err) => {
            warn!(x, y, error = %err, "falling back to minimal feature rank");
            let rank = D.min(2);
            for r in 0..rank {
                vec_mul(&mut matrix[r * D..(r + 1) * D], &scale);
            }
            rank
        }
    };

    FeatureTransform { matrix, rank }
}

/// `scale[i] = 1 / raw_scale[i]`, with near-constant features zeroed out.
fn calculate_scale(scale: &mut [f32; DENOISE_FEATURES]) {
    for s in scale.iter_mut() {
        *s = if *s > FEATURE_SCALE_EPS { 1.0 / *s } else { 0.0 };
    }
}

/// Truncates the eigenbasis and bakes the feature scaling into the kept
/// rows. `eigen` holds the sorted eigenvalues on its diagonal.
fn select_rank(
    eigen: &[f32],
    transform: &mut [f32],
    scale: &[f32; DENOISE_FEATURES],
    pca_threshold: f32,
) -> usize {
    const D: usize = DENOISE_FEATURES;
    let mut rank = 0;

    if pca_threshold > 0.0 {
        let total: f32 = (0..D).map(|i| eigen[i * D + i]).sum();
        let target = total * (1.0 - pca_threshold);
        let mut reduced = 0.0;
        for i in 0..D {
            if i >= 2 && reduced >= target {
                break;
            }
            reduced += eigen[i * D + i];
            vec_mul(&mut transform[rank * D..(rank + 1) * D], scale);
            rank += 1;
        }
    } else {
        for i in 0..D {
            if i >= 2 && eigen[i * D + i].sqrt() < -pca_threshold {
                break;
            }
            vec_mul(&mut transform[rank * D..(rank + 1) * D], scale);
            rank += 1;
        }
    }

    rank
}
