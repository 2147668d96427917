//! Parallel transform construction for whole tiles.
//!
//! Transform construction is pure per-pixel compute, so preparing a tile
//! parallelizes over its rows. This runs in the worker phase, outside
//! the scheduler lock.

use kiln_core::Rect;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{DenoiseError, DenoiseResult};
use crate::features::FeatureSource;
use crate::transform::{transform_for_window, FeatureTransform};

/// Builds the feature transform of every pixel in `tile`, row by row in
/// parallel.
///
/// `tile` must be contained in the filter rect the source covers.
/// Transforms come back in row-major tile order.
pub fn construct_tile_transforms<S>(
    source: &S,
    tile: Rect,
    rect: Rect,
    radius: i32,
    pca_threshold: f32,
) -> DenoiseResult<Vec<FeatureTransform>>
where
    S: FeatureSource + Sync,
{
    if tile.is_empty() {
        return Ok(Vec::new());
    }
    if !rect.contains_rect(&tile) {
        return Err(DenoiseError::TileOutsideRect { tile, rect });
    }

    let transforms: Vec<FeatureTransform> = (tile.y..tile.bottom())
        .into_par_iter()
        .flat_map_iter(|py| {
            (tile.x..tile.right()).map(move |px| {
                let window = rect.window(px, py, radius);
                transform_for_window(source, px, py, window, pca_threshold)
            })
        })
        .collect();

    debug!(
        tile = %tile,
        transforms = transforms.len(),
        "prepared tile transforms"
    );
    Ok(transforms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::DENOISE_FEATURES;

    /// Features derived from pixel position only; enough structure for
    /// the covariance to be non-degenerate.
    struct GradientSource;

    impl FeatureSource for GradientSource {
        fn get_features(
            &self,
            x: i32,
            y: i32,
            features: &mut [f32; DENOISE_FEATURES],
            mean: Option<&[f32; DENOISE_FEATURES]>,
        ) {
            features[0] = x as f32;
            features[1] = y as f32;
            for i in 2..DENOISE_FEATURES {
                features[i] = ((x * 3 + y * 7 + i as i32 * 13) % 11) as f32 * 0.1;
            }
            if let Some(mean) = mean {
                for (f, m) in features.iter_mut().zip(mean) {
                    *f -= m;
                }
            }
        }

        fn get_feature_scales(
            &self,
            x: i32,
            y: i32,
            scales: &mut [f32; DENOISE_FEATURES],
            means: &[f32; DENOISE_FEATURES],
        ) {
            self.get_features(x, y, scales, Some(means));
            for s in scales.iter_mut() {
                *s = s.abs();
            }
        }
    }

    #[test]
    fn test_one_transform_per_pixel() {
        let rect = Rect::from_size(16, 16);
        let tile = Rect::new(4, 4, 4, 4);
        let transforms = construct_tile_transforms(&GradientSource, tile, rect, 3, 0.1).unwrap();
        assert_eq!(transforms.len(), 16);
        for transform in &transforms {
            assert!(transform.rank >= 1 && transform.rank <= DENOISE_FEATURES);
        }
    }

    #[test]
    fn test_matches_single_pixel_construction() {
        let rect = Rect::from_size(16, 16);
        let tile = Rect::new(2, 3, 3, 2);
        let transforms = construct_tile_transforms(&GradientSource, tile, rect, 2, 0.05).unwrap();

        let single =
            crate::transform::construct_transform(&GradientSource, 3, 4, rect, 2, 0.05).unwrap();
        // Tile pixel (3, 4) is row 1, column 1.
        let from_tile = &transforms[1 * 3 + 1];
        assert_eq!(from_tile.rank, single.rank);
        for (a, b) in from_tile.matrix.iter().zip(single.matrix.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_tile_outside_rect_rejected() {
        let rect = Rect::from_size(8, 8);
        let tile = Rect::new(6, 6, 4, 4);
        let err = construct_tile_transforms(&GradientSource, tile, rect, 2, 0.1).unwrap_err();
        assert!(matches!(err, DenoiseError::TileOutsideRect { .. }));
    }

    #[test]
    fn test_empty_tile() {
        let rect = Rect::from_size(8, 8);
        let tile = Rect::new(2, 2, 0, 4);
        let transforms = construct_tile_transforms(&GradientSource, tile, rect, 2, 0.1).unwrap();
        assert!(transforms.is_empty());
    }
}
