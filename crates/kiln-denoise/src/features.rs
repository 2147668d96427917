//! Feature access for the denoise transform.
//!
//! The transform is generic over a [`FeatureSource`] capability so the
//! math never touches buffer layout directly. [`PassBuffer`] is the
//! standard source: a borrowed, plane-per-pass view of prefiltered render
//! output with explicit stride and bounds.

use kiln_core::{Error, Rect, Result};

use crate::passes::FEATURE_PLANES;

/// Dimension of the feature space: pixel x and y, depth, a 3-component
/// normal, a 3-component albedo and the shadow feature.
pub const DENOISE_FEATURES: usize = 10;

/// Reads the feature vector at a pixel.
pub trait FeatureSource {
    /// Fills `features` with the feature vector at (x, y), subtracting
    /// `mean` when given.
    fn get_features(
        &self,
        x: i32,
        y: i32,
        features: &mut [f32; DENOISE_FEATURES],
        mean: Option<&[f32; DENOISE_FEATURES]>,
    );

    /// Fills `scales` with the absolute deviation of each feature from
    /// `means` at (x, y).
    fn get_feature_scales(
        &self,
        x: i32,
        y: i32,
        scales: &mut [f32; DENOISE_FEATURES],
        means: &[f32; DENOISE_FEATURES],
    );
}

/// Rounds up to a multiple of four, the row alignment of filter buffers.
#[inline]
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) / alignment * alignment
}

/// A read-only view of the prefiltered feature planes for one filter
/// rect.
///
/// Rows are aligned to four floats; plane `p` of pixel (x, y) lives at
/// `p * pass_stride + (y - rect.y) * row_stride + (x - rect.x)`.
#[derive(Debug, Clone, Copy)]
pub struct PassBuffer<'a> {
    data: &'a [f32],
    rect: Rect,
    row_stride: usize,
    pass_stride: usize,
}

impl<'a> PassBuffer<'a> {
    /// Wraps feature-plane data for `rect`, validating the buffer covers
    /// every plane the transform reads.
    pub fn new(data: &'a [f32], rect: Rect, pass_stride: usize) -> Result<Self> {
        let row_stride = align_up(rect.width.max(0) as usize, 4);
        let plane_len = row_stride * rect.height.max(0) as usize;
        if pass_stride < plane_len {
            return Err(Error::buffer_mismatch(
                pass_stride,
                plane_len,
                "pass stride shorter than one plane",
            ));
        }
        let needed = FEATURE_PLANES * pass_stride;
        if data.len() < needed {
            return Err(Error::buffer_mismatch(data.len(), needed, "feature planes"));
        }
        Ok(Self {
            data,
            rect,
            row_stride,
            pass_stride,
        })
    }

    /// The filter rect this buffer covers.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[inline]
    fn value(&self, x: i32, y: i32, plane: usize) -> f32 {
        debug_assert!(self.rect.contains(x, y));
        let px = (x - self.rect.x) as usize;
        let py = (y - self.rect.y) as usize;
        self.data[plane * self.pass_stride + py * self.row_stride + px]
    }
}

impl FeatureSource for PassBuffer<'_> {
    fn get_features(
        &self,
        x: i32,
        y: i32,
        features: &mut [f32; DENOISE_FEATURES],
        mean: Option<&[f32; DENOISE_FEATURES]>,
    ) {
        features[0] = x as f32;
        features[1] = y as f32;
        for plane in 0..FEATURE_PLANES {
            features[2 + plane] = self.value(x, y, plane);
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
