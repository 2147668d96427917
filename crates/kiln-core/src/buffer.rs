//! Render buffer model: the window being rendered and its pixel storage.
//!
//! Tiles reference buffers in one of two ways. Outside denoise scheduling,
//! every tile holds a clone of the shared frame buffer handle. In
//! denoise-scheduling mode each tile carries a uniquely owned buffer that
//! the scheduler releases once the tile and its whole neighborhood have
//! been denoised. Dropping the last handle releases the storage, so no
//! path — including a panicking caller — can leak it.

use std::sync::Arc;

use crate::error::{Error, Result};

/// The window being rendered within a larger canvas.
///
/// `width`/`height` are the dimensions of the render window;
/// `full_*` describe its placement inside the full canvas. `pass_stride`
/// is the number of float values stored per pixel across all passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferParams {
    /// Render window width
    pub width: i32,
    /// Render window height
    pub height: i32,
    /// X offset of the window inside the full canvas
    pub full_x: i32,
    /// Y offset of the window inside the full canvas
    pub full_y: i32,
    /// Full canvas width
    pub full_width: i32,
    /// Full canvas height
    pub full_height: i32,
    /// Float values per pixel over all passes
    pub pass_stride: i32,
}

impl BufferParams {
    /// Creates parameters for a window at the canvas origin.
    pub fn new(width: i32, height: i32, pass_stride: i32) -> Self {
        Self {
            width,
            height,
            full_x: 0,
            full_y: 0,
            full_width: width,
            full_height: height,
            pass_stride,
        }
    }

    /// These parameters scaled down by a resolution divider.
    ///
    /// Dimensions never drop below one pixel.
    pub fn scaled(&self, divider: i32) -> BufferParams {
        BufferParams {
            width: (self.width / divider).max(1),
            height: (self.height / divider).max(1),
            full_x: self.full_x / divider,
            full_y: self.full_y / divider,
            full_width: (self.full_width / divider).max(1),
            full_height: (self.full_height / divider).max(1),
            pass_stride: self.pass_stride,
        }
    }

    /// Number of floats a buffer with these parameters holds.
    pub fn buffer_len(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize * self.pass_stride.max(0) as usize
    }
}

/// Pixel storage for a render window.
///
/// Data is stored as `width * height * pass_stride` floats.
#[derive(Debug)]
pub struct RenderBuffers {
    /// Geometry of this buffer
    pub params: BufferParams,
    /// Pixel data
    pub data: Vec<f32>,
}

impl RenderBuffers {
    /// Allocates a zeroed buffer for the given window.
    pub fn new(params: BufferParams) -> Result<Self> {
        if params.width < 0 || params.height < 0 {
            return Err(Error::invalid_dimensions(params.width, params.height));
        }
        Ok(Self {
            data: vec![0.0; params.buffer_len()],
            params,
        })
    }

    /// Wraps existing pixel data, validating it against the geometry.
    pub fn from_data(params: BufferParams, data: Vec<f32>) -> Result<Self> {
        let expected = params.buffer_len();
        if data.len() != expected {
            return Err(Error::buffer_mismatch(data.len(), expected, "render buffer"));
        }
        Ok(Self { params, data })
    }
}

/// Shared handle to render buffers.
///
/// Cloning is cheap; the storage is released when the last handle drops.
pub type BufferHandle = Arc<RenderBuffers>;
