//! Error types for denoise preparation.

use kiln_core::Rect;
use thiserror::Error;

/// Result type for denoise preparation.
pub type DenoiseResult<T> = Result<T, DenoiseError>;

/// Errors raised while building feature transforms.
#[derive(Debug, Error)]
pub enum DenoiseError {
    /// The denoise window around a pixel clipped to nothing; the pixel
    /// lies outside the filter rect.
    #[error("empty denoise window around pixel ({x}, {y})")]
    EmptyWindow {
        /// Pixel x
        x: i32,
        /// Pixel y
        y: i32,
    },

    /// A tile to prepare is not contained in the filter rect.
    #[error("tile {tile} not contained in filter rect {rect}")]
    TileOutsideRect {
        /// The tile being prepared
        tile: Rect,
        /// The filter rect
        rect: Rect,
    },

    /// A structural error from the core types.
    #[error(transparent)]
    Core(#[from] kiln_core::Error),
}
