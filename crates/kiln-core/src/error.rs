//! Error types for kiln-core operations.
//!
//! Provides unified error handling for tile geometry and buffer setup.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while describing render geometry and buffers.
///
/// Structural errors are reported synchronously to the caller; nothing in
/// this crate panics on bad input.
#[derive(Debug, Error)]
pub enum Error {
    /// Image dimensions are unusable (negative width or height).
    ///
    /// A zero-area image is valid and produces an empty tile grid; negative
    /// dimensions are not.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width
        width: i32,
        /// Requested height
        height: i32,
    },

    /// Tile size must be strictly positive in both axes.
    #[error("invalid tile size: {x}x{y}")]
    InvalidTileSize {
        /// Tile width
        x: i32,
        /// Tile height
        y: i32,
    },

    /// A persisted tile-order identifier is outside the known 0..=5 range.
    #[error("unknown tile order identifier: {value}")]
    UnknownTileOrder {
        /// The identifier that failed to parse
        value: i32,
    },

    /// An externally supplied buffer does not match the declared geometry.
    #[error("buffer of {len} floats does not cover {expected} ({context})")]
    BufferMismatch {
        /// Length of the supplied buffer
        len: usize,
        /// Number of floats the declared geometry requires
        expected: usize,
        /// What was being validated
        context: String,
    },
}

impl Error {
    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: i32, height: i32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    /// Creates an [`Error::InvalidTileSize`] error.
    #[inline]
    pub fn invalid_tile_size(x: i32, y: i32) -> Self {
        Self::InvalidTileSize { x, y }
    }

    /// Creates an [`Error::BufferMismatch`] error.
    #[inline]
    pub fn buffer_mismatch(len: usize, expected: usize, context: impl Into<String>) -> Self {
        Self::BufferMismatch {
            len,
            expected,
            context: context.into(),
        }
    }
}
