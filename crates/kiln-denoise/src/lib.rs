//! # kiln-denoise
//!
//! Feature-space PCA transforms preparing render tiles for denoising.
//!
//! Before a tile is denoised, every pixel gets a reduced feature basis:
//! features (position, depth, normal, albedo, shadow) are gathered over a
//! spatial window, centered and scaled, and the eigenbasis of their
//! covariance is truncated by an energy threshold. The filter kernels
//! then regress in that reduced space.
//!
//! # Usage
//!
//! ```rust
//! use kiln_core::Rect;
//! use kiln_denoise::{construct_transform, PassBuffer, FEATURE_PLANES};
//!
//! let rect = Rect::from_size(32, 32);
//! let pass_stride = 32 * 32;
//! let data = vec![0.5f32; FEATURE_PLANES * pass_stride];
//! let buffer = PassBuffer::new(&data, rect, pass_stride).unwrap();
//!
//! let transform = construct_transform(&buffer, 16, 16, rect, 8, 0.05).unwrap();
//! assert!(transform.rank >= 1);
//! ```
//!
//! # Concurrency
//!
//! Everything here is pure compute over borrowed inputs; transforms for
//! disjoint pixels build safely in parallel, and
//! [`construct_tile_transforms`] does exactly that for a whole tile.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod features;
mod passes;
mod prepare;
mod transform;

pub use error::{DenoiseError, DenoiseResult};
pub use features::{FeatureSource, PassBuffer, DENOISE_FEATURES};
pub use passes::{pass_plane, DenoisePass, DENOISE_PASSES, FEATURE_PLANES, TOTAL_PLANES};
pub use prepare::construct_tile_transforms;
pub use transform::{construct_transform, FeatureTransform};
