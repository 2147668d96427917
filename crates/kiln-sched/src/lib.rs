//! # kiln-sched
//!
//! Tile generation, scheduling and progressive refinement for the kiln
//! renderer.
//!
//! The image is split into a grid of tiles, each assigned to a logical
//! device in a configurable traversal order. A [`TileManager`] tracks
//! every tile through its render → denoise → free lifecycle, gating
//! denoise work on the 3x3 spatial neighborhood so filter kernels can
//! safely read margins from adjacent tiles.
//!
//! # Usage
//!
//! ```rust
//! use kiln_core::{BufferParams, Int2, TileOrder};
//! use kiln_sched::{TileManager, TileManagerConfig};
//!
//! let mut manager = TileManager::new(TileManagerConfig {
//!     num_samples: 8,
//!     tile_size: Int2::splat(16),
//!     tile_order: TileOrder::LeftToRight,
//!     ..TileManagerConfig::default()
//! })
//! .unwrap();
//! manager.reset(BufferParams::new(64, 48, 0), 8);
//!
//! while manager.next().unwrap() {
//!     while let Some(tile) = manager.next_tile(0) {
//!         let index = tile.index;
//!         // ... render the tile ...
//!         manager.return_tile(index).unwrap();
//!     }
//! }
//! ```
//!
//! # Concurrency
//!
//! The manager is a single-threaded coordinator: callers wrap it in a
//! mutex and keep kernel execution outside the lock. All methods are
//! non-blocking.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod generator;
mod hilbert;
pub mod manager;
mod order;
mod progress;

pub use error::{SchedError, SchedResult};
pub use manager::{TileManager, TileManagerConfig, TileResolution};
