//! The tile manager: work scheduling and denoise coordination.
//!
//! A single `TileManager` coordinates every device rendering one image.
//! Drivers call [`TileManager::next`] to advance the progression (which
//! regenerates the tile grid), then repeatedly acquire work with
//! [`TileManager::next_tile`] and report completion with
//! [`TileManager::return_tile`]. The manager itself never blocks and never
//! launches work; callers serialize access to it (a mutex around the
//! manager is the intended synchronization surface) and run the actual
//! render or denoise kernels outside that lock.
//!
//! # Denoise gating
//!
//! Denoising a tile reads a margin of its neighbors, so a tile may only
//! start denoising once every existing tile in its 3x3 neighborhood has
//! been rendered, and its buffers may only be freed once the whole
//! neighborhood has been denoised. [`TileManager::return_tile`] promotes
//! neighbors through those gates as completions arrive.

use std::collections::VecDeque;

use kiln_core::{BufferHandle, BufferParams, Int2, Tile, TileOrder, TileState};
use tracing::{debug, trace};

use crate::error::{SchedError, SchedResult};
use crate::generator::{gen_tiles, GenInput};
use crate::progress::{initial_divider, preview_pixel_samples};

/// Neighbor enumeration for the 3x3 gating window. The cell itself comes
/// last; the freeing rule in `return_tile` relies on that position.
const NEIGHBOR_DX: [i32; 9] = [-1, 0, 1, -1, 1, -1, 0, 1, 0];
const NEIGHBOR_DY: [i32; 9] = [-1, -1, -1, 0, 0, 1, 1, 1, 0];

/// Construction parameters for a [`TileManager`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileManagerConfig {
    /// Render one sample per step instead of all at once
    pub progressive: bool,
    /// Total samples to render
    pub num_samples: i32,
    /// Nominal tile size in pixels
    pub tile_size: Int2,
    /// Preview starts at the divider that fits this resolution;
    /// `i32::MAX` disables preview scaling
    pub start_resolution: i32,
    /// Hand every tile back to the device it was generated for
    pub preserve_tile_device: bool,
    /// Batch rendering; interactive viewports slice the image per device
    /// instead
    pub background: bool,
    /// Traversal order for the per-device queues
    pub tile_order: TileOrder,
    /// Number of logical devices
    pub num_devices: i32,
    /// Skip rendering and only schedule denoise work
    pub only_denoise: bool,
}

impl Default for TileManagerConfig {
    fn default() -> Self {
        Self {
            progressive: false,
            num_samples: 0,
            tile_size: Int2::splat(64),
            start_resolution: i32::MAX,
            preserve_tile_device: false,
            background: true,
            tile_order: TileOrder::Center,
            num_devices: 1,
            only_denoise: false,
        }
    }
}

/// What the caller must do with a returned tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileResolution {
    /// The tile's result must be written back (not just updated in place)
    pub writeback: bool,
    /// The tile's buffers are done and must be released by the caller
    /// after the writeback, via [`TileManager::release_tile_buffers`]
    pub delete: bool,
}

/// Coordinates tile generation, per-device queues and the
/// render/denoise/free lifecycle for one image.
#[derive(Debug)]
pub struct TileManager {
    config: TileManagerConfig,
    params: BufferParams,
    num_samples: i32,
    schedule_denoising: bool,
    range_start_sample: i32,
    range_num_samples: i32,

    // Progression state, rebuilt by `reset`.
    sample: i32,
    step_samples: i32,
    resolution_divider: i32,
    total_pixel_samples: u64,
    buffer: BufferParams,
    global_buffers: Option<BufferHandle>,

    // Grid state, rebuilt on every progression step.
    tiles: Vec<Tile>,
    tile_stride: i32,
    grid_rows: i32,
    num_tiles: usize,
    num_rendered_tiles: usize,
    render_tiles: Vec<VecDeque<u32>>,
    denoise_tiles: Vec<VecDeque<u32>>,
}

impl TileManager {
    /// Creates a manager and resets it to an empty image.
    ///
    /// Rejects non-positive tile sizes, and the Hilbert spiral order in
    /// combination with sliced (non-background) device assignment.
    pub fn new(config: TileManagerConfig) -> SchedResult<Self> {
        if config.tile_size.x <= 0 || config.tile_size.y <= 0 {
            return Err(
                kiln_core::Error::invalid_tile_size(config.tile_size.x, config.tile_size.y).into(),
            );
        }
        if config.tile_order == TileOrder::HilbertSpiral && !config.background {
            return Err(SchedError::InvalidOrder {
                order: config.tile_order,
            });
        }

        let num_samples = config.num_samples;
        let mut manager = Self {
            config,
            params: BufferParams::default(),
            num_samples: 0,
            schedule_denoising: false,
            range_start_sample: 0,
            range_num_samples: -1,
            sample: 0,
            step_samples: 0,
            resolution_divider: 1,
            total_pixel_samples: 0,
            buffer: BufferParams::default(),
            global_buffers: None,
            tiles: Vec::new(),
            tile_stride: 0,
            grid_rows: 0,
            num_tiles: 0,
            num_rendered_tiles: 0,
            render_tiles: Vec::new(),
            denoise_tiles: Vec::new(),
        };
        manager.reset(BufferParams::default(), num_samples);
        Ok(manager)
    }

    /// Resets the progression for a new image window.
    pub fn reset(&mut self, params: BufferParams, num_samples: i32) {
        self.params = params;
        self.set_samples(num_samples);

        self.buffer = BufferParams::default();
        self.global_buffers = None;
        self.sample = self.range_start_sample - 1;
        self.step_samples = 0;
        self.resolution_divider =
            initial_divider(params.width, params.height, self.config.start_resolution);
        self.num_tiles = 0;
        self.num_rendered_tiles = 0;
        self.tiles.clear();
        self.render_tiles.clear();
        self.denoise_tiles.clear();

        debug!(
            width = params.width,
            height = params.height,
            num_samples,
            resolution_divider = self.resolution_divider,
            "tile manager reset"
        );
    }

    /// Updates the sample count and the total-progress accounting.
    pub fn set_samples(&mut self, num_samples: i32) {
        self.num_samples = num_samples;

        if num_samples == i32::MAX {
            // No meaningful progress total with unlimited samples.
            self.total_pixel_samples = 0;
            return;
        }

        let area = self.params.width.max(0) as u64 * self.params.height.max(0) as u64;
        if self.config.only_denoise {
            self.total_pixel_samples = area;
            return;
        }

        let preview = preview_pixel_samples(
            self.params.width,
            self.params.height,
            self.config.start_resolution,
        );
        let effective = self.get_num_effective_samples().max(0) as u64;
        self.total_pixel_samples = preview + effective * area;
        if self.schedule_denoising {
            self.total_pixel_samples += area;
        }
    }

    /// Restricts rendering to `count` samples starting at `start`.
    ///
    /// A count of -1 renders the full sample range.
    pub fn set_sample_range(&mut self, start: i32, count: i32) {
        self.range_start_sample = start;
        self.range_num_samples = count;
    }

    /// Switches the traversal order for subsequently generated grids.
    pub fn set_tile_order(&mut self, tile_order: TileOrder) {
        self.config.tile_order = tile_order;
    }

    /// Enables denoise scheduling: rendered tiles wait for their
    /// neighborhood and then pass through the denoise queues, with each
    /// tile owning its buffers.
    ///
    /// Takes effect at the next grid generation.
    pub fn set_schedule_denoising(&mut self, schedule: bool) {
        self.schedule_denoising = schedule;
    }

    /// Attaches the shared frame buffer that non-owning tiles reference.
    pub fn set_global_buffers(&mut self, buffers: Option<BufferHandle>) {
        self.global_buffers = buffers;
    }

    /// Number of samples rendering will actually produce: the sample
    /// range if one is set, and always 1 in only-denoise mode (downstream
    /// sample scaling relies on that constant).
    pub fn get_num_effective_samples(&self) -> i32 {
        if self.config.only_denoise {
            return 1;
        }
        if self.range_num_samples == -1 {
            self.num_samples
        } else {
            self.range_num_samples
        }
    }

    /// True once the final resolution has been reached and every sample
    /// in the range is covered by the current step.
    pub fn done(&self) -> bool {
        let end_sample = if self.range_num_samples == -1 {
            self.num_samples
        } else {
            self.range_start_sample + self.range_num_samples
        };
        self.resolution_divider == 1 && self.sample + self.step_samples >= end_sample
    }

    /// Advances to the next progression step and regenerates the grid.
    ///
    /// Returns `Ok(false)` once the image is complete. Preview steps
    /// halve the resolution divider with a single sample each; the final
    /// steps render at full resolution.
    pub fn next(&mut self) -> SchedResult<bool> {
        if self.done() {
            return Ok(false);
        }

        if self.config.progressive && self.resolution_divider > 1 {
            self.sample = 0;
            self.resolution_divider /= 2;
            self.step_samples = 1;
        } else {
            self.sample += 1;
            self.step_samples = if self.config.progressive {
                1
            } else if self.range_num_samples == -1 {
                self.num_samples
            } else {
                self.range_num_samples
            };
            self.resolution_divider = 1;
        }

        self.set_tiles()?;

        debug!(
            sample = self.sample,
            step_samples = self.step_samples,
            resolution_divider = self.resolution_divider,
            num_tiles = self.num_tiles,
            "progression step"
        );
        Ok(true)
    }

    /// Regenerates the tile grid at the current resolution.
    fn set_tiles(&mut self) -> SchedResult<()> {
        let resolution = self.resolution_divider;
        let image_w = (self.params.width / resolution).max(1);
        let image_h = (self.params.height / resolution).max(1);

        let generated = gen_tiles(&GenInput {
            image_w,
            image_h,
            tile_size: self.config.tile_size,
            num_devices: self.config.num_devices,
            preserve_tile_device: self.config.preserve_tile_device,
            sliced: !self.config.background,
            tile_order: self.config.tile_order,
            only_denoise: self.config.only_denoise,
            schedule_denoising: self.schedule_denoising,
            pass_stride: self.params.pass_stride,
            global_buffers: self.global_buffers.as_ref(),
        })?;

        self.tiles = generated.tiles;
        self.tile_stride = generated.tile_stride;
        self.grid_rows = generated.grid_rows;
        self.render_tiles = generated.render;
        self.denoise_tiles = generated.denoise;
        self.num_tiles = self.tiles.len();
        self.num_rendered_tiles = 0;
        self.buffer = self.params.scaled(resolution);
        Ok(())
    }

    /// Hands out the next tile for a device: pending denoise work first,
    /// then pending render work. Returns `None` when both queues are
    /// empty.
    pub fn next_tile(&mut self, device: i32) -> Option<&Tile> {
        let logical = if self.config.preserve_tile_device {
            device.max(0) as usize
        } else {
            0
        };
        if logical >= self.render_tiles.len() {
            return None;
        }

        if let Some(idx) = self.denoise_tiles[logical].pop_front() {
            if self.config.only_denoise {
                self.num_rendered_tiles += 1;
            }
            trace!(tile = idx, device, "acquired denoise tile");
            return self.tiles.get(idx as usize);
        }

        let idx = self.render_tiles[logical].pop_front()?;
        self.num_rendered_tiles += 1;
        trace!(tile = idx, device, "acquired render tile");
        self.tiles.get(idx as usize)
    }

    /// Reports a tile as finished and advances its lifecycle.
    ///
    /// A returned render tile either completes outright (no denoise
    /// scheduling) or becomes `Rendered` and promotes every 3x3 neighbor
    /// whose own neighborhood is fully rendered into the denoise queues.
    /// A returned denoise tile becomes `Denoised` and drives the same
    /// promotion toward `Done`, freeing neighbor buffers as they finish;
    /// the tile itself is flagged for deletion instead so the caller can
    /// write it back first.
    pub fn return_tile(&mut self, index: u32) -> SchedResult<TileResolution> {
        let i = index as usize;
        if i >= self.tiles.len() {
            return Err(SchedError::UnknownTile {
                index,
                num_tiles: self.tiles.len(),
            });
        }

        match self.tiles[i].state {
            TileState::Render => {
                if self.config.only_denoise {
                    return Err(SchedError::StateViolation {
                        index,
                        state: TileState::Render,
                    });
                }
                if !self.schedule_denoising {
                    self.tiles[i].state = TileState::Done;
                    return Ok(TileResolution {
                        writeback: true,
                        delete: true,
                    });
                }

                self.tiles[i].state = TileState::Rendered;
                // A freshly rendered tile may unblock itself or any
                // neighbor whose whole window is now rendered.
                for n in 0..9 {
                    let Some(nindex) = self.neighbor_index(i, n) else {
                        continue;
                    };
                    if self.tiles[nindex].state != TileState::Rendered {
                        continue;
                    }
                    if self.neighborhood_at_least(nindex, TileState::Rendered) {
                        self.tiles[nindex].state = TileState::Denoise;
                        let device = self.tiles[nindex].device as usize;
                        self.denoise_tiles[device].push_back(nindex as u32);
                        trace!(tile = nindex, "tile ready for denoising");
                    }
                }
                Ok(TileResolution {
                    writeback: false,
                    delete: false,
                })
            }
            TileState::Denoise => {
                if self.config.only_denoise {
                    self.tiles[i].state = TileState::Done;
                    return Ok(TileResolution {
                        writeback: true,
                        delete: false,
                    });
                }

                self.tiles[i].state = TileState::Denoised;
                let mut delete_self = false;
                for n in 0..9 {
                    let Some(nindex) = self.neighbor_index(i, n) else {
                        continue;
                    };
                    if self.tiles[nindex].state != TileState::Denoised {
                        continue;
                    }
                    if self.neighborhood_at_least(nindex, TileState::Denoised) {
                        self.tiles[nindex].state = TileState::Done;
                        if n == 8 {
                            // The tile itself can finish here, but it still
                            // has to be written back before its buffers go
                            // away; defer the free to the caller.
                            delete_self = true;
                        } else {
                            self.tiles[nindex].buffers = None;
                            trace!(tile = nindex, "neighbor buffers released");
                        }
                    }
                }
                Ok(TileResolution {
                    writeback: true,
                    delete: delete_self,
                })
            }
            state => Err(SchedError::StateViolation { index, state }),
        }
    }

    /// Releases the buffers of a tile the caller finished writing back.
    pub fn release_tile_buffers(&mut self, index: u32) {
        if let Some(tile) = self.tiles.get_mut(index as usize) {
            tile.buffers = None;
        }
    }

    /// Releases every tile-owned buffer (denoise-scheduling mode).
    pub fn free_device(&mut self) {
        if self.schedule_denoising {
            for tile in &mut self.tiles {
                tile.buffers = None;
            }
        }
    }

    /// Grid index of the `n`-th window cell around tile `i`, if it exists.
    fn neighbor_index(&self, i: usize, n: usize) -> Option<usize> {
        let nx = self.tiles[i].x / self.config.tile_size.x + NEIGHBOR_DX[n];
        let ny = self.tiles[i].y / self.config.tile_size.y + NEIGHBOR_DY[n];
        if nx < 0 || ny < 0 || nx >= self.tile_stride || ny >= self.grid_rows {
            return None;
        }
        Some((ny * self.tile_stride + nx) as usize)
    }

    /// True if every existing neighbor of tile `j` (excluding `j` itself)
    /// has reached at least `floor`.
    fn neighborhood_at_least(&self, j: usize, floor: TileState) -> bool {
        for nn in 0..8 {
            let Some(k) = self.neighbor_index(j, nn) else {
                continue;
            };
            if self.tiles[k].state < floor {
                return false;
            }
        }
        true
    }

    /// The tiles of the current grid.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// A tile by grid index.
    pub fn tile(&self, index: u32) -> Option<&Tile> {
        self.tiles.get(index as usize)
    }

    /// Number of tiles in the current grid.
    pub fn num_tiles(&self) -> usize {
        self.num_tiles
    }

    /// Tiles handed out so far in the current step.
    pub fn num_rendered_tiles(&self) -> usize {
        self.num_rendered_tiles
    }

    /// Tiles currently waiting in the render and denoise queues.
    pub fn num_queued_tiles(&self) -> usize {
        let render: usize = self.render_tiles.iter().map(|q| q.len()).sum();
        let denoise: usize = self.denoise_tiles.iter().map(|q| q.len()).sum();
        render + denoise
    }

    /// The current resolution divider (1 at full resolution).
    pub fn resolution_divider(&self) -> i32 {
        self.resolution_divider
    }

    /// The sample index of the current step.
    pub fn sample(&self) -> i32 {
        self.sample
    }

    /// Samples rendered by the current step.
    pub fn step_samples(&self) -> i32 {
        self.step_samples
    }

    /// Total pixel samples the whole progression will produce, for
    /// progress reporting. Zero with unlimited samples.
    pub fn total_pixel_samples(&self) -> u64 {
        self.total_pixel_samples
    }

    /// Geometry of the buffer for the current resolution.
    pub fn buffer_params(&self) -> &BufferParams {
        &self.buffer
    }
}
