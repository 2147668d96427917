//! Tile grid generation and device assignment.
//!
//! Generation runs once per progression step. It splits the image into a
//! grid of tiles, assigns every tile to a logical device and fills the
//! per-device queues in traversal order. Three assignment modes exist:
//!
//! - **uniform**: tiles are distributed evenly across devices and each
//!   device's queue is sorted by the traversal comparator;
//! - **sliced**: the image is cut into one horizontal slice per device
//!   (interactive viewports keep tiles pinned to the device that owns
//!   their slice buffer), queues stay in natural row-major order;
//! - **spiral**: square blocks of tiles are walked in an inward
//!   rectangular spiral, each block internally ordered by a Hilbert
//!   curve. Tiles are pushed to the queue front, so rendering proceeds
//!   from the image center outward.

use std::collections::VecDeque;
use std::sync::Arc;

use kiln_core::{BufferHandle, BufferParams, Int2, RenderBuffers, Tile, TileOrder, TileState};

use crate::error::{SchedError, SchedResult};
use crate::hilbert::{hilbert_index_to_pos, SpiralDirection};
use crate::order::tile_cmp;

/// Inputs for one generation pass.
pub(crate) struct GenInput<'a> {
    pub image_w: i32,
    pub image_h: i32,
    pub tile_size: Int2,
    pub num_devices: i32,
    pub preserve_tile_device: bool,
    pub sliced: bool,
    pub tile_order: TileOrder,
    pub only_denoise: bool,
    pub schedule_denoising: bool,
    pub pass_stride: i32,
    pub global_buffers: Option<&'a BufferHandle>,
}

/// A generated tile grid with its per-device queues.
#[derive(Debug)]
pub(crate) struct GeneratedTiles {
    pub tiles: Vec<Tile>,
    /// Tiles per grid row
    pub tile_stride: i32,
    /// Grid rows
    pub grid_rows: i32,
    pub render: Vec<VecDeque<u32>>,
    pub denoise: Vec<VecDeque<u32>>,
}

impl GeneratedTiles {
    fn empty() -> Self {
        Self {
            tiles: Vec::new(),
            tile_stride: 0,
            grid_rows: 0,
            render: Vec::new(),
            denoise: Vec::new(),
        }
    }
}

/// Number of tiles needed to cover `image` pixels with `tile`-sized steps.
fn tiles_for(image: i32, tile: i32) -> i32 {
    if tile >= image {
        1
    } else {
        (image + tile - 1) / tile
    }
}

/// Generates the tile grid and per-device queues.
///
/// A non-positive image dimension yields an empty grid; a non-positive
/// tile size is rejected.
pub(crate) fn gen_tiles(input: &GenInput<'_>) -> SchedResult<GeneratedTiles> {
    let ts = input.tile_size;
    if ts.x <= 0 || ts.y <= 0 {
        return Err(kiln_core::Error::invalid_tile_size(ts.x, ts.y).into());
    }
    if input.sliced && input.tile_order == TileOrder::HilbertSpiral {
        return Err(SchedError::InvalidOrder {
            order: input.tile_order,
        });
    }
    if input.image_w <= 0 || input.image_h <= 0 {
        return Ok(GeneratedTiles::empty());
    }

    let num_logical = if input.preserve_tile_device {
        input.num_devices.max(1)
    } else {
        1
    };
    let num = input.image_h.min(num_logical) as usize;

    let tile_w = tiles_for(input.image_w, ts.x);
    let tile_h = tiles_for(input.image_h, ts.y);

    if input.tile_order == TileOrder::HilbertSpiral {
        gen_spiral(input, tile_w, tile_h, num)
    } else if input.sliced {
        gen_sliced(input, tile_w, num)
    } else {
        gen_uniform(input, tile_w, tile_h, num)
    }
}

/// Builds one tile, allocating its own buffer in denoise-scheduling mode
/// and referencing the shared frame buffer otherwise.
fn make_tile(
    input: &GenInput<'_>,
    index: u32,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    device: u16,
) -> SchedResult<Tile> {
    let state = if input.only_denoise {
        TileState::Denoise
    } else {
        TileState::Render
    };
    let mut tile = Tile::new(index, x, y, w, h, device, state);
    tile.buffers = if input.schedule_denoising {
        let params = BufferParams {
            width: w,
            height: h,
            full_x: x,
            full_y: y,
            full_width: input.image_w,
            full_height: input.image_h,
            pass_stride: input.pass_stride,
        };
        Some(Arc::new(RenderBuffers::new(params)?))
    } else {
        input.global_buffers.cloned()
    };
    Ok(tile)
}

/// Routes the generated queues into the render or denoise side.
fn assemble(
    input: &GenInput<'_>,
    tiles: Vec<Tile>,
    tile_stride: i32,
    grid_rows: i32,
    queues: Vec<VecDeque<u32>>,
    num: usize,
) -> GeneratedTiles {
    let empty = vec![VecDeque::new(); num];
    if input.only_denoise {
        GeneratedTiles {
            tiles,
            tile_stride,
            grid_rows,
            render: empty,
            denoise: queues,
        }
    } else {
        GeneratedTiles {
            tiles,
            tile_stride,
            grid_rows,
            render: queues,
            denoise: empty,
        }
    }
}

/// Even distribution across devices, sorted per device by traversal order.
fn gen_uniform(
    input: &GenInput<'_>,
    tile_w: i32,
    tile_h: i32,
    num: usize,
) -> SchedResult<GeneratedTiles> {
    let ts = input.tile_size;
    let total = (tile_w * tile_h) as usize;
    let tiles_per_device = total.div_ceil(num);
    let center = Int2::new(input.image_w / 2, input.image_h / 2);

    let mut tiles = vec![Tile::default(); total];
    let mut queues: Vec<VecDeque<u32>> = vec![VecDeque::new(); num];

    let mut cur_device = 0usize;
    let mut cur_tiles = 0usize;
    for tile_y in 0..tile_h {
        for tile_x in 0..tile_w {
            let x = tile_x * ts.x;
            let y = tile_y * ts.y;
            let w = if tile_x == tile_w - 1 {
                input.image_w - x
            } else {
                ts.x
            };
            let h = if tile_y == tile_h - 1 {
                input.image_h - y
            } else {
                ts.y
            };
            let idx = (tile_y * tile_w + tile_x) as u32;
            tiles[idx as usize] = make_tile(input, idx, x, y, w, h, cur_device as u16)?;
            queues[cur_device].push_back(idx);

            cur_tiles += 1;
            if cur_tiles == tiles_per_device {
                cur_device += 1;
                cur_tiles = 0;
            }
        }
    }

    // Generation already runs bottom-to-top; every other order re-sorts.
    if input.tile_order != TileOrder::BottomToTop {
        for queue in &mut queues {
            let mut indices: Vec<u32> = queue.iter().copied().collect();
            indices.sort_by(|&a, &b| tile_cmp(input.tile_order, center, &tiles, a, b));
            *queue = indices.into();
        }
    }

    Ok(assemble(input, tiles, tile_w, tile_h, queues, num))
}

/// One horizontal slice per device; slice heights need not align to tile
/// boundaries, so grid rows accumulate across slices.
fn gen_sliced(input: &GenInput<'_>, tile_w: i32, num: usize) -> SchedResult<GeneratedTiles> {
    let ts = input.tile_size;
    let slice_num = num as i32;
    let base_h = input.image_h / slice_num;

    let mut slices = Vec::with_capacity(num);
    let mut total_rows = 0;
    for slice in 0..slice_num {
        let slice_h = if slice == slice_num - 1 {
            input.image_h - slice * base_h
        } else {
            base_h
        };
        let rows = tiles_for(slice_h, ts.y);
        slices.push((slice_h, rows));
        total_rows += rows;
    }

    let mut tiles = vec![Tile::default(); (tile_w * total_rows) as usize];
    let mut queues: Vec<VecDeque<u32>> = vec![VecDeque::new(); num];

    let mut row_base = 0;
    for (slice, &(slice_h, rows)) in slices.iter().enumerate() {
        let slice_y = base_h * slice as i32;
        for tile_y in 0..rows {
            for tile_x in 0..tile_w {
                let x = tile_x * ts.x;
                let y = tile_y * ts.y;
                let w = if tile_x == tile_w - 1 {
                    input.image_w - x
                } else {
                    ts.x
                };
                let h = if tile_y == rows - 1 { slice_h - y } else { ts.y };
                let idx = ((row_base + tile_y) * tile_w + tile_x) as u32;
                tiles[idx as usize] =
                    make_tile(input, idx, x, y + slice_y, w, h, slice as u16)?;
                queues[slice].push_back(idx);
            }
        }
        row_base += rows;
    }

    Ok(assemble(input, tiles, tile_w, total_rows, queues, num))
}

/// Inward block spiral with Hilbert-ordered tiles inside each block.
fn gen_spiral(
    input: &GenInput<'_>,
    tile_w: i32,
    tile_h: i32,
    num: usize,
) -> SchedResult<GeneratedTiles> {
    let ts = input.tile_size;
    // Size of blocks in tiles, must be a power of 2.
    let hilbert_size = if ts.max_element() <= 12 { 8 } else { 4 };

    let total = (tile_w * tile_h) as usize;
    let tiles_per_device = total.div_ceil(num);
    let mut cur_device = 0usize;
    let mut cur_tiles = 0usize;

    let block_size = ts * hilbert_size;
    // Number of blocks to fill the image; side length must be odd so the
    // spiral has a center block.
    let blocks_x = tiles_for(input.image_w, block_size.x);
    let blocks_y = tiles_for(input.image_h, block_size.y);
    let n = blocks_x.max(blocks_y) | 1;
    // Offset to keep the spiral centered, rounded to a tile boundary.
    let mut offset = Int2::new(
        (input.image_w - n * block_size.x) / 2,
        (input.image_h - n * block_size.y) / 2,
    );
    offset = offset / ts * ts;

    let mut tiles = vec![Tile::default(); total];
    let mut queues: Vec<VecDeque<u32>> = vec![VecDeque::new(); num];

    let mut block = Int2::new(0, 0);
    let mut prev_dir = SpiralDirection::Up;
    let mut dir = SpiralDirection::Up;
    let mut i = 0;
    loop {
        // Generate the tiles in the current block.
        for hilbert_index in 0..hilbert_size * hilbert_size {
            let hp = hilbert_index_to_pos(hilbert_size, hilbert_index);
            // Rotate the block according to spiral direction so that
            // successive blocks join smoothly.
            let tile_pos = if prev_dir == SpiralDirection::Up && dir == SpiralDirection::Up {
                Int2::new(hp.y, hp.x)
            } else if dir == SpiralDirection::Left || prev_dir == SpiralDirection::Left {
                hp
            } else if dir == SpiralDirection::Down {
                Int2::new(hilbert_size - 1 - hp.y, hilbert_size - 1 - hp.x)
            } else {
                Int2::new(hilbert_size - 1 - hp.x, hilbert_size - 1 - hp.y)
            };

            let pos = block * block_size + tile_pos * ts + offset;
            // The spiral is always square, so tiles outside the image get
            // generated; skip them.
            if pos.x >= 0 && pos.y >= 0 && pos.x < input.image_w && pos.y < input.image_h {
                let w = ts.x.min(input.image_w - pos.x);
                let h = ts.y.min(input.image_h - pos.y);
                let ip = pos / ts;
                let idx = (ip.y * tile_w + ip.x) as u32;
                tiles[idx as usize] =
                    make_tile(input, idx, pos.x, pos.y, w, h, cur_device as u16)?;
                debug_assert!(cur_device < num);
                queues[cur_device].push_front(idx);

                cur_tiles += 1;
                if cur_tiles == tiles_per_device {
                    cur_device += 1;
                    cur_tiles = 0;
                }
            }
        }

        // Stop as soon as the spiral has reached the center block.
        if block.x == (n - 1) / 2 && block.y == (n - 1) / 2 {
            break;
        }

        // Advance to the next block.
        prev_dir = dir;
        match dir {
            SpiralDirection::Up => {
                block.y += 1;
                if block.y == n - i - 1 {
                    dir = SpiralDirection::Left;
                }
            }
            SpiralDirection::Left => {
                block.x += 1;
                if block.x == n - i - 1 {
                    dir = SpiralDirection::Down;
                }
            }
            SpiralDirection::Down => {
                block.y -= 1;
                if block.y == i {
                    dir = SpiralDirection::Right;
                }
            }
            SpiralDirection::Right => {
                block.x -= 1;
                if block.x == i + 1 {
                    dir = SpiralDirection::Up;
                    i += 1;
                }
            }
        }
    }

    Ok(assemble(input, tiles, tile_w, tile_h, queues, num))
}
