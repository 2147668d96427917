//! Tile value types: lifecycle state, traversal order and the tile itself.

use crate::buffer::BufferHandle;

/// Lifecycle state of a tile.
///
/// States are ordered; the scheduler's neighbor gating compares them with
/// `>=`, so the declaration order is load-bearing.
///
/// - `Render`: the tile has to be rendered.
/// - `Rendered`: rendered, but can't be denoised yet (waiting for neighbors).
/// - `Denoise`: the tile can be denoised now.
/// - `Denoised`: denoised, but can't be freed yet (waiting for neighbors).
/// - `Done`: the tile is finished and its buffers have been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TileState {
    /// Waiting to be rendered
    Render = 0,
    /// Rendered, waiting for neighbors before denoising
    Rendered,
    /// Ready to be denoised
    Denoise,
    /// Denoised, waiting for neighbors before freeing
    Denoised,
    /// Finished and freed
    Done,
}

/// Traversal order for handing tiles to devices.
///
/// The numeric identifiers are persisted in render configurations and must
/// not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "i32", try_from = "i32")
)]
#[repr(i32)]
pub enum TileOrder {
    /// Closest to the image center first
    Center = 0,
    /// Increasing x, ties by increasing y
    LeftToRight = 1,
    /// Decreasing x, ties by increasing y
    RightToLeft = 2,
    /// Decreasing y, ties by increasing x
    TopToBottom = 3,
    /// Increasing y, ties by increasing x
    BottomToTop = 4,
    /// Inward block spiral, Hilbert curve within each block
    HilbertSpiral = 5,
}

impl From<TileOrder> for i32 {
    #[inline]
    fn from(order: TileOrder) -> i32 {
        order as i32
    }
}

impl TryFrom<i32> for TileOrder {
    type Error = crate::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TileOrder::Center),
            1 => Ok(TileOrder::LeftToRight),
            2 => Ok(TileOrder::RightToLeft),
            3 => Ok(TileOrder::TopToBottom),
            4 => Ok(TileOrder::BottomToTop),
            5 => Ok(TileOrder::HilbertSpiral),
            _ => Err(crate::Error::UnknownTileOrder { value }),
        }
    }
}

/// A rectangular subregion of the image, the unit of work assignment.
///
/// `(x, y)` is in image-space pixel coordinates at the current resolution;
/// tiles at the image edges may be smaller than the nominal tile size.
/// `buffers` is the tile-owned render buffer when the scheduler runs in
/// denoise-scheduling mode, or a reference to the shared frame buffer
/// otherwise.
#[derive(Debug, Clone, Default)]
pub struct Tile {
    /// Position in the tile grid's flat array
    pub index: u32,
    /// Left edge in pixels
    pub x: i32,
    /// Top edge in pixels
    pub y: i32,
    /// Width in pixels
    pub w: i32,
    /// Height in pixels
    pub h: i32,
    /// Logical device this tile is assigned to
    pub device: u16,
    /// Lifecycle state
    pub state: TileState,
    /// Render buffers backing this tile, if any
    pub buffers: Option<BufferHandle>,
}

impl Default for TileState {
    fn default() -> Self {
        TileState::Render
    }
}

impl Tile {
    /// Creates a tile in the given initial state with no buffers attached.
    pub fn new(index: u32, x: i32, y: i32, w: i32, h: i32, device: u16, state: TileState) -> Self {
        Self {
            index,
            x,
            y,
            w,
            h,
            device,
            state,
            buffers: None,
        }
    }
}
