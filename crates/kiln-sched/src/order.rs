//! Tile traversal comparators.
//!
//! Each per-device queue is sorted once after generation; the comparator
//! induces a strict weak ordering for every [`TileOrder`], with ties broken
//! on the orthogonal axis so the sort is deterministic.

use std::cmp::Ordering;

use kiln_core::{Int2, Tile, TileOrder};

/// Compares two tiles (by grid-array index) under a traversal order.
///
/// `center` is the image center in pixels, used by [`TileOrder::Center`].
/// The Hilbert spiral never sorts; comparing under it is a programming
/// error.
pub(crate) fn tile_cmp(order: TileOrder, center: Int2, tiles: &[Tile], a: u32, b: u32) -> Ordering {
    let ta = &tiles[a as usize];
    let tb = &tiles[b as usize];
    match order {
        TileOrder::Center => {
            let da = center_distance_sq(center, ta);
            let db = center_distance_sq(center, tb);
            da.cmp(&db)
        }
        TileOrder::LeftToRight => (ta.x, ta.y).cmp(&(tb.x, tb.y)),
        TileOrder::RightToLeft => (tb.x, ta.y).cmp(&(ta.x, tb.y)),
        TileOrder::TopToBottom => (tb.y, ta.x).cmp(&(ta.y, tb.x)),
        TileOrder::BottomToTop => (ta.y, ta.x).cmp(&(tb.y, tb.x)),
        TileOrder::HilbertSpiral => {
            debug_assert!(false, "hilbert spiral queues are never sorted");
            Ordering::Equal
        }
    }
}

/// Squared distance from the tile center to the image center.
fn center_distance_sq(center: Int2, tile: &Tile) -> i64 {
    let dx = (center.x - (tile.x + tile.w / 2)) as i64;
    let dy = (center.y - (tile.y + tile.h / 2)) as i64;
    dx * dx + dy * dy
}
