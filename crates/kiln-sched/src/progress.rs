//! Progressive-resolution math.
//!
//! Interactive sessions start at a reduced resolution and halve the
//! divider on every step until the image renders at full size. The
//! helpers here compute the starting divider and the extra pixel samples
//! those preview steps contribute to progress totals.

/// The resolution divider to start from: both dimensions are halved until
/// the pixel count fits within `start_resolution` squared.
///
/// `i32::MAX` disables preview scaling entirely.
pub(crate) fn initial_divider(width: i32, height: i32, start_resolution: i32) -> i32 {
    let mut divider = 1;
    if start_resolution != i32::MAX {
        let mut w = width;
        let mut h = height;
        while w as i64 * h as i64 > start_resolution as i64 * start_resolution as i64 {
            if w <= 1 && h <= 1 {
                break;
            }
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            divider <<= 1;
        }
    }
    divider
}

/// Pixel samples rendered by the preview steps before full resolution:
/// one pass of the downscaled image for every divider between the initial
/// one (exclusive) and one (exclusive).
pub(crate) fn preview_pixel_samples(width: i32, height: i32, start_resolution: i32) -> u64 {
    let mut divider = initial_divider(width, height, start_resolution) / 2;
    let mut pixel_samples = 0u64;
    while divider > 1 {
        let w = (width / divider).max(1) as u64;
        let h = (height / divider).max(1) as u64;
        pixel_samples += w * h;
        divider >>= 1;
    }
    pixel_samples
}
