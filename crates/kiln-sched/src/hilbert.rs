//! Hilbert curve indexing for spiral traversal blocks.

use kiln_core::Int2;

/// Direction the block spiral is currently moving in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpiralDirection {
    Up,
    Left,
    Down,
    Right,
}

/// Maps a Hilbert curve index to its (x, y) position on an `n * n` grid.
///
/// `n` must be a power of two. Successive indices are always
/// edge-adjacent, which keeps consecutive tiles of a block spatially
/// coherent.
pub(crate) fn hilbert_index_to_pos(n: i32, d: i32) -> Int2 {
    let mut xy = Int2::new(0, 0);
    let mut d = d;
    let mut s = 1;
    while s < n {
        let rx = (d >> 1) & 1;
        let ry = (d ^ rx) & 1;
        if ry == 0 {
            if rx == 1 {
                xy = Int2::splat(s - 1) - xy;
            }
            std::mem::swap(&mut xy.x, &mut xy.y);
        }
        xy = xy + Int2::new(rx * s, ry * s);
        d >>= 2;
        s *= 2;
    }
    xy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_two() {
        let positions: Vec<Int2> = (0..4).map(|d| hilbert_index_to_pos(2, d)).collect();
        assert_eq!(
            positions,
            vec![
                Int2::new(0, 0),
                Int2::new(0, 1),
                Int2::new(1, 1),
                Int2::new(1, 0),
            ]
        );
    }

    #[test]
    fn test_order_four() {
        let expected = [
            (0, 0),
            (1, 0),
            (1, 1),
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 3),
            (1, 2),
            (2, 2),
            (2, 3),
            (3, 3),
            (3, 2),
            (3, 1),
            (2, 1),
            (2, 0),
            (3, 0),
        ];
        for (d, &(x, y)) in expected.iter().enumerate() {
            assert_eq!(hilbert_index_to_pos(4, d as i32), Int2::new(x, y), "index {}", d);
        }
    }

    #[test]
    fn test_covers_grid_with_unit_steps() {
        for n in [2, 4, 8] {
            let mut seen = vec![false; (n * n) as usize];
            let mut prev: Option<Int2> = None;
            for d in 0..n * n {
                let p = hilbert_index_to_pos(n, d);
                assert!(p.x >= 0 && p.x < n && p.y >= 0 && p.y < n);
                let cell = (p.y * n + p.x) as usize;
                assert!(!seen[cell], "cell visited twice at index {}", d);
                seen[cell] = true;
                if let Some(q) = prev {
                    let step = (p.x - q.x).abs() + (p.y - q.y).abs();
                    assert_eq!(step, 1, "non-adjacent step at index {}", d);
                }
                prev = Some(p);
            }
            assert!(seen.iter().all(|&v| v));
        }
    }
}
