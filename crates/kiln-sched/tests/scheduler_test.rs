//! End-to-end scheduling scenarios for kiln-sched.

use kiln_core::{BufferParams, Int2, TileOrder, TileState};
use kiln_sched::{SchedError, TileManager, TileManagerConfig};

// Deterministic pseudo-random values for interleaving tests.
struct Lcg(u64);

impl Lcg {
    fn next_usize(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

fn params(width: i32, height: i32) -> BufferParams {
    BufferParams::new(width, height, 1)
}

fn manager(config: TileManagerConfig, width: i32, height: i32, samples: i32) -> TileManager {
    let mut m = TileManager::new(config).unwrap();
    m.reset(params(width, height), samples);
    m
}

/// Checks the queue accounting invariant at a quiescent point: queued
/// tiles plus tiles past their queue state account for the whole grid.
fn assert_queue_invariant(m: &TileManager) {
    let advanced = m
        .tiles()
        .iter()
        .filter(|t| t.state != TileState::Render && t.state != TileState::Denoise)
        .count();
    assert_eq!(m.num_queued_tiles() + advanced, m.num_tiles());
}

#[test]
fn test_left_to_right_small_grid() {
    // 64x48 with 16x16 tiles: 4x3 grid on a single device.
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(16),
            tile_order: TileOrder::LeftToRight,
            background: true,
            ..TileManagerConfig::default()
        },
        64,
        48,
        1,
    );
    assert!(m.next().unwrap());
    assert_eq!(m.num_tiles(), 12);

    let mut order = Vec::new();
    while let Some(tile) = m.next_tile(0) {
        order.push((tile.x, tile.y, tile.index));
    }
    assert_eq!(order.len(), 12);
    // Increasing x, then increasing y within each column.
    let expected: Vec<(i32, i32)> = (0..4)
        .flat_map(|cx| (0..3).map(move |cy| (cx * 16, cy * 16)))
        .collect();
    let got: Vec<(i32, i32)> = order.iter().map(|&(x, y, _)| (x, y)).collect();
    assert_eq!(got, expected);

    for &(_, _, index) in &order {
        let res = m.return_tile(index).unwrap();
        assert!(res.writeback);
        assert!(res.delete);
    }
    assert!(m.tiles().iter().all(|t| t.state == TileState::Done));
    assert!(!m.next().unwrap());
}

#[test]
fn test_sliced_two_devices() {
    // 100x60 sliced across two devices: each owns a 30px slice, tiles in
    // natural row-major order with no re-sorting.
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(32),
            tile_order: TileOrder::BottomToTop,
            background: false,
            preserve_tile_device: true,
            num_devices: 2,
            ..TileManagerConfig::default()
        },
        100,
        60,
        1,
    );
    assert!(m.next().unwrap());

    let mut device0 = Vec::new();
    while let Some(tile) = m.next_tile(0) {
        assert_eq!(tile.device, 0);
        assert!(tile.y >= 0 && tile.y + tile.h <= 30);
        device0.push((tile.x, tile.y));
    }
    let mut device1 = Vec::new();
    while let Some(tile) = m.next_tile(1) {
        assert_eq!(tile.device, 1);
        assert!(tile.y >= 30 && tile.y + tile.h <= 60);
        device1.push((tile.x, tile.y));
    }

    let natural: Vec<(i32, i32)> = vec![(0, 0), (32, 0), (64, 0), (96, 0)];
    assert_eq!(device0, natural);
    let shifted: Vec<(i32, i32)> = vec![(0, 30), (32, 30), (64, 30), (96, 30)];
    assert_eq!(device1, shifted);
}

#[test]
fn test_hilbert_spiral_renders_center_first() {
    // 256x256 with 32x32 tiles: 8x8 grid, 3x3 spiral blocks of 4x4 tiles
    // centered on the image.
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(32),
            tile_order: TileOrder::HilbertSpiral,
            background: true,
            ..TileManagerConfig::default()
        },
        256,
        256,
        1,
    );
    assert!(m.next().unwrap());
    assert_eq!(m.num_tiles(), 64);

    let mut popped = Vec::new();
    while let Some(tile) = m.next_tile(0) {
        popped.push((tile.x, tile.y));
    }
    assert_eq!(popped.len(), 64);

    // The queue is front-filled along the inward spiral, so the center
    // block [64, 192) renders first and the spiral entry block renders
    // last.
    let (first_x, first_y) = popped[0];
    assert!(
        (64..192).contains(&first_x) && (64..192).contains(&first_y),
        "first tile at ({first_x}, {first_y}) must be in the center block"
    );
    let (last_x, last_y) = *popped.last().unwrap();
    assert!(
        last_x < 64 && last_y < 64,
        "last tile at ({last_x}, {last_y}) must be in the spiral entry block"
    );

    // All 64 tiles handed out exactly once.
    let mut seen = vec![false; 64];
    for &(x, y) in &popped {
        let cell = (y / 32 * 8 + x / 32) as usize;
        assert!(!seen[cell]);
        seen[cell] = true;
    }
}

#[test]
fn test_hilbert_spiral_rejects_sliced_assignment() {
    let err = TileManager::new(TileManagerConfig {
        tile_order: TileOrder::HilbertSpiral,
        background: false,
        ..TileManagerConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, SchedError::InvalidOrder { .. }));
}

#[test]
fn test_denoise_gating_in_larger_grid() {
    // 5x5 grid; render the middle 3x3 patch. Only the patch center has a
    // fully rendered neighborhood, so only it may enter the denoise
    // queue; the patch corners and edges keep waiting.
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(16),
            tile_order: TileOrder::LeftToRight,
            background: true,
            ..TileManagerConfig::default()
        },
        80,
        80,
        1,
    );
    m.set_schedule_denoising(true);
    assert!(m.next().unwrap());
    assert_eq!(m.num_tiles(), 25);

    let center = 2 * 5 + 2;
    let res = m.return_tile(center).unwrap();
    assert!(!res.writeback && !res.delete);
    assert_eq!(m.tile(center).unwrap().state, TileState::Rendered);
    assert!(
        m.tiles().iter().all(|t| t.state != TileState::Denoise),
        "no denoise promotion while neighbors are missing"
    );

    let patch: Vec<u32> = [6, 7, 8, 11, 13, 16, 17, 18].to_vec();
    for &index in &patch {
        m.return_tile(index).unwrap();
    }

    assert_eq!(m.tile(center).unwrap().state, TileState::Denoise);
    for &index in &patch {
        assert_eq!(
            m.tile(index).unwrap().state,
            TileState::Rendered,
            "patch tile {index} must wait for its own neighborhood"
        );
    }
    // The promoted center is queued for its device.
    let next = m.next_tile(0).map(|t| t.index);
    assert_eq!(next, Some(center));
}

#[test]
fn test_full_pipeline_liveness() {
    // Drive a denoise-scheduled 3x3 grid to completion through the public
    // queue API only.
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(16),
            tile_order: TileOrder::LeftToRight,
            background: true,
            ..TileManagerConfig::default()
        },
        48,
        48,
        1,
    );
    m.set_schedule_denoising(true);
    assert!(m.next().unwrap());

    let mut returns = 0;
    while let Some(tile) = m.next_tile(0) {
        let index = tile.index;
        let res = m.return_tile(index).unwrap();
        if res.delete {
            m.release_tile_buffers(index);
        }
        returns += 1;
        assert_queue_invariant(&m);
        assert!(returns <= 18, "every tile passes each queue exactly once");
    }

    // 9 render returns + 9 denoise returns.
    assert_eq!(returns, 18);
    assert!(m.tiles().iter().all(|t| t.state == TileState::Done));
    assert!(m.tiles().iter().all(|t| t.buffers.is_none()));
}

#[test]
fn test_gating_safety_under_random_interleaving() {
    let mut rng = Lcg(0xfeed_beef);
    for round in 0..20 {
        let mut m = manager(
            TileManagerConfig {
                num_samples: 1,
                tile_size: Int2::splat(16),
                tile_order: TileOrder::LeftToRight,
                background: true,
                ..TileManagerConfig::default()
            },
            64,
            64,
            1,
        );
        m.set_schedule_denoising(true);
        assert!(m.next().unwrap());
        let total = m.num_tiles();
        assert_eq!(total, 16);

        // Acquire every render tile, then complete them in random order,
        // simulating devices finishing at arbitrary times.
        let mut in_flight = Vec::new();
        while let Some(tile) = m.next_tile(0) {
            in_flight.push(tile.index);
        }
        assert_eq!(in_flight.len(), total);
        while !in_flight.is_empty() {
            let pick = rng.next_usize(in_flight.len());
            let index = in_flight.swap_remove(pick);
            m.return_tile(index).unwrap();
            assert_gating(&m, round);
        }

        // Same for the denoise work the returns queued up.
        let mut in_flight = Vec::new();
        while let Some(tile) = m.next_tile(0) {
            in_flight.push(tile.index);
        }
        assert_eq!(in_flight.len(), total);
        while !in_flight.is_empty() {
            let pick = rng.next_usize(in_flight.len());
            let index = in_flight.swap_remove(pick);
            let res = m.return_tile(index).unwrap();
            if res.delete {
                m.release_tile_buffers(index);
            }
            assert_gating(&m, round);
        }
        assert!(m.tiles().iter().all(|t| t.state == TileState::Done));
    }
}

/// No tile may be at or past Denoise while a neighbor is below Rendered,
/// and none may be Done while a neighbor is below Denoised.
fn assert_gating(m: &TileManager, round: usize) {
    let tiles = m.tiles();
    let stride = 4i32;
    for tile in tiles {
        let cx = tile.x / 16;
        let cy = tile.y / 16;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (cx + dx, cy + dy);
                if nx < 0 || ny < 0 || nx >= stride || ny >= stride {
                    continue;
                }
                let neighbor = &tiles[(ny * stride + nx) as usize];
                if tile.state >= TileState::Denoise {
                    assert!(
                        neighbor.state >= TileState::Rendered,
                        "round {round}: tile {} denoising before neighbor {} rendered",
                        tile.index,
                        neighbor.index
                    );
                }
                if tile.state == TileState::Done {
                    assert!(
                        neighbor.state >= TileState::Denoised,
                        "round {round}: tile {} freed before neighbor {} denoised",
                        tile.index,
                        neighbor.index
                    );
                }
            }
        }
    }
}

#[test]
fn test_progressive_resolution_steps() {
    // 512x512 with a 64px start resolution: divider starts at 8 and
    // halves on every progressive step until full resolution.
    let mut m = manager(
        TileManagerConfig {
            progressive: true,
            num_samples: 2,
            tile_size: Int2::splat(64),
            start_resolution: 64,
            background: true,
            ..TileManagerConfig::default()
        },
        512,
        512,
        2,
    );
    assert_eq!(m.resolution_divider(), 8);

    let mut dividers = Vec::new();
    while m.next().unwrap() {
        dividers.push(m.resolution_divider());
    }
    assert_eq!(dividers, vec![4, 2, 1, 1]);

    // Monotonically non-increasing across the whole progression.
    for pair in dividers.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
    assert!(m.done());
}

#[test]
fn test_progressive_preview_uses_downscaled_grid() {
    let mut m = manager(
        TileManagerConfig {
            progressive: true,
            num_samples: 1,
            tile_size: Int2::splat(64),
            start_resolution: 128,
            background: true,
            ..TileManagerConfig::default()
        },
        512,
        512,
        1,
    );
    assert_eq!(m.resolution_divider(), 4);
    assert!(m.next().unwrap());
    // 512 / 2 = 256px preview: a 4x4 grid of 64px tiles.
    assert_eq!(m.resolution_divider(), 2);
    assert_eq!(m.num_tiles(), 16);
    assert_eq!(m.buffer_params().width, 256);
}

#[test]
fn test_total_pixel_samples_accounting() {
    let area = 512u64 * 512;

    // Preview passes at dividers 4 and 2, then 3 full-resolution samples.
    let mut m = manager(
        TileManagerConfig {
            progressive: true,
            num_samples: 3,
            tile_size: Int2::splat(64),
            start_resolution: 64,
            background: true,
            ..TileManagerConfig::default()
        },
        512,
        512,
        3,
    );
    let preview = 128u64 * 128 + 256 * 256;
    assert_eq!(m.total_pixel_samples(), preview + 3 * area);

    // Denoise scheduling adds one more pass over the image.
    m.set_schedule_denoising(true);
    m.set_samples(3);
    assert_eq!(m.total_pixel_samples(), preview + 4 * area);

    // Unlimited sampling has no meaningful total.
    m.set_samples(i32::MAX);
    assert_eq!(m.total_pixel_samples(), 0);
}

#[test]
fn test_only_denoise_mode() {
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(16),
            tile_order: TileOrder::LeftToRight,
            background: true,
            only_denoise: true,
            ..TileManagerConfig::default()
        },
        64,
        64,
        1,
    );
    assert_eq!(m.total_pixel_samples(), 64 * 64);
    assert_eq!(m.get_num_effective_samples(), 1);

    assert!(m.next().unwrap());
    assert!(m.tiles().iter().all(|t| t.state == TileState::Denoise));

    let mut handled = 0;
    while let Some(tile) = m.next_tile(0) {
        let index = tile.index;
        let res = m.return_tile(index).unwrap();
        assert!(res.writeback);
        assert!(!res.delete);
        handled += 1;
    }
    assert_eq!(handled, 16);
    assert_eq!(m.num_rendered_tiles(), 16);
    assert!(m.tiles().iter().all(|t| t.state == TileState::Done));
    assert!(!m.next().unwrap());
}

#[test]
fn test_sample_range() {
    let mut m = TileManager::new(TileManagerConfig {
        num_samples: 100,
        tile_size: Int2::splat(16),
        tile_order: TileOrder::LeftToRight,
        background: true,
        ..TileManagerConfig::default()
    })
    .unwrap();
    m.set_sample_range(10, 5);
    m.reset(params(32, 32), 100);

    assert_eq!(m.get_num_effective_samples(), 5);
    assert!(m.next().unwrap());
    assert_eq!(m.sample(), 10);
    assert_eq!(m.step_samples(), 5);
    assert!(!m.next().unwrap());
}

#[test]
fn test_return_tile_state_violations() {
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(16),
            tile_order: TileOrder::LeftToRight,
            background: true,
            ..TileManagerConfig::default()
        },
        32,
        32,
        1,
    );
    assert!(m.next().unwrap());

    // Out-of-range index.
    assert!(matches!(
        m.return_tile(99),
        Err(SchedError::UnknownTile { .. })
    ));

    // Returning a finished tile is corruption.
    m.return_tile(0).unwrap();
    assert!(matches!(
        m.return_tile(0),
        Err(SchedError::StateViolation { .. })
    ));
}

#[test]
fn test_regeneration_round_trip() {
    // Identical inputs must produce identical traversal and assignment.
    let make = || {
        let mut m = manager(
            TileManagerConfig {
                num_samples: 1,
                tile_size: Int2::splat(32),
                tile_order: TileOrder::Center,
                background: true,
                preserve_tile_device: true,
                num_devices: 3,
                ..TileManagerConfig::default()
            },
            300,
            200,
            1,
        );
        assert!(m.next().unwrap());
        let mut handed = Vec::new();
        for device in 0..3 {
            while let Some(tile) = m.next_tile(device) {
                handed.push((device, tile.index, tile.x, tile.y, tile.device));
            }
        }
        handed
    };
    assert_eq!(make(), make());
}

#[test]
fn test_free_device_releases_tile_buffers() {
    let mut m = manager(
        TileManagerConfig {
            num_samples: 1,
            tile_size: Int2::splat(16),
            tile_order: TileOrder::LeftToRight,
            background: true,
            ..TileManagerConfig::default()
        },
        48,
        48,
        1,
    );
    m.set_schedule_denoising(true);
    assert!(m.next().unwrap());
    assert!(m.tiles().iter().all(|t| t.buffers.is_some()));

    m.free_device();
    assert!(m.tiles().iter().all(|t| t.buffers.is_none()));
}
