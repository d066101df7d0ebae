//! Integration tests for the stepping protocol.
//!
//! Everything runs on the CPU backend, which validates and executes the same
//! generated programs the GPU backend compiles.

use nca::prelude::*;
use nca::{apply_symmetries, chunks_for, Controller};

// ============================================================================
// Helpers
// ============================================================================

/// One convolution of a cubic single-channel grid with clamped edges.
fn reference_step(
    grid: &[f32],
    n: usize,
    kernel: &[f32],
    activation: impl Fn(f32) -> f32,
) -> Vec<f32> {
    let at = |x: i64, y: i64, z: i64| {
        let c = |i: i64| i.clamp(0, n as i64 - 1) as usize;
        grid[(c(z) * n + c(y)) * n + c(x)]
    };
    let mut out = vec![0.0; grid.len()];
    for z in 0..n as i64 {
        for y in 0..n as i64 {
            for x in 0..n as i64 {
                let mut sum = 0.0f32;
                for dz in -1..=1i64 {
                    for dy in -1..=1i64 {
                        for dx in -1..=1i64 {
                            let k = ((dz + 1) * 9 + (dy + 1) * 3 + (dx + 1)) as usize;
                            sum += kernel[k] * at(x + dx, y + dy, z + dz);
                        }
                    }
                }
                let i = (z as usize * n + y as usize) * n + x as usize;
                out[i] = activation(sum).clamp(0.0, 1.0);
            }
        }
    }
    out
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= 1e-5, "cell {}: {} vs {}", i, a, e);
    }
}

fn volume(size: u32, max_targets: u32, config: Sim3DConfig) -> Sim3D<CpuBackend> {
    let backend = CpuBackend::with_max_output_targets(max_targets);
    Sim3D::new(backend, Sim3DConfig { size, ..config }).unwrap()
}

fn seeded_grid(size: u32, seed: &str) -> Vec<f32> {
    let mut sim = volume(size, 4, Sim3DConfig::default());
    sim.reset(Some(seed)).unwrap();
    sim.read_visible().unwrap()
}

// ============================================================================
// Chunking
// ============================================================================

#[test]
fn test_chunks_cover_every_depth() {
    for max_layers in [1, 4, 8] {
        for n in 1..=512 {
            let chunks = chunks_for(n, max_layers);
            let total: u32 = chunks.iter().map(|c| c.total_layers).sum();
            assert_eq!(total, n, "N={} L={}", n, max_layers);

            let mut next = 0;
            for chunk in &chunks {
                assert_eq!(chunk.z_offset, next, "N={} L={}", n, max_layers);
                assert!(chunk.total_layers >= 1 && chunk.total_layers <= max_layers);
                next = chunk.end();
            }
        }
    }
}

#[test]
fn test_chunked_volume_matches_single_pass() {
    let config = Sim3DConfig::default().with_seed("chunks");
    let mut chunked = volume(9, 2, config.clone());
    let mut whole = volume(9, 16, config);
    assert_eq!(chunked.chunks().len(), 5);
    assert_eq!(whole.chunks().len(), 1);

    chunked.reset(Some("chunks")).unwrap();
    whole.reset(Some("chunks")).unwrap();
    for _ in 0..3 {
        chunked.step().unwrap();
        whole.step().unwrap();
    }
    assert_close(&chunked.read_visible().unwrap(), &whole.read_visible().unwrap());
}

// ============================================================================
// Seeded randomization
// ============================================================================

#[test]
fn test_same_seed_is_bit_identical() {
    let a = seeded_grid(8, "abc");
    let b = seeded_grid(8, "abc");
    assert_eq!(a, b);
}

#[test]
fn test_different_seeds_differ() {
    assert_ne!(seeded_grid(8, "abc"), seeded_grid(8, "xyz"));
}

#[test]
fn test_reset_restores_seeded_state() {
    let mut sim = volume(6, 4, Sim3DConfig::default());
    sim.reset(Some("again")).unwrap();
    let start = sim.read_visible().unwrap();
    for _ in 0..4 {
        sim.render().unwrap();
    }
    assert_eq!(sim.generation(), 4);
    sim.reset(Some("again")).unwrap();
    assert_eq!(sim.generation(), 0);
    assert_eq!(sim.read_visible().unwrap(), start);
}

// ============================================================================
// Symmetry editor
// ============================================================================

#[test]
fn test_symmetry_application_is_idempotent() {
    let mut rng = nca::SeededRng::new("sym");
    let mut sets: Vec<(Dimension, Vec<Symmetry>)> = Vec::new();
    for dimension in [Dimension::Two, Dimension::Three] {
        for &relation in Symmetry::declared_order(dimension) {
            sets.push((dimension, vec![relation]));
        }
        sets.push((dimension, Symmetry::declared_order(dimension).to_vec()));
    }
    sets.push((Dimension::Two, vec![Symmetry::Vertical, Symmetry::Horizontal]));
    sets.push((Dimension::Three, vec![Symmetry::PlaneX, Symmetry::PlaneY, Symmetry::PlaneZ]));

    for (dimension, active) in sets {
        let set = SymmetrySet::new(dimension, &active);
        let kernel = Kernel::random(dimension, &mut rng);
        let once = apply_symmetries(&kernel, &set);
        let twice = apply_symmetries(&once, &set);
        assert_eq!(once, twice, "{:?} {:?}", dimension, active);
    }
}

#[test]
fn test_overlapping_symmetries_are_not_reconciled() {
    let weights: Vec<f32> = (0..9).map(|i| i as f32).collect();
    let kernel = Kernel::new(Dimension::Two, &weights).unwrap();
    let set = SymmetrySet::new(Dimension::Two, &[Symmetry::BackwardDiagonal, Symmetry::Vertical]);
    let out = apply_symmetries(&kernel, &set);
    assert_eq!(out.weights(), &[0.0, 1.0, 0.0, 1.0, 4.0, 3.0, 0.0, 3.0, 6.0]);
}

#[test]
fn test_vertical_symmetry_mirrors_columns() {
    let weights: Vec<f32> = (0..9).map(|i| i as f32).collect();
    let kernel = Kernel::new(Dimension::Two, &weights).unwrap();
    let set = SymmetrySet::new(Dimension::Two, &[Symmetry::Vertical]);
    let out = apply_symmetries(&kernel, &set);
    assert_eq!(out.weights(), &[0.0, 1.0, 0.0, 3.0, 4.0, 3.0, 6.0, 7.0, 6.0]);
}

#[test]
fn test_full_symmetry_collapses_to_first_weight() {
    let weights: Vec<f32> = (0..27).map(|i| i as f32 + 0.5).collect();
    let kernel = Kernel::new(Dimension::Three, &weights).unwrap();
    let set = SymmetrySet::new(Dimension::Three, &[Symmetry::Full]);
    let out = apply_symmetries(&kernel, &set);
    for (i, &w) in out.weights().iter().enumerate() {
        if i == 13 {
            assert_eq!(w, 13.5);
        } else {
            assert_eq!(w, 0.5, "index {}", i);
        }
    }
}

#[test]
fn test_edit_kernel_keeps_symmetry() {
    let mut sim = Sim2D::new(CpuBackend::new(), Sim2DConfig::new(8, 8)).unwrap();
    let relations = [Symmetry::Vertical, Symmetry::Horizontal];
    sim.set_symmetries(SymmetrySet::new(Dimension::Two, &relations));
    sim.edit_kernel(8, 0.25);
    let k = sim.kernel().weights();
    assert_eq!([k[0], k[2], k[6], k[8]], [0.25; 4]);
    assert_eq!(apply_symmetries(sim.kernel(), sim.symmetries()), *sim.kernel());
}

// ============================================================================
// Stepping
// ============================================================================

#[test]
fn test_step_exposes_one_convolution() {
    let clouds = library::find(Dimension::Three, "clouds").unwrap();
    let config = Sim3DConfig::default().with_preset(&clouds).with_activation("abs(x)");
    let mut sim = volume(6, 4, config);
    sim.reset(Some("swap")).unwrap();
    let before = sim.read_visible().unwrap();

    assert_eq!(sim.step().unwrap(), 1);
    let expected = reference_step(&before, 6, sim.kernel().weights(), f32::abs);
    assert_close(&sim.read_visible().unwrap(), &expected);
}

#[test]
fn test_skip_every_other_runs_two_convolutions() {
    let clouds = library::find(Dimension::Three, "clouds").unwrap();
    let config = Sim3DConfig::default()
        .with_preset(&clouds)
        .with_activation("abs(x)")
        .with_compute_delay(1)
        .with_skip_every_other(true);
    let mut sim = volume(5, 4, config);
    sim.reset(Some("double")).unwrap();
    let before = sim.read_visible().unwrap();

    assert_eq!(sim.step().unwrap(), 2);
    assert_eq!(sim.generation(), 2);
    let kernel = sim.kernel().weights().to_vec();
    let once = reference_step(&before, 5, &kernel, f32::abs);
    let twice = reference_step(&once, 5, &kernel, f32::abs);
    assert_close(&sim.read_visible().unwrap(), &twice);
}

#[test]
fn test_compute_delay_skips_ticks() {
    let config = Sim3DConfig::default().with_compute_delay(3);
    let mut sim = volume(4, 4, config);
    sim.reset(Some("delay")).unwrap();
    let steps: Vec<u32> = (0..6).map(|_| sim.render().unwrap().steps).collect();
    assert_eq!(steps, vec![0, 0, 1, 0, 0, 1]);
    assert_eq!(sim.generation(), 2);
}

#[test]
fn test_identity_rule_keeps_grid() {
    let config = Sim3DConfig::default()
        .with_kernel(Kernel::identity(Dimension::Three))
        .with_activation("x");
    let mut sim = volume(4, 4, config);
    sim.set_symmetries(SymmetrySet::none(Dimension::Three));
    sim.set_kernel(Kernel::identity(Dimension::Three).weights());
    assert_eq!(sim.chunks().len(), 1);

    sim.reset(Some("identity")).unwrap();
    let before = sim.read_visible().unwrap();
    sim.step().unwrap();
    assert_eq!(sim.read_visible().unwrap(), before);
}

#[test]
fn test_frame_reports_visible_buffer() {
    let mut sim = volume(4, 4, Sim3DConfig::default());
    let frame = sim.render().unwrap();
    assert_eq!(frame.steps, 0);
    assert_eq!(sim.state(), SimState::Uninitialized);

    sim.reset(Some("frame")).unwrap();
    assert_eq!(sim.state(), SimState::Ready);
    let first = sim.render().unwrap();
    let second = sim.render().unwrap();
    assert_eq!(sim.state(), SimState::Stepping);
    assert_ne!(first.buffer, second.buffer);
    assert_eq!(second.generation, 2);
    assert_eq!(second.shape, GridShape::cube(4));
}

#[test]
fn test_paused_render_does_not_step() {
    let mut sim = volume(4, 4, Sim3DConfig::default());
    sim.reset(Some("pause")).unwrap();
    sim.set_paused(true);
    let before = sim.read_visible().unwrap();
    for _ in 0..3 {
        assert_eq!(sim.render().unwrap().steps, 0);
    }
    assert_eq!(sim.state(), SimState::Paused);
    assert_eq!(sim.read_visible().unwrap(), before);

    sim.set_paused(false);
    assert_eq!(sim.render().unwrap().steps, 1);
    assert_eq!(sim.state(), SimState::Stepping);
}

// ============================================================================
// Rejected input
// ============================================================================

#[test]
fn test_wrong_length_kernel_ignored() {
    let mut sim = volume(4, 4, Sim3DConfig::default());
    let before = sim.kernel().clone();
    sim.set_kernel(&[0.0; 8]);
    sim.set_kernel(&[0.0; 9]);
    assert_eq!(sim.kernel(), &before);
}

#[test]
fn test_negative_size_ignored() {
    let mut sim = volume(8, 4, Sim3DConfig::default());
    sim.set_size(-1).unwrap();
    assert_eq!(sim.size(), 8);
}

#[test]
fn test_bad_activation_keeps_previous() {
    let mut sim = volume(4, 4, Sim3DConfig::default());
    sim.reset(Some("act")).unwrap();
    let before = sim.activation().clone();
    let err = sim.set_activation("x + (").unwrap_err();
    assert!(matches!(err, EngineError::Compile { .. }));
    assert_eq!(sim.activation(), &before);
    sim.render().unwrap();
}

#[test]
fn test_bad_activation_fails_construction() {
    let result = Sim3D::new(CpuBackend::new(), Sim3DConfig::new(4).with_activation("nope(x)"));
    assert!(matches!(result, Err(EngineError::Compile { .. })));
}

// ============================================================================
// Presets and 2-D
// ============================================================================

#[test]
fn test_empty_fill_starts_blank() {
    let blank = library::find(Dimension::Three, "blank_volume").unwrap();
    let mut sim = volume(4, 4, Sim3DConfig::default().with_preset(&blank));
    sim.reset(Some("empty")).unwrap();
    assert!(sim.read_visible().unwrap().iter().all(|&v| v == 0.0));
}

#[test]
fn test_load_preset_switches_rule() {
    let mut sim = volume(4, 4, Sim3DConfig::default());
    let life = library::find(Dimension::Three, "life_4555").unwrap();
    sim.load_preset(&life).unwrap();
    assert_eq!(sim.activation(), &life.activation);
    assert_eq!(sim.randomize_settings().fill, FillMode::Binary);

    sim.reset(Some("life")).unwrap();
    assert!(sim.read_visible().unwrap().iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn test_game_of_life_blinker() {
    let life = library::find(Dimension::Two, "game_of_life").unwrap();
    let blank = library::find(Dimension::Two, "blank_canvas").unwrap();
    let config = Sim2DConfig::new(8, 8).with_preset(&blank).with_brush_radius(0.0);
    let mut sim = Sim2D::new(CpuBackend::new(), config).unwrap();
    sim.reset(Some("blinker")).unwrap();
    sim.load_preset(&life).unwrap();

    for x in [3.0, 4.0, 5.0] {
        sim.mouse_draw(Vec2::new((x + 0.5) / 8.0, 4.5 / 8.0)).unwrap();
    }
    sim.step().unwrap();

    let shape = sim.shape();
    let grid = sim.read_visible().unwrap();
    let alive: Vec<(u32, u32)> = (0..8)
        .flat_map(|y| (0..8).map(move |x| (x, y)))
        .filter(|&(x, y)| grid[shape.index(x, y, 0, 0)] == 1.0)
        .collect();
    assert_eq!(alive, vec![(4, 3), (4, 4), (4, 5)]);
}

#[test]
fn test_2d_channels_step_independently() {
    let config = Sim2DConfig::new(6, 6)
        .with_channels(3)
        .with_kernel(Kernel::identity(Dimension::Two))
        .with_activation("x");
    let mut sim = Sim2D::new(CpuBackend::new(), config).unwrap();
    sim.set_symmetries(SymmetrySet::none(Dimension::Two));
    sim.set_kernel(Kernel::identity(Dimension::Two).weights());
    sim.reset(Some("rgb")).unwrap();
    let before = sim.read_visible().unwrap();
    assert_eq!(before.len(), 6 * 6 * 3);
    sim.render().unwrap();
    assert_eq!(sim.read_visible().unwrap(), before);
}

#[test]
fn test_controller_accessible_generically() {
    fn advance<B: ComputeBackend>(sim: &mut Controller<B>, ticks: usize) -> u64 {
        for _ in 0..ticks {
            sim.render().unwrap();
        }
        sim.generation()
    }

    let mut sim = volume(4, 4, Sim3DConfig::default());
    sim.reset(Some("generic")).unwrap();
    assert_eq!(advance(&mut sim, 3), 3);
}
