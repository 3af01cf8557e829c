use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pyrflow_core::img::frame::Frame;
use pyrflow_core::img::pyramid::build_pyramid;
use pyrflow_core::track::lk::{LkTracker, TrackerConfig};
use pyrflow_core::track::seed::{GfttConfig, GfttDetector};

/// Smooth pseudo-random texture; pure noise defeats the pyramid while a
/// sinusoid mix gives every window usable structure.
fn synthetic_frame(width: u32, height: u32, shift_x: f32, shift_y: f32, seed: u64) -> Frame {
    let mut rng = StdRng::seed_from_u64(seed);
    let phase_a: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let phase_b: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    Frame::from_fn(width, height, |x, y| {
        let fx = x as f32 - shift_x;
        let fy = y as f32 - shift_y;
        128.0
            + 55.0 * (fx * 0.21 + phase_a).sin() * (fy * 0.17 + phase_b).cos()
            + 30.0 * ((fx + 2.0 * fy) * 0.09 + phase_a).sin()
    })
    .unwrap()
}

fn interior_seeds(width: u32, height: u32, count: usize, seed: u64) -> Vec<Vector2<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Vector2::new(
                rng.gen_range(16.0..(width as f32 - 16.0)),
                rng.gen_range(16.0..(height as f32 - 16.0)),
            )
        })
        .collect()
}

fn bench_pyramid(c: &mut Criterion) {
    let frame = synthetic_frame(640, 480, 0.0, 0.0, 7);
    c.bench_function("pyramid_build_640x480_l3", |b| {
        b.iter(|| black_box(build_pyramid(black_box(&frame), 3)))
    });
}

fn bench_corners(c: &mut Criterion) {
    let frame = synthetic_frame(640, 480, 0.0, 0.0, 11);
    let mut group = c.benchmark_group("gftt_640x480");
    for min_distance in [0.0f32, 3.0] {
        let detector = GfttDetector::new(GfttConfig {
            max_corners: 8000,
            quality_level: 0.01,
            min_distance,
        })
        .unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("min_dist_{min_distance}")),
            &detector,
            |b, detector| b.iter(|| black_box(detector.detect(black_box(&frame)))),
        );
    }
    group.finish();
}

fn bench_sparse(c: &mut Criterion) {
    let prev = build_pyramid(&synthetic_frame(640, 480, 0.0, 0.0, 3), 3);
    let curr = build_pyramid(&synthetic_frame(640, 480, 2.0, -1.0, 3), 3);

    let mut by_points = c.benchmark_group("lk_sparse_points");
    for count in [1000usize, 4000, 8000] {
        let seeds = interior_seeds(640, 480, count, 5);
        let tracker = LkTracker::new(TrackerConfig::default()).unwrap();
        by_points.bench_with_input(BenchmarkId::from_parameter(count), &seeds, |b, seeds| {
            b.iter(|| black_box(tracker.track(&prev, &curr, seeds).unwrap()))
        });
    }
    by_points.finish();

    let seeds = interior_seeds(640, 480, 4000, 5);
    let mut by_window = c.benchmark_group("lk_sparse_window");
    for win_size in [9u32, 13, 17, 21] {
        let tracker = LkTracker::new(TrackerConfig {
            win_size,
            ..TrackerConfig::default()
        })
        .unwrap();
        by_window.bench_with_input(
            BenchmarkId::from_parameter(win_size),
            &tracker,
            |b, tracker| b.iter(|| black_box(tracker.track(&prev, &curr, &seeds).unwrap())),
        );
    }
    by_window.finish();

    let mut by_levels = c.benchmark_group("lk_sparse_levels");
    for max_level in [0u32, 1, 2] {
        let tracker = LkTracker::new(TrackerConfig {
            max_level,
            ..TrackerConfig::default()
        })
        .unwrap();
        by_levels.bench_with_input(
            BenchmarkId::from_parameter(max_level + 1),
            &tracker,
            |b, tracker| b.iter(|| black_box(tracker.track(&prev, &curr, &seeds).unwrap())),
        );
    }
    by_levels.finish();

    let mut by_iters = c.benchmark_group("lk_sparse_iters");
    for iters in [1u32, 10, 30] {
        let tracker = LkTracker::new(TrackerConfig {
            iters,
            ..TrackerConfig::default()
        })
        .unwrap();
        by_iters.bench_with_input(
            BenchmarkId::from_parameter(iters),
            &tracker,
            |b, tracker| b.iter(|| black_box(tracker.track(&prev, &curr, &seeds).unwrap())),
        );
    }
    by_iters.finish();
}

fn bench_dense(c: &mut Criterion) {
    let prev = build_pyramid(&synthetic_frame(320, 240, 0.0, 0.0, 13), 2);
    let curr = build_pyramid(&synthetic_frame(320, 240, 1.5, 0.5, 13), 2);
    let tracker = LkTracker::new(TrackerConfig {
        win_size: 13,
        max_level: 2,
        ..TrackerConfig::default()
    })
    .unwrap();
    c.bench_function("lk_dense_320x240_w13_l3", |b| {
        b.iter(|| black_box(tracker.dense(&prev, &curr).unwrap()))
    });
}

criterion_group!(benches, bench_pyramid, bench_corners, bench_sparse, bench_dense);
criterion_main!(benches);
