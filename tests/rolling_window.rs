//! Rolling-window behaviour end-to-end through the public API.
//!
//! Drives a seeded particle filter through the rolling mapper along
//! several trajectories and checks containment, uniform resizing, overlap
//! preservation, retention ordering and regeneration determinism.

use std::collections::HashSet;
use std::f32::consts::PI;
use std::sync::Arc;

use chala_slam::algorithms::localization::MotionModelConfig;
use chala_slam::algorithms::mapping::{GridBounds, OccupancyGridConfig, ScanIntegrator};
use chala_slam::core::types::{LaserScan, Pose2D, Timestamped};
use chala_slam::engine::history::{IdAllocator, NodeId};
use chala_slam::engine::slam::{ParticleFilter, ParticleFilterConfig, SlamEngine};
use chala_slam::engine::window::{
    GenerationMode, MapGenerator, Placement, RetentionMode, RetentionPolicy, WindowConfig,
    resize_all,
};
use chala_slam::engine::{MapperConfig, RollingMapper, ScanOutcome};
use chala_slam::error::{Error, Result};
use chala_slam::io::PoseSource;
use chala_slam::state::create_shared_state;

const SCAN_PERIOD_US: u64 = 100_000;

/// Odometry given as a function of time.
struct Trajectory<F: Fn(f32) -> Pose2D>(F);

impl<F: Fn(f32) -> Pose2D> PoseSource for Trajectory<F> {
    fn lookup(&self, timestamp_us: u64) -> Result<Pose2D> {
        Ok((self.0)(timestamp_us as f32 / 1e6))
    }
}

fn ring_scan(range: f32, timestamp_us: u64) -> Timestamped<LaserScan> {
    let n = 72;
    let inc = 2.0 * PI / n as f32;
    let scan = LaserScan::new(-PI, -PI + inc * (n - 1) as f32, inc, 0.1, 5.0, vec![range; n]);
    Timestamped::new(scan, timestamp_us)
}

fn engine(resolution: f32, particles: usize, motion: MotionModelConfig) -> ParticleFilter {
    let filter = ParticleFilterConfig {
        particles,
        linear_update: 0.05,
        angular_update: 0.1,
        seed: 42,
        motion,
        ..Default::default()
    };
    let grid = OccupancyGridConfig {
        resolution,
        ..Default::default()
    };
    ParticleFilter::new(filter, grid, ScanIntegrator::default(), IdAllocator::new())
}

fn mapper(
    window: WindowConfig,
    resolution: f32,
    particles: usize,
    motion: MotionModelConfig,
) -> RollingMapper<ParticleFilter> {
    let config = MapperConfig {
        window,
        resolution,
        max_range: 5.0,
        throttle_scans: 1,
        map_update_interval_s: 100.0,
        publish_particle: None,
        publish_all_paths: false,
    };
    RollingMapper::new(
        engine(resolution, particles, motion),
        config,
        create_shared_state(),
    )
    .unwrap()
}

fn best_pose(m: &RollingMapper<ParticleFilter>) -> Pose2D {
    let best = m.engine().best_index().unwrap();
    m.engine().particles()[best].pose
}

/// Run `steps` scans and check containment and uniformity after each.
fn drive_and_check<F: Fn(f32) -> Pose2D>(
    m: &mut RollingMapper<ParticleFilter>,
    trajectory: &Trajectory<F>,
    steps: u64,
) {
    let resolution = m.tracker().resolution();
    let margin = m.tracker().config().margin;
    for i in 0..steps {
        let outcome = m
            .handle_scan(ring_scan(2.0, i * SCAN_PERIOD_US), trajectory)
            .unwrap();
        assert_ne!(outcome, ScanOutcome::PoseUnavailable);

        let bounds = m.bounds().unwrap();
        let pose = best_pose(m);
        assert!(
            bounds.contains_with_margin(pose.x, pose.y, resolution, margin),
            "step {}: pose ({:.3}, {:.3}) within {} m of an edge of {:?}",
            i,
            pose.x,
            pose.y,
            margin,
            bounds
        );

        for particle in m.engine().particles() {
            assert_eq!(particle.map.bounds(), bounds);
            assert_eq!(particle.map.resolution(), resolution);
            assert_eq!(
                particle.map.dimensions(),
                (bounds.width(), bounds.height())
            );
        }
    }
}

#[test]
fn test_containment_and_uniformity_on_varied_trajectories() {
    let noisy = MotionModelConfig::default();

    let window = |placement| WindowConfig {
        size: 8.0,
        margin: 1.0,
        hysteresis: 2.0,
        placement,
        retention: RetentionMode::WindowPlusRange,
        generation: GenerationMode::SideBuffer,
    };

    for placement in [Placement::Centered, Placement::Directional] {
        // Straight line, diagonal, circle, back-and-forth.
        let mut m = mapper(window(placement), 0.1, 6, noisy);
        drive_and_check(&mut m, &Trajectory(|t| Pose2D::new(t, 0.0, 0.0)), 150);
        assert!(m.tracker().resize_count() >= 2);

        let mut m = mapper(window(placement), 0.1, 6, noisy);
        drive_and_check(
            &mut m,
            &Trajectory(|t| Pose2D::new(0.7 * t, -0.7 * t, -PI / 4.0)),
            150,
        );

        let mut m = mapper(window(placement), 0.1, 6, noisy);
        drive_and_check(
            &mut m,
            &Trajectory(|t| Pose2D::new(6.0 * (0.2 * t).cos(), 6.0 * (0.2 * t).sin(), 0.2 * t)),
            150,
        );

        let mut m = mapper(window(placement), 0.1, 6, noisy);
        drive_and_check(
            &mut m,
            &Trajectory(|t| Pose2D::new(3.5 * (0.8 * t).sin(), 0.0, 0.0)),
            150,
        );
    }
}

#[test]
fn test_window_of_ten_meters_is_200_cells() {
    let bounds = GridBounds::centered_on(0.0, 0.0, 10.0, 0.05);
    assert_eq!((bounds.width(), bounds.height()), (200, 200));

    let window = WindowConfig {
        size: 10.0,
        ..Default::default()
    };
    let mut m = mapper(window, 0.05, 2, MotionModelConfig::noiseless());
    let still = Trajectory(|_| Pose2D::identity());
    assert_eq!(
        m.handle_scan(ring_scan(2.0, 0), &still).unwrap(),
        ScanOutcome::Initialized
    );
    let grid = m.shared().map_slot().grid.unwrap();
    assert_eq!(grid.dimensions(), (200, 200));
}

#[test]
fn test_eleven_meter_drive_resizes_exactly_once() {
    // Out-of-the-box window settings.
    let window = WindowConfig::default();
    assert_eq!((window.size, window.margin), (10.0, 1.0));
    assert_eq!(window.placement, Placement::Directional);
    let mut m = mapper(window, 0.05, 3, MotionModelConfig::noiseless());
    let line = Trajectory(|t| Pose2D::new(t, 0.0, 0.0));

    let mut resizes = Vec::new();
    let mut previous = None;
    for i in 0..=110u64 {
        let outcome = m.handle_scan(ring_scan(2.0, i * SCAN_PERIOD_US), &line).unwrap();
        let bounds = m.bounds().unwrap();
        if matches!(
            outcome,
            ScanOutcome::Processed { resized: true, .. } | ScanOutcome::Skipped { resized: true }
        ) {
            resizes.push((best_pose(&m).x, previous.unwrap(), bounds));
        }
        previous = Some(bounds);
    }

    assert_eq!(resizes.len(), 1, "resizes: {:?}", resizes);
    assert_eq!(m.tracker().resize_count(), 1);

    let (x, old, new) = resizes[0];
    let (old_xmin, _) = old.origin(0.05);
    // Fires once the pose is within the margin of the far edge: 9 m past
    // the original window's origin.
    assert!((x - old_xmin - 9.0).abs() <= 0.15, "resize at x = {}", x);

    // Shifted by whole cells along x only.
    assert_eq!(new.min_cy(), old.min_cy());
    assert!(new.min_cx() > old.min_cx());
    assert_eq!((new.width(), new.height()), (200, 200));
}

#[test]
fn test_resize_preserves_overlap_exactly() {
    let mut pf = engine(0.1, 4, MotionModelConfig::default());
    let start = GridBounds::centered_on(0.0, 0.0, 8.0, 0.1);
    pf.initialize(Pose2D::identity(), Arc::new(ring_scan(2.0, 0).data), 0, start)
        .unwrap();
    for i in 1..=10u64 {
        let odom = Pose2D::new(0.1 * i as f32, 0.05 * i as f32, 0.02 * i as f32);
        pf.process(odom, Arc::new(ring_scan(1.5, 0).data), i * SCAN_PERIOD_US)
            .unwrap();
    }
    let before: Vec<_> = pf.particles().iter().map(|p| p.map.clone()).collect();

    let target = GridBounds::new(start.min_cx() + 17, start.min_cy() - 9, 80, 80);
    let overlap = start.intersection(&target).unwrap();
    let report = resize_all(pf.parts_mut().particles, target).unwrap();
    assert_eq!(report.preserved_cells, overlap.cell_count());

    for (old, particle) in before.iter().zip(pf.particles()) {
        for cy in overlap.min_cy()..overlap.max_cy() {
            for cx in overlap.min_cx()..overlap.max_cx() {
                assert_eq!(
                    particle.map.cell_at_lattice(cx, cy),
                    old.cell_at_lattice(cx, cy)
                );
            }
        }
        // Cells outside the old window start unknown.
        let fresh = particle.map.cell_at_lattice(target.max_cx() - 1, target.min_cy());
        assert!(fresh.is_unknown());
    }
}

#[test]
fn test_resize_allocation_failure_keeps_prior_grids() {
    let config = ParticleFilterConfig {
        particles: 3,
        seed: 1,
        ..Default::default()
    };
    let grid = OccupancyGridConfig {
        resolution: 0.1,
        max_cells: 10_000,
        ..Default::default()
    };
    let mut pf = ParticleFilter::new(config, grid, ScanIntegrator::default(), IdAllocator::new());
    let start = GridBounds::centered_on(0.0, 0.0, 8.0, 0.1);
    pf.initialize(Pose2D::identity(), Arc::new(ring_scan(2.0, 0).data), 0, start)
        .unwrap();

    let too_big = GridBounds::new(0, 0, 200, 200);
    let result = resize_all(pf.parts_mut().particles, too_big);
    assert!(matches!(result, Err(Error::Allocation { .. })));
    for particle in pf.particles() {
        assert_eq!(particle.map.bounds(), start);
    }
}

/// Retained node ids after applying `mode` to a seeded run.
fn retained_after(mode: RetentionMode, bounds: &GridBounds) -> HashSet<NodeId> {
    let mut pf = engine(0.1, 5, MotionModelConfig::default());
    pf.initialize(
        Pose2D::identity(),
        Arc::new(ring_scan(2.0, 0).data),
        0,
        GridBounds::centered_on(0.0, 0.0, 30.0, 0.1),
    )
    .unwrap();
    for i in 1..=60u64 {
        let odom = Pose2D::new(0.2 * i as f32, 0.0, 0.0);
        pf.process(odom, Arc::new(ring_scan(2.0, 0).data), i * SCAN_PERIOD_US)
            .unwrap();
    }

    RetentionPolicy::new(mode, 0.1, 5.0)
        .apply(pf.history_mut(), bounds)
        .unwrap();
    pf.history()
        .iter()
        .filter(|(_, node)| node.is_retained())
        .map(|(_, node)| node.id())
        .collect()
}

#[test]
fn test_window_plus_range_retains_superset_of_window() {
    let bounds = GridBounds::centered_on(11.0, 0.0, 4.0, 0.1);
    let window = retained_after(RetentionMode::Window, &bounds);
    let padded = retained_after(RetentionMode::WindowPlusRange, &bounds);
    let keep = retained_after(RetentionMode::Keep, &bounds);

    assert!(!window.is_empty());
    assert!(window.is_subset(&padded));
    assert!(padded.len() > window.len());
    assert!(padded.is_subset(&keep));
}

#[test]
fn test_retention_monotonicity_over_poses() {
    let bounds = GridBounds::centered_on(0.0, 0.0, 10.0, 0.05);
    let window = RetentionPolicy::new(RetentionMode::Window, 0.05, 5.0);
    let padded = RetentionPolicy::new(RetentionMode::WindowPlusRange, 0.05, 5.0);

    for ix in -40..=40 {
        for iy in -40..=40 {
            let pose = Pose2D::new(ix as f32 * 0.5, iy as f32 * 0.5, 0.0);
            if window.retains(&pose, &bounds) {
                assert!(padded.retains(&pose, &bounds), "{:?}", pose);
            }
        }
    }

    // 4 m beyond the edge is within sensor range, 6 m is not.
    assert!(padded.retains(&Pose2D::new(9.0, 0.0, 0.0), &bounds));
    assert!(!padded.retains(&Pose2D::new(11.0, 0.0, 0.0), &bounds));
    assert!(!window.retains(&Pose2D::new(9.0, 0.0, 0.0), &bounds));
}

#[test]
fn test_side_buffer_regeneration_is_idempotent() {
    let mut pf = engine(0.1, 4, MotionModelConfig::default());
    pf.initialize(
        Pose2D::identity(),
        Arc::new(ring_scan(2.0, 0).data),
        0,
        GridBounds::centered_on(0.0, 0.0, 10.0, 0.1),
    )
    .unwrap();
    for i in 1..=20u64 {
        let odom = Pose2D::new(0.25 * i as f32, 0.0, 0.05 * i as f32);
        pf.process(odom, Arc::new(ring_scan(1.8, 0).data), i * SCAN_PERIOD_US)
            .unwrap();
    }
    let bounds = GridBounds::centered_on(3.0, 0.0, 6.0, 0.1);
    resize_all(pf.parts_mut().particles, bounds).unwrap();
    RetentionPolicy::new(RetentionMode::Window, 0.1, 5.0)
        .apply(pf.history_mut(), &bounds)
        .unwrap();

    let mut generator = MapGenerator::new(GenerationMode::SideBuffer, 0.0);
    let first = generator.regenerate(&mut pf, 0, 0, true).unwrap().unwrap();
    let first_all: Vec<_> = pf.particles().iter().map(|p| p.map.clone()).collect();
    let second = generator.regenerate(&mut pf, 0, 1, true).unwrap().unwrap();

    assert!(first.same_evidence(&second));
    assert_eq!(first.binarize(), second.binarize());
    for (a, b) in first_all.iter().zip(pf.particles()) {
        assert!(a.same_evidence(&b.map));
    }
}

#[test]
fn test_incremental_and_side_buffer_agree_inside_window() {
    // Short beams never paint outside the window they were taken in, so
    // un-painting discarded scans is exact and both strategies end with
    // the same grids.
    let window = |generation| WindowConfig {
        size: 12.0,
        margin: 1.0,
        hysteresis: 2.0,
        placement: Placement::Centered,
        retention: RetentionMode::Window,
        generation,
    };
    let line = Trajectory(|t| Pose2D::new(t, 0.0, 0.0));
    let noiseless = MotionModelConfig::noiseless();

    let mut incremental = mapper(window(GenerationMode::Incremental), 0.1, 3, noiseless);
    let mut side = mapper(window(GenerationMode::SideBuffer), 0.1, 3, noiseless);
    for i in 0..=120u64 {
        let ts = i * SCAN_PERIOD_US;
        incremental.handle_scan(ring_scan(0.5, ts), &line).unwrap();
        side.handle_scan(ring_scan(0.5, ts), &line).unwrap();
    }

    assert!(side.tracker().resize_count() >= 2);
    assert_eq!(
        incremental.tracker().resize_count(),
        side.tracker().resize_count()
    );
    let discarded = side
        .engine()
        .history()
        .iter()
        .filter(|(_, node)| !node.is_retained())
        .count();
    assert!(discarded > 0 || side.stats().nodes_reclaimed > 0);

    for (a, b) in incremental
        .engine()
        .particles()
        .iter()
        .zip(side.engine().particles())
    {
        assert!(a.map.same_evidence(&b.map));
    }
}
