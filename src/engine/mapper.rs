//! Rolling-window mapper: the scan path.
//!
//! One call to [`RollingMapper::handle_scan`] per incoming scan:
//!
//! 1. Throttle: only every Nth scan goes further
//! 2. Resolve the odometry pose at the scan time (skip if unavailable)
//! 3. First scan: initialise the engine inside a window around the pose
//! 4. Otherwise let the engine predict, weight, record and paint
//! 5. Check the best particle's pose against the window; resize all
//!    grids, apply retention and adjust the grids to it
//! 6. Publish the map→odom transform and pose entropy
//! 7. Regenerate the published grid when due and swap it into shared state

use std::sync::Arc;

use crate::algorithms::mapping::GridBounds;
use crate::core::types::{LaserScan, Pose2D, Timestamped};
use crate::engine::slam::SlamEngine;
use crate::engine::window::{
    BoundsCheck, GenerationMode, MapGenerator, RetentionMode, RetentionPolicy, WindowConfig,
    WindowTracker, resize_all,
};
use crate::error::{Error, Result};
use crate::io::PoseSource;
use crate::state::{MapTransform, SharedStateHandle};

/// Scan-path parameters.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub window: WindowConfig,
    /// Grid resolution (meters per cell).
    pub resolution: f32,
    /// Sensor maximum range, used by window-plus-range retention (meters).
    pub max_range: f32,
    /// Process every Nth scan.
    pub throttle_scans: u32,
    /// Minimum time between full map regenerations (seconds).
    pub map_update_interval_s: f32,
    /// Publish this particle's map instead of the best one.
    pub publish_particle: Option<usize>,
    /// Store every particle's trajectory alongside each new grid.
    pub publish_all_paths: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            resolution: 0.05,
            max_range: 8.0,
            throttle_scans: 1,
            map_update_interval_s: 5.0,
            publish_particle: None,
            publish_all_paths: false,
        }
    }
}

/// What happened to one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Dropped by the scan throttle.
    Throttled,
    /// No pose at the scan time; nothing changed.
    PoseUnavailable,
    /// First scan; the map now exists.
    Initialized,
    /// The engine did not integrate the scan (not enough motion).
    Skipped { resized: bool },
    /// Integrated.
    Processed { resized: bool, map_updated: bool },
}

/// Scan-path counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperStats {
    pub scans_received: u64,
    pub scans_throttled: u64,
    pub pose_failures: u64,
    pub scans_processed: u64,
    pub scans_skipped: u64,
    pub resize_aborts: u64,
    pub map_updates: u64,
    pub nodes_reclaimed: u64,
}

/// Drives a [`SlamEngine`] and keeps its grids inside a rolling window.
pub struct RollingMapper<E: SlamEngine> {
    engine: E,
    config: MapperConfig,
    tracker: WindowTracker,
    retention: RetentionPolicy,
    generator: MapGenerator,
    shared: SharedStateHandle,
    laser_count: u64,
    stats: MapperStats,
}

impl<E: SlamEngine> RollingMapper<E> {
    pub fn new(engine: E, config: MapperConfig, shared: SharedStateHandle) -> Result<Self> {
        config.window.validate(config.resolution)?;
        if config.throttle_scans == 0 {
            return Err(Error::Config("throttle_scans must be at least 1".into()));
        }

        let mut retention_mode = config.window.retention;
        if config.window.generation == GenerationMode::EngineNative
            && retention_mode != RetentionMode::Keep
        {
            log::warn!(
                "Generation mode {} never forgets; retention {} overridden to keep",
                config.window.generation,
                retention_mode
            );
            retention_mode = RetentionMode::Keep;
        }

        log::info!(
            "Rolling window: {:.1} m, margin {:.2} m, {} placement, retention {}, generation {}",
            config.window.size,
            config.window.margin,
            config.window.placement,
            retention_mode,
            config.window.generation
        );

        Ok(Self {
            tracker: WindowTracker::new(config.window.clone(), config.resolution),
            retention: RetentionPolicy::new(retention_mode, config.resolution, config.max_range),
            generator: MapGenerator::new(config.window.generation, config.map_update_interval_s),
            engine,
            config,
            shared,
            laser_count: 0,
            stats: MapperStats::default(),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn tracker(&self) -> &WindowTracker {
        &self.tracker
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    pub fn generator(&self) -> &MapGenerator {
        &self.generator
    }

    pub fn stats(&self) -> &MapperStats {
        &self.stats
    }

    pub fn shared(&self) -> &SharedStateHandle {
        &self.shared
    }

    /// Current window bounds.
    pub fn bounds(&self) -> Option<GridBounds> {
        self.tracker.bounds()
    }

    /// Process one scan.
    ///
    /// Errors for which [`Error::is_fatal`] holds mean the mapper can no
    /// longer produce a meaningful map.
    pub fn handle_scan(
        &mut self,
        scan: Timestamped<LaserScan>,
        poses: &dyn PoseSource,
    ) -> Result<ScanOutcome> {
        self.stats.scans_received += 1;
        self.laser_count += 1;
        if self.laser_count % u64::from(self.config.throttle_scans) != 0 {
            self.stats.scans_throttled += 1;
            return Ok(ScanOutcome::Throttled);
        }

        let Timestamped { data, timestamp_us } = scan;
        let odom = match poses.lookup(timestamp_us) {
            Ok(pose) => pose,
            Err(e @ Error::PoseUnavailable { .. }) => {
                log::warn!("Skipping scan: {}", e);
                self.stats.pose_failures += 1;
                return Ok(ScanOutcome::PoseUnavailable);
            }
            Err(e) => return Err(e),
        };
        data.validate()?;
        let scan = Arc::new(data);

        if !self.engine.is_initialized() {
            return self.initialize(odom, scan, timestamp_us);
        }

        let integrated = self.engine.process(odom, scan, timestamp_us)?;

        let best = self.best_pose()?;
        let resized = match self.tracker.check_bounds(&best) {
            BoundsCheck::Stable => false,
            BoundsCheck::ResizeNeeded(bounds) => self.resize(bounds)?,
        };

        self.publish_transform(odom, timestamp_us)?;

        if !integrated {
            self.stats.scans_skipped += 1;
            if resized {
                self.update_map(timestamp_us, true)?;
            }
            return Ok(ScanOutcome::Skipped { resized });
        }

        self.stats.scans_processed += 1;
        let map_updated = self.update_map(timestamp_us, resized)?;
        Ok(ScanOutcome::Processed {
            resized,
            map_updated,
        })
    }

    fn initialize(
        &mut self,
        odom: Pose2D,
        scan: Arc<LaserScan>,
        timestamp_us: u64,
    ) -> Result<ScanOutcome> {
        let BoundsCheck::ResizeNeeded(bounds) = self.tracker.check_bounds(&odom) else {
            return Err(Error::InvariantViolation(
                "window exists before the map was initialized".into(),
            ));
        };

        self.engine.initialize(odom, scan, timestamp_us, bounds)?;
        self.tracker.commit(bounds);

        let (xmin, ymin, xmax, ymax) = bounds.world_extent(self.config.resolution);
        log::info!(
            "Map initialized: {}x{} cells over [{:.2}, {:.2}] x [{:.2}, {:.2}]",
            bounds.width(),
            bounds.height(),
            xmin,
            xmax,
            ymin,
            ymax
        );

        self.apply_retention(&bounds)?;
        self.publish_transform(odom, timestamp_us)?;
        self.update_map(timestamp_us, true)?;
        self.stats.scans_processed += 1;
        Ok(ScanOutcome::Initialized)
    }

    /// Move every grid to `bounds`. Returns `false` if the resize was
    /// aborted and the previous window kept.
    fn resize(&mut self, bounds: GridBounds) -> Result<bool> {
        let report = match resize_all(self.engine.parts_mut().particles, bounds) {
            Ok(report) => report,
            Err(Error::Allocation { cells }) => {
                log::error!(
                    "Resize aborted: cannot allocate {} cells, keeping {:?}",
                    cells,
                    self.tracker.bounds()
                );
                self.stats.resize_aborts += 1;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.tracker.commit(bounds);

        let (ox, oy) = report.old.origin(self.config.resolution);
        let (nx, ny) = report.new.origin(self.config.resolution);
        log::info!(
            "Window resize #{}: origin ({:.2}, {:.2}) -> ({:.2}, {:.2}), {} particles, {} cells kept",
            self.tracker.resize_count(),
            ox,
            oy,
            nx,
            ny,
            report.particles,
            report.preserved_cells
        );

        self.apply_retention(&bounds)?;
        Ok(true)
    }

    fn apply_retention(&mut self, bounds: &GridBounds) -> Result<()> {
        let report = self.retention.apply(self.engine.history_mut(), bounds)?;
        let erased = self.generator.after_retention(&mut self.engine, &report)?;

        let history = self.engine.history_mut();
        let payloads = history.drop_discarded_payloads();
        let pruned = history.prune_discarded_ancestry()?;
        self.stats.nodes_reclaimed = history.reclaimed_total();

        log::debug!(
            "Retention {}: {} evaluated, {} retained, {} discarded, {} erased, {} payloads dropped, {} detached, {} live",
            self.retention.mode(),
            report.evaluated,
            report.retained,
            report.newly_discarded.len(),
            erased,
            payloads,
            pruned,
            history.len()
        );
        Ok(())
    }

    fn best_pose(&self) -> Result<Pose2D> {
        let best = self.engine.best_index()?;
        self.engine
            .particles()
            .get(best)
            .map(|p| p.pose)
            .ok_or(Error::EmptyParticleSet)
    }

    fn publish_index(&self) -> Result<usize> {
        let count = self.engine.particles().len();
        match self.config.publish_particle {
            Some(index) if index < count => Ok(index),
            Some(index) => {
                log::debug!(
                    "Publish particle {} out of range ({} particles), using best",
                    index,
                    count
                );
                self.engine.best_index()
            }
            None => self.engine.best_index(),
        }
    }

    fn publish_transform(&self, odom: Pose2D, timestamp_us: u64) -> Result<()> {
        let best = self.best_pose()?;
        self.shared.set_transform(MapTransform {
            map_to_odom: best.compose(&odom.inverse()),
            timestamp_us,
        });
        self.shared.set_entropy(self.engine.pose_entropy());
        Ok(())
    }

    /// Regenerate the published grid if due. Returns whether shared state
    /// received a new grid.
    fn update_map(&mut self, timestamp_us: u64, forced: bool) -> Result<bool> {
        let index = self.publish_index()?;
        let Some(grid) = self
            .generator
            .regenerate(&mut self.engine, index, timestamp_us, forced)?
        else {
            return Ok(false);
        };

        let particle = self
            .engine
            .particles()
            .get(index)
            .ok_or(Error::EmptyParticleSet)?;
        let path = Arc::new(particle.trajectory(self.engine.history()));
        let all_paths = self.config.publish_all_paths.then(|| {
            let history = self.engine.history();
            Arc::new(
                self.engine
                    .particles()
                    .iter()
                    .map(|p| p.trajectory(history))
                    .collect::<Vec<_>>(),
            )
        });

        let generation = self
            .shared
            .store_map_with_paths(grid, path, all_paths, timestamp_us);
        self.stats.map_updates += 1;
        log::debug!(
            "Map generation {} from particle {} at t={}us",
            generation,
            index,
            timestamp_us
        );
        Ok(true)
    }
}
