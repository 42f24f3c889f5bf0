//! Scan integration into occupancy grids.
//!
//! Takes a laser scan and the pose it was taken from, then paints the grid:
//! 1. Drop beams that are not finite or fall outside `(range_min, range_max]`
//! 2. Clip each remaining beam at the usable range
//! 3. Ray trace from the sensor to the (clipped) endpoint
//! 4. Mark the endpoint occupied only when the beam returned before clipping
//!
//! The same beam selection is used for [`Evidence::Add`] and
//! [`Evidence::Remove`], so removing a scan exactly undoes adding it.

use serde::{Deserialize, Serialize};

use super::{Evidence, OccupancyGrid, RayTracer};
use crate::core::types::{LaserScan, Point2D, Pose2D};

/// Configuration for the scan integrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanIntegratorConfig {
    /// Beams are clipped at this range (meters).
    ///
    /// Returns beyond it paint free space up to the clip point only.
    pub max_usable_range: f32,

    /// Use every N-th beam.
    ///
    /// 1 = use all beams, 2 = use every other beam, etc.
    pub beam_skip: usize,
}

impl Default for ScanIntegratorConfig {
    fn default() -> Self {
        Self {
            max_usable_range: 8.0,
            beam_skip: 1,
        }
    }
}

/// One beam after filtering and clipping, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    pub end: Point2D,
    /// Whether the beam returned within the usable range.
    pub hit: bool,
}

/// Paints laser scans into occupancy grids.
#[derive(Debug, Clone)]
pub struct ScanIntegrator {
    config: ScanIntegratorConfig,
}

impl ScanIntegrator {
    pub fn new(config: ScanIntegratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScanIntegratorConfig {
        &self.config
    }

    /// World-frame beams of `scan` taken at `pose`, after filtering.
    pub fn beams<'a>(
        &'a self,
        scan: &'a LaserScan,
        pose: &'a Pose2D,
    ) -> impl Iterator<Item = Beam> + 'a {
        let skip = self.config.beam_skip.max(1);
        let usable = self.config.max_usable_range;

        scan.beams()
            .step_by(skip)
            .filter(|&(_, range)| scan.is_valid_range(range))
            .map(move |(angle, range)| {
                let hit = range <= usable && range < scan.range_max;
                let clipped = range.min(usable);
                let (sin_a, cos_a) = angle.sin_cos();
                let end = pose.transform_point(&Point2D::new(clipped * cos_a, clipped * sin_a));
                Beam { end, hit }
            })
    }

    /// Paint (or erase) one scan. Returns the number of beams traced.
    ///
    /// Rays are bounded by the usable range at the grid's resolution, so no
    /// clipped beam is ever cut short.
    pub fn integrate(
        &self,
        grid: &mut OccupancyGrid,
        scan: &LaserScan,
        pose: &Pose2D,
        evidence: Evidence,
    ) -> usize {
        let tracer = RayTracer::for_range(self.config.max_usable_range, grid.resolution());
        let origin = (pose.x, pose.y);
        let mut traced = 0;
        for beam in self.beams(scan, pose) {
            tracer.trace_ray(grid, origin, (beam.end.x, beam.end.y), beam.hit, evidence);
            traced += 1;
        }
        traced
    }
}

impl Default for ScanIntegrator {
    fn default() -> Self {
        Self::new(ScanIntegratorConfig::default())
    }
}
