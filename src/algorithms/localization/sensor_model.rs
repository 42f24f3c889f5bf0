//! Scan likelihood against a particle's own occupancy grid.
//!
//! Every filtered beam endpoint is looked up in the grid. A cell with hit
//! ratio `p` contributes `ln(p_floor + (1 - p_floor) * p)`; unknown cells
//! count as `p = 0.5`. The sum is divided by the observation gain to keep
//! weights from collapsing onto a single particle.

use serde::{Deserialize, Serialize};

use crate::algorithms::mapping::{OccupancyGrid, ScanIntegrator};
use crate::core::types::{LaserScan, Pose2D};

/// Configuration for the endpoint likelihood model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorModelConfig {
    /// Likelihood floor for an endpoint in a free cell.
    pub p_floor: f32,

    /// Divisor applied to the summed log-likelihood.
    ///
    /// Higher values smooth the weights. Typical: 3.0
    pub observation_gain: f32,
}

impl Default for SensorModelConfig {
    fn default() -> Self {
        Self {
            p_floor: 0.1,
            observation_gain: 3.0,
        }
    }
}

/// Trait for sensor models used in the particle filter.
pub trait SensorModel {
    /// Log-likelihood of `scan` taken at `pose` given `map`.
    fn log_likelihood(&self, scan: &LaserScan, pose: &Pose2D, map: &OccupancyGrid) -> f64;
}

/// Beam-endpoint likelihood model.
#[derive(Debug, Clone)]
pub struct EndpointModel {
    config: SensorModelConfig,
    integrator: ScanIntegrator,
}

impl EndpointModel {
    /// `integrator` supplies the beam filtering used for painting, so
    /// weighting sees exactly the endpoints the map was built from.
    pub fn new(config: SensorModelConfig, integrator: ScanIntegrator) -> Self {
        Self { config, integrator }
    }
}

impl SensorModel for EndpointModel {
    fn log_likelihood(&self, scan: &LaserScan, pose: &Pose2D, map: &OccupancyGrid) -> f64 {
        let floor = self.config.p_floor as f64;
        let sum: f64 = self
            .integrator
            .beams(scan, pose)
            .filter(|beam| beam.hit)
            .map(|beam| {
                let p = map.occupancy_at(beam.end.x, beam.end.y).unwrap_or(0.5) as f64;
                (floor + (1.0 - floor) * p).ln()
            })
            .sum();
        sum / self.config.observation_gain.max(1e-3) as f64
    }
}
