//! Particle state and lineage painting.

use crate::algorithms::mapping::{Evidence, OccupancyGrid, ScanIntegrator};
use crate::core::types::Pose2D;
use crate::engine::history::{HistoryArena, NodeIdx};

/// One pose hypothesis with its own map.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Hypothesized pose in the map frame.
    pub pose: Pose2D,
    /// Accumulated log-weight since the last resample.
    pub log_weight: f64,
    /// Normalised weight.
    pub weight: f64,
    /// Exclusively owned occupancy grid.
    pub map: OccupancyGrid,
    /// Newest history node of this particle's trajectory.
    pub lineage: Option<NodeIdx>,
}

impl Particle {
    pub fn new(pose: Pose2D, weight: f64, map: OccupancyGrid) -> Self {
        Self {
            pose,
            log_weight: 0.0,
            weight,
            map,
            lineage: None,
        }
    }

    /// Poses along this particle's lineage, oldest first.
    pub fn trajectory(&self, history: &HistoryArena) -> Vec<Pose2D> {
        let mut poses: Vec<Pose2D> = history
            .lineage(self.lineage)
            .map(|(_, node)| *node.pose())
            .collect();
        poses.reverse();
        poses
    }
}

/// Paint every retained node of a lineage into `grid`.
///
/// Discarded nodes and nodes whose payload was dropped are skipped.
/// Returns the number of nodes painted.
pub fn paint_lineage(
    grid: &mut OccupancyGrid,
    history: &HistoryArena,
    leaf: Option<NodeIdx>,
    integrator: &ScanIntegrator,
) -> usize {
    let mut painted = 0;
    for (_, node) in history.lineage(leaf) {
        if !node.is_retained() {
            continue;
        }
        if let Some(scan) = node.scan() {
            integrator.integrate(grid, scan, node.pose(), Evidence::Add);
            painted += 1;
        }
    }
    painted
}
