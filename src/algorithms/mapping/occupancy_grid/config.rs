//! Occupancy grid configuration.

use serde::{Deserialize, Serialize};

/// Binarised state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Never observed
    Unknown,
    /// Observed, hit ratio below the occupancy threshold
    Free,
    /// Observed, hit ratio above the occupancy threshold
    Occupied,
}

impl CellState {
    /// Value in an exported map buffer.
    #[inline]
    pub fn to_byte(self) -> u8 {
        match self {
            CellState::Free => 0,
            CellState::Occupied => 100,
            CellState::Unknown => 255,
        }
    }
}

/// Configuration for occupancy grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyGridConfig {
    /// Cell size in meters.
    pub resolution: f32,

    /// Hit ratio at which an observed cell counts as occupied.
    ///
    /// Typical: 0.25
    pub occupancy_threshold: f32,

    /// Upper bound on cells in a single grid.
    ///
    /// Allocations beyond this fail with `Error::Allocation`.
    pub max_cells: usize,
}

impl Default for OccupancyGridConfig {
    fn default() -> Self {
        Self {
            resolution: 0.05, // 5cm cells
            occupancy_threshold: 0.25,
            max_cells: 16_000_000, // 200m x 200m at 5cm
        }
    }
}
