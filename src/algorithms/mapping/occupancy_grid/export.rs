//! Export functionality for occupancy grids.

use super::OccupancyGrid;
use super::config::CellState;
use crate::core::types::Point2D;

impl OccupancyGrid {
    /// Binarise into a row-major buffer of `0` free, `100` occupied,
    /// `255` unknown.
    pub fn binarize(&self) -> Vec<u8> {
        self.cells()
            .iter()
            .map(|&cell| self.classify(cell).to_byte())
            .collect()
    }

    /// Count cells by state as `(free, unknown, occupied)`.
    pub fn count_cells(&self) -> (usize, usize, usize) {
        let mut free = 0;
        let mut unknown = 0;
        let mut occupied = 0;

        for &cell in self.cells() {
            match self.classify(cell) {
                CellState::Free => free += 1,
                CellState::Unknown => unknown += 1,
                CellState::Occupied => occupied += 1,
            }
        }

        (free, unknown, occupied)
    }

    /// Get all occupied cell centers as world-coordinate points.
    pub fn occupied_points(&self) -> Vec<Point2D> {
        let mut points = Vec::new();

        for cy in 0..self.height() {
            for cx in 0..self.width() {
                if self.get_state(cx, cy) == CellState::Occupied {
                    let (x, y) = self.cell_to_world(cx, cy);
                    points.push(Point2D::new(x, y));
                }
            }
        }

        points
    }
}

#[cfg(test)]
mod tests {
    use crate::algorithms::mapping::{Evidence, GridBounds, OccupancyGrid, OccupancyGridConfig};

    #[test]
    fn test_binarize_values() {
        let config = OccupancyGridConfig {
            resolution: 0.5,
            ..Default::default()
        };
        let mut grid = OccupancyGrid::try_new(config, GridBounds::new(0, 0, 3, 1)).unwrap();
        grid.observe(0, 0, false, Evidence::Add);
        grid.observe(1, 0, true, Evidence::Add);

        assert_eq!(grid.binarize(), vec![0, 100, 255]);
        assert_eq!(grid.count_cells(), (1, 1, 1));

        let points = grid.occupied_points();
        assert_eq!(points.len(), 1);
        assert!((points[0].x - 0.75).abs() < 1e-5);
    }
}
