//! Bounded occupancy grid with hit/visit evidence.
//!
//! Each cell counts how many rays ended in it (`hits`) and how many rays
//! touched it at all (`visits`). The hit ratio is the occupancy estimate:
//!
//! ```text
//! P(occupied) = hits / visits        (visits > 0)
//! unknown                            (visits == 0)
//! ```
//!
//! Counters make every paint exactly reversible: erasing a scan with
//! [`Evidence::Remove`] subtracts what [`Evidence::Add`] added, leaving the
//! cell as if the scan was never integrated.

mod config;
mod export;

pub use config::{CellState, OccupancyGridConfig};

use super::GridBounds;
use crate::error::{Error, Result};

/// Evidence counters of one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell {
    pub hits: u32,
    pub visits: u32,
}

impl Cell {
    pub const UNKNOWN: Cell = Cell { hits: 0, visits: 0 };

    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.visits == 0
    }

    /// Hit ratio, `None` when never observed.
    #[inline]
    pub fn occupancy(&self) -> Option<f32> {
        if self.visits == 0 {
            None
        } else {
            Some(self.hits as f32 / self.visits as f32)
        }
    }
}

/// Direction of a paint operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    /// Integrate an observation
    Add,
    /// Retract an observation previously added
    Remove,
}

/// 2D occupancy grid over a fixed [`GridBounds`].
///
/// Row-major storage: index = row * width + column.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    config: OccupancyGridConfig,
    bounds: GridBounds,
    cells: Vec<Cell>,
}

fn allocate_cells(count: usize, limit: usize) -> Result<Vec<Cell>> {
    if count > limit {
        return Err(Error::Allocation { cells: count });
    }
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(count)
        .map_err(|_| Error::Allocation { cells: count })?;
    cells.resize(count, Cell::UNKNOWN);
    Ok(cells)
}

impl OccupancyGrid {
    /// Allocate an all-unknown grid covering `bounds`.
    pub fn try_new(config: OccupancyGridConfig, bounds: GridBounds) -> Result<Self> {
        let cells = allocate_cells(bounds.cell_count(), config.max_cells)?;
        Ok(Self {
            config,
            bounds,
            cells,
        })
    }

    /// Allocate an all-unknown grid with the same config over new bounds.
    pub fn blank(&self, bounds: GridBounds) -> Result<Self> {
        Self::try_new(self.config.clone(), bounds)
    }

    /// Copy of this grid re-laid over `bounds`.
    ///
    /// Cells in the overlap keep their evidence, cells outside the old
    /// bounds start unknown, cells outside the new bounds are dropped.
    /// Nothing is modified on failure.
    pub fn resized(&self, bounds: GridBounds) -> Result<Self> {
        let mut grid = self.blank(bounds)?;
        if let Some(overlap) = self.bounds.intersection(&bounds) {
            let span = overlap.width();
            for cy in overlap.min_cy()..overlap.max_cy() {
                let src = self.row_start(overlap.min_cx(), cy);
                let dst = grid.row_start(overlap.min_cx(), cy);
                grid.cells[dst..dst + span].copy_from_slice(&self.cells[src..src + span]);
            }
        }
        Ok(grid)
    }

    /// Flat index of lattice cell `(cx, cy)`, which must be inside.
    #[inline]
    fn row_start(&self, cx: i64, cy: i64) -> usize {
        let col = (cx - self.bounds.min_cx()) as usize;
        let row = (cy - self.bounds.min_cy()) as usize;
        row * self.bounds.width() + col
    }

    pub fn config(&self) -> &OccupancyGridConfig {
        &self.config
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn width(&self) -> usize {
        self.bounds.width()
    }

    pub fn height(&self) -> usize {
        self.bounds.height()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn resolution(&self) -> f32 {
        self.config.resolution
    }

    /// World coordinate of the bottom-left corner of cell (0, 0).
    pub fn origin(&self) -> (f32, f32) {
        self.bounds.origin(self.config.resolution)
    }

    /// Lattice cell holding a world coordinate (may lie outside the grid).
    #[inline]
    pub fn world_to_lattice(&self, x: f32, y: f32) -> (i64, i64) {
        (
            GridBounds::lattice_index(x, self.config.resolution),
            GridBounds::lattice_index(y, self.config.resolution),
        )
    }

    /// Local cell holding a world coordinate, `None` outside.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let (cx, cy) = self.world_to_lattice(x, y);
        self.bounds.to_local(cx, cy)
    }

    /// World coordinate of a local cell's center.
    #[inline]
    pub fn cell_to_world(&self, cx: usize, cy: usize) -> (f32, f32) {
        let (ox, oy) = self.origin();
        (
            ox + (cx as f32 + 0.5) * self.config.resolution,
            oy + (cy as f32 + 0.5) * self.config.resolution,
        )
    }

    /// Evidence at a local cell; unknown outside.
    #[inline]
    pub fn cell(&self, cx: usize, cy: usize) -> Cell {
        if cx < self.width() && cy < self.height() {
            self.cells[cy * self.width() + cx]
        } else {
            Cell::UNKNOWN
        }
    }

    /// Evidence at a lattice cell; unknown outside.
    #[inline]
    pub fn cell_at_lattice(&self, cx: i64, cy: i64) -> Cell {
        match self.bounds.to_local(cx, cy) {
            Some((x, y)) => self.cells[y * self.width() + x],
            None => Cell::UNKNOWN,
        }
    }

    /// Hit ratio at a world coordinate, `None` when unknown or outside.
    #[inline]
    pub fn occupancy_at(&self, x: f32, y: f32) -> Option<f32> {
        let (cx, cy) = self.world_to_lattice(x, y);
        self.cell_at_lattice(cx, cy).occupancy()
    }

    /// Binarised state of a local cell.
    pub fn get_state(&self, cx: usize, cy: usize) -> CellState {
        self.classify(self.cell(cx, cy))
    }

    #[inline]
    pub(crate) fn classify(&self, cell: Cell) -> CellState {
        match cell.occupancy() {
            None => CellState::Unknown,
            Some(p) if p > self.config.occupancy_threshold => CellState::Occupied,
            Some(_) => CellState::Free,
        }
    }

    /// Apply one observation to a lattice cell.
    ///
    /// Returns `false` when the cell lies outside the grid.
    #[inline]
    pub fn observe(&mut self, cx: i64, cy: i64, occupied: bool, evidence: Evidence) -> bool {
        let Some((x, y)) = self.bounds.to_local(cx, cy) else {
            return false;
        };
        let width = self.width();
        let cell = &mut self.cells[y * width + x];
        match evidence {
            Evidence::Add => {
                cell.visits = cell.visits.saturating_add(1);
                if occupied {
                    cell.hits = cell.hits.saturating_add(1);
                }
            }
            Evidence::Remove => {
                cell.visits = cell.visits.saturating_sub(1);
                if occupied {
                    cell.hits = cell.hits.saturating_sub(1);
                }
                cell.hits = cell.hits.min(cell.visits);
            }
        }
        true
    }

    /// Reset all cells to unknown.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::UNKNOWN);
    }

    /// Whether two grids hold identical evidence over identical bounds.
    pub fn same_evidence(&self, other: &OccupancyGrid) -> bool {
        self.bounds == other.bounds && self.cells == other.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(bounds: GridBounds) -> OccupancyGrid {
        let config = OccupancyGridConfig {
            resolution: 0.1,
            ..Default::default()
        };
        OccupancyGrid::try_new(config, bounds).unwrap()
    }

    #[test]
    fn test_world_to_cell_conversion() {
        let grid = grid(GridBounds::centered_on(0.0, 0.0, 10.0, 0.1));

        let (cx, cy) = grid.world_to_cell(0.0, 0.0).unwrap();
        assert_eq!(cx, 50);
        assert_eq!(cy, 50);

        let (wx, wy) = grid.cell_to_world(cx, cy);
        assert_relative_eq!(wx, 0.05, epsilon = 1e-4);
        assert_relative_eq!(wy, 0.05, epsilon = 1e-4);

        assert!(grid.world_to_cell(5.01, 0.0).is_none());
        assert!(grid.world_to_cell(-5.01, 0.0).is_none());
    }

    #[test]
    fn test_observe_and_classify() {
        let mut grid = grid(GridBounds::new(0, 0, 10, 10));
        assert_eq!(grid.get_state(3, 3), CellState::Unknown);

        grid.observe(3, 3, false, Evidence::Add);
        assert_eq!(grid.get_state(3, 3), CellState::Free);

        grid.observe(3, 3, true, Evidence::Add);
        assert_eq!(grid.cell(3, 3), Cell { hits: 1, visits: 2 });
        assert_eq!(grid.get_state(3, 3), CellState::Occupied);

        assert!(!grid.observe(10, 3, true, Evidence::Add));
    }

    #[test]
    fn test_remove_undoes_add() {
        let mut grid = grid(GridBounds::new(0, 0, 10, 10));
        grid.observe(1, 1, true, Evidence::Add);
        grid.observe(1, 1, false, Evidence::Add);
        grid.observe(1, 1, true, Evidence::Remove);
        assert_eq!(grid.cell(1, 1), Cell { hits: 0, visits: 1 });
        grid.observe(1, 1, false, Evidence::Remove);
        assert!(grid.cell(1, 1).is_unknown());

        // Extra removals saturate at unknown.
        grid.observe(1, 1, true, Evidence::Remove);
        assert!(grid.cell(1, 1).is_unknown());
    }

    #[test]
    fn test_resize_preserves_overlap() {
        let mut grid = grid(GridBounds::new(0, 0, 20, 20));
        grid.observe(15, 15, true, Evidence::Add);
        grid.observe(2, 2, false, Evidence::Add);

        let shifted = grid.resized(GridBounds::new(10, 10, 20, 20)).unwrap();
        assert_eq!(shifted.bounds(), GridBounds::new(10, 10, 20, 20));
        assert_eq!(shifted.cell_at_lattice(15, 15), Cell { hits: 1, visits: 1 });
        // Dropped outside the new bounds.
        assert!(shifted.cell_at_lattice(2, 2).is_unknown());
        // Newly exposed cells are unknown.
        assert!(shifted.cell_at_lattice(25, 25).is_unknown());
        // Source untouched.
        assert_eq!(grid.cell_at_lattice(2, 2), Cell { hits: 0, visits: 1 });
    }

    #[test]
    fn test_resize_without_overlap_is_blank() {
        let mut grid = grid(GridBounds::new(0, 0, 10, 10));
        grid.observe(5, 5, true, Evidence::Add);
        let moved = grid.resized(GridBounds::new(100, 100, 10, 10)).unwrap();
        assert_eq!(moved.count_cells(), (0, 100, 0));
    }

    #[test]
    fn test_allocation_limit() {
        let config = OccupancyGridConfig {
            resolution: 0.1,
            max_cells: 99,
            ..Default::default()
        };
        let result = OccupancyGrid::try_new(config, GridBounds::new(0, 0, 10, 10));
        assert!(matches!(result, Err(Error::Allocation { cells: 100 })));
    }
}
