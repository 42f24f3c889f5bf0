//! Immutable map snapshots.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::algorithms::mapping::OccupancyGrid;
use crate::error::{Error, Result};

/// Binarised copy of one grid generation.
///
/// Cells are row-major from the bottom-left corner:
/// 0 = free, 100 = occupied, 255 = unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSnapshot {
    resolution: f32,
    origin_x: f32,
    origin_y: f32,
    width: usize,
    height: usize,
    cells: Vec<u8>,
    generation: u64,
    timestamp_us: u64,
}

impl MapSnapshot {
    /// Build a snapshot, rejecting a buffer that disagrees with its size.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolution: f32,
        origin: (f32, f32),
        width: usize,
        height: usize,
        cells: Vec<u8>,
        generation: u64,
        timestamp_us: u64,
    ) -> Result<Self> {
        if cells.len() != width * height {
            return Err(Error::InvariantViolation(format!(
                "snapshot buffer of {} cells for a {}x{} grid",
                cells.len(),
                width,
                height
            )));
        }
        Ok(Self {
            resolution,
            origin_x: origin.0,
            origin_y: origin.1,
            width,
            height,
            cells,
            generation,
            timestamp_us,
        })
    }

    /// Binarise `grid` as generation `generation`.
    pub fn from_grid(grid: &OccupancyGrid, generation: u64, timestamp_us: u64) -> Result<Self> {
        Self::new(
            grid.resolution(),
            grid.origin(),
            grid.width(),
            grid.height(),
            grid.binarize(),
            generation,
            timestamp_us,
        )
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// World coordinate of the bottom-left corner of cell (0, 0).
    pub fn origin(&self) -> (f32, f32) {
        (self.origin_x, self.origin_y)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Count cells by value as `(free, unknown, occupied)`.
    pub fn count_cells(&self) -> (usize, usize, usize) {
        self.cells
            .iter()
            .fold((0, 0, 0), |(free, unknown, occupied), &c| match c {
                0 => (free + 1, unknown, occupied),
                100 => (free, unknown, occupied + 1),
                _ => (free, unknown + 1, occupied),
            })
    }

    /// Write as a binary PGM image, top row first.
    ///
    /// Free is white (255), occupied black (0), unknown gray (205).
    pub fn write_pgm<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut pixels = Vec::with_capacity(self.cells.len());
        for row in self.cells.chunks(self.width.max(1)).rev() {
            pixels.extend(row.iter().map(|&c| match c {
                0 => 255u8,
                100 => 0u8,
                _ => 205u8,
            }));
        }

        let mut file = BufWriter::new(File::create(path.as_ref())?);
        writeln!(file, "P5")?;
        writeln!(
            file,
            "# resolution {} origin {} {}",
            self.resolution, self.origin_x, self.origin_y
        )?;
        writeln!(file, "{} {}", self.width, self.height)?;
        writeln!(file, "255")?;
        file.write_all(&pixels)?;
        file.flush()?;

        log::info!(
            "Wrote {}x{} map (generation {}) to {}",
            self.width,
            self.height,
            self.generation,
            path.as_ref().display()
        );
        Ok(())
    }
}
