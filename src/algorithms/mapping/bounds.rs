//! Window bounds on the world-anchored cell lattice.

/// Rectangle of whole cells, `[min_cx, min_cx + width) × [min_cy, min_cy + height)`.
///
/// Cell `(i, j)` of the lattice covers world
/// `[i * res, (i + 1) * res) × [j * res, (j + 1) * res)`. Keeping bounds in
/// lattice units makes every window snap to the resolution grid and every
/// shift an integer number of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridBounds {
    min_cx: i64,
    min_cy: i64,
    width: usize,
    height: usize,
}

impl GridBounds {
    pub fn new(min_cx: i64, min_cy: i64, width: usize, height: usize) -> Self {
        Self {
            min_cx,
            min_cy,
            width,
            height,
        }
    }

    /// Square window of `size_m` meters whose center cell holds `(x, y)`.
    pub fn centered_on(x: f32, y: f32, size_m: f32, resolution: f32) -> Self {
        let cells = Self::cells_for_extent(size_m, resolution);
        let half = (cells / 2) as i64;
        Self {
            min_cx: Self::lattice_index(x, resolution) - half,
            min_cy: Self::lattice_index(y, resolution) - half,
            width: cells,
            height: cells,
        }
    }

    /// Number of whole cells spanning `extent_m`, at least one.
    #[inline]
    pub fn cells_for_extent(extent_m: f32, resolution: f32) -> usize {
        ((extent_m / resolution).round() as usize).max(1)
    }

    /// Lattice index of a world coordinate.
    #[inline]
    pub fn lattice_index(value: f32, resolution: f32) -> i64 {
        (value / resolution).floor() as i64
    }

    #[inline]
    pub fn min_cx(&self) -> i64 {
        self.min_cx
    }

    #[inline]
    pub fn min_cy(&self) -> i64 {
        self.min_cy
    }

    /// One past the last column.
    #[inline]
    pub fn max_cx(&self) -> i64 {
        self.min_cx + self.width as i64
    }

    /// One past the last row.
    #[inline]
    pub fn max_cy(&self) -> i64 {
        self.min_cy + self.height as i64
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// World coordinate of the bottom-left corner.
    #[inline]
    pub fn origin(&self, resolution: f32) -> (f32, f32) {
        (
            self.min_cx as f32 * resolution,
            self.min_cy as f32 * resolution,
        )
    }

    /// World extent as `(xmin, ymin, xmax, ymax)`.
    pub fn world_extent(&self, resolution: f32) -> (f32, f32, f32, f32) {
        (
            self.min_cx as f32 * resolution,
            self.min_cy as f32 * resolution,
            self.max_cx() as f32 * resolution,
            self.max_cy() as f32 * resolution,
        )
    }

    #[inline]
    pub fn contains_cell(&self, cx: i64, cy: i64) -> bool {
        cx >= self.min_cx && cx < self.max_cx() && cy >= self.min_cy && cy < self.max_cy()
    }

    /// Local `(column, row)` of a lattice cell, if inside.
    #[inline]
    pub fn to_local(&self, cx: i64, cy: i64) -> Option<(usize, usize)> {
        if self.contains_cell(cx, cy) {
            Some(((cx - self.min_cx) as usize, (cy - self.min_cy) as usize))
        } else {
            None
        }
    }

    /// Smallest distance from `(x, y)` to any edge; negative when outside.
    pub fn edge_clearance(&self, x: f32, y: f32, resolution: f32) -> f32 {
        let (xmin, ymin, xmax, ymax) = self.world_extent(resolution);
        (x - xmin).min(xmax - x).min(y - ymin).min(ymax - y)
    }

    /// Whether `(x, y)` lies inside with at least `margin` to every edge.
    #[inline]
    pub fn contains_with_margin(&self, x: f32, y: f32, resolution: f32, margin: f32) -> bool {
        self.edge_clearance(x, y, resolution) >= margin
    }

    /// Whether `(x, y)` lies inside the bounds grown by `pad` on every side.
    #[inline]
    pub fn contains_padded(&self, x: f32, y: f32, resolution: f32, pad: f32) -> bool {
        self.edge_clearance(x, y, resolution) >= -pad
    }

    /// Overlap of two bounds, if any.
    pub fn intersection(&self, other: &GridBounds) -> Option<GridBounds> {
        let min_cx = self.min_cx.max(other.min_cx);
        let min_cy = self.min_cy.max(other.min_cy);
        let max_cx = self.max_cx().min(other.max_cx());
        let max_cy = self.max_cy().min(other.max_cy());
        if max_cx <= min_cx || max_cy <= min_cy {
            return None;
        }
        Some(GridBounds::new(
            min_cx,
            min_cy,
            (max_cx - min_cx) as usize,
            (max_cy - min_cy) as usize,
        ))
    }
}
