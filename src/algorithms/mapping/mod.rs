//! Occupancy grid mapping.
//!
//! # Components
//!
//! - [`GridBounds`]: window rectangle in whole cells on a world-anchored lattice
//! - [`OccupancyGrid`]: hit/visit evidence over one [`GridBounds`]
//! - [`RayTracer`]: Bresenham traversal painting free space and endpoints
//! - [`ScanIntegrator`]: paints (or erases) one scan taken at one pose
//!
//! Every cell index used by the tracer is a *lattice* index,
//! `floor(world / resolution)`, shared by all grids of the same
//! resolution. Two grids with different bounds therefore agree exactly on
//! which cells a ray touches, which is what lets a resize copy the overlap
//! verbatim and lets incremental erasing undo an earlier paint.

mod bounds;
mod integrator;
mod occupancy_grid;
mod ray_tracer;

pub use bounds::GridBounds;
pub use integrator::{Beam, ScanIntegrator, ScanIntegratorConfig};
pub use occupancy_grid::{Cell, CellState, Evidence, OccupancyGrid, OccupancyGridConfig};
pub use ray_tracer::RayTracer;
