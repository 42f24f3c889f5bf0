//! Uniform grid resizing across the particle set.
//!
//! Every particle's grid moves to the same bounds in one pass. New buffers
//! are allocated for all particles first; only when every allocation
//! succeeded are they committed. A failed allocation leaves every grid
//! untouched.

use crate::algorithms::mapping::{GridBounds, OccupancyGrid};
use crate::engine::slam::Particle;
use crate::error::{Error, Result};

/// Summary of a committed resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeReport {
    pub old: GridBounds,
    pub new: GridBounds,
    pub particles: usize,
    /// Cells per grid carried over from the old bounds.
    pub preserved_cells: usize,
}

/// Move every particle's grid to `bounds`, copying the overlap.
pub fn resize_all(particles: &mut [Particle], bounds: GridBounds) -> Result<ResizeReport> {
    let old = verify_uniform(particles)?;

    let staged = particles
        .iter()
        .map(|p| p.map.resized(bounds))
        .collect::<Result<Vec<OccupancyGrid>>>()?;

    for (particle, grid) in particles.iter_mut().zip(staged) {
        particle.map = grid;
    }

    let new = verify_uniform(particles)?;
    if new != bounds {
        return Err(Error::InvariantViolation(format!(
            "resize committed {:?} instead of {:?}",
            new, bounds
        )));
    }

    Ok(ResizeReport {
        old,
        new,
        particles: particles.len(),
        preserved_cells: old.intersection(&new).map_or(0, |o| o.cell_count()),
    })
}

/// Check every particle's grid shares bounds and resolution.
///
/// Returns the common bounds.
pub fn verify_uniform(particles: &[Particle]) -> Result<GridBounds> {
    let first = particles.first().ok_or(Error::EmptyParticleSet)?;
    let bounds = first.map.bounds();
    let resolution = first.map.resolution();

    for (i, particle) in particles.iter().enumerate().skip(1) {
        if particle.map.bounds() != bounds || particle.map.resolution() != resolution {
            return Err(Error::InvariantViolation(format!(
                "particle {} grid {:?} differs from {:?}",
                i,
                particle.map.bounds(),
                bounds
            )));
        }
    }
    Ok(bounds)
}
