//! Particle-filter SLAM engine.
//!
//! The rolling-window mapper drives the engine through [`SlamEngine`] and
//! never touches its internals beyond the borrowed [`EngineParts`].
//!
//! # Components
//!
//! - [`Particle`]: pose, weight, own grid, lineage handle
//! - [`ParticleFilter`]: Rao-Blackwellised filter over a shared history
//! - [`paint_lineage`]: rebuild a grid from a particle's retained history

mod particle;
mod particle_filter;

pub use particle::{Particle, paint_lineage};
pub use particle_filter::{ParticleFilter, ParticleFilterConfig};

use std::sync::Arc;

use crate::algorithms::localization::weights;
use crate::algorithms::mapping::{GridBounds, OccupancyGrid, ScanIntegrator};
use crate::core::types::{LaserScan, Pose2D};
use crate::engine::history::HistoryArena;
use crate::error::{Error, Result};

/// Mutable particles alongside the shared, read-only collaborators needed
/// to repaint them.
pub struct EngineParts<'a> {
    pub particles: &'a mut [Particle],
    pub history: &'a HistoryArena,
    pub integrator: &'a ScanIntegrator,
}

/// Engine contract used by the rolling-window mapper.
pub trait SlamEngine: Send {
    /// Whether [`initialize`](Self::initialize) has run.
    fn is_initialized(&self) -> bool;

    /// Seed every particle at `odom` with a grid over `bounds` and paint the
    /// first scan.
    fn initialize(
        &mut self,
        odom: Pose2D,
        scan: Arc<LaserScan>,
        timestamp_us: u64,
        bounds: GridBounds,
    ) -> Result<()>;

    /// Propagate, weight, record and paint one scan.
    ///
    /// Returns `false` when the motion since the last processed scan was
    /// too small and the scan was not integrated.
    fn process(&mut self, odom: Pose2D, scan: Arc<LaserScan>, timestamp_us: u64) -> Result<bool>;

    fn particles(&self) -> &[Particle];

    fn history(&self) -> &HistoryArena;

    fn history_mut(&mut self) -> &mut HistoryArena;

    fn parts_mut(&mut self) -> EngineParts<'_>;

    /// Rebuild every particle's own grid from its retained lineage and
    /// hand back an immutable copy of particle `index`'s grid.
    fn regenerate_in_place(&mut self, index: usize) -> Result<Arc<OccupancyGrid>>;

    /// Index of the highest-weight particle.
    fn best_index(&self) -> Result<usize> {
        self.particles()
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.weight.total_cmp(&b.weight))
            .map(|(i, _)| i)
            .ok_or(Error::EmptyParticleSet)
    }

    /// Entropy of the normalised particle weights.
    fn pose_entropy(&self) -> f64 {
        let w: Vec<f64> = self.particles().iter().map(|p| p.weight).collect();
        weights::entropy(&w)
    }
}
