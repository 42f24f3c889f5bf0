//! Map generation from retained history.
//!
//! The engine paints every new scan into every particle's grid as it
//! arrives. What happens to history that retention discards depends on
//! the [`GenerationMode`]:
//!
//! | Mode          | On discard                      | Full rebuild            |
//! |---------------|---------------------------------|-------------------------|
//! | `EngineNative`| nothing (retention is `Keep`)   | never                   |
//! | `Incremental` | un-paint the discarded scans    | never                   |
//! | `SideBuffer`  | nothing                         | into fresh grids, swap  |
//! | `Delegated`   | nothing                         | engine, in place        |
//!
//! Whatever the mode, the published map is an `Arc` handed over by value;
//! the publish path never sees a grid that is still being written.

use std::collections::HashSet;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::RetentionReport;
use crate::algorithms::mapping::{Evidence, OccupancyGrid};
use crate::engine::history::NodeIdx;
use crate::engine::slam::{EngineParts, Particle, SlamEngine, paint_lineage};
use crate::error::{Error, Result};

/// How particle grids follow retention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Keep the engine's incrementally painted grids; nothing is forgotten.
    EngineNative,
    /// Erase discarded scans from the grids they were painted into.
    ///
    /// Cheap, but a scan discarded after several resizes may have painted
    /// cells that were dropped and later re-exposed, so edges drift.
    Incremental,
    /// Rebuild every grid from retained history into fresh buffers, then
    /// swap them in together.
    #[default]
    SideBuffer,
    /// Ask the engine to rebuild its own grids and hand back an immutable
    /// copy of the published one.
    Delegated,
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationMode::EngineNative => write!(f, "engine_native"),
            GenerationMode::Incremental => write!(f, "incremental"),
            GenerationMode::SideBuffer => write!(f, "side_buffer"),
            GenerationMode::Delegated => write!(f, "delegated"),
        }
    }
}

/// Keeps particle grids consistent with retained history.
#[derive(Debug, Clone)]
pub struct MapGenerator {
    mode: GenerationMode,
    interval_us: u64,
    last_rebuild_us: Option<u64>,
    rebuilds: u64,
}

impl MapGenerator {
    /// `interval_s` spaces full rebuilds; resizes always force one.
    pub fn new(mode: GenerationMode, interval_s: f32) -> Self {
        Self {
            mode,
            interval_us: (interval_s.max(0.0) * 1e6) as u64,
            last_rebuild_us: None,
            rebuilds: 0,
        }
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Number of map updates produced so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// React to a retention pass. Returns the number of scans un-painted.
    pub fn after_retention<E: SlamEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        report: &RetentionReport,
    ) -> Result<usize> {
        if self.mode != GenerationMode::Incremental || report.newly_discarded.is_empty() {
            return Ok(0);
        }

        let discarded: HashSet<NodeIdx> = report.newly_discarded.iter().copied().collect();
        let EngineParts {
            particles,
            history,
            integrator,
        } = engine.parts_mut();
        let mut erased = 0;

        for particle in particles.iter_mut() {
            for (idx, node) in history.lineage(particle.lineage) {
                if !discarded.contains(&idx) {
                    continue;
                }
                if let Some(scan) = node.scan() {
                    integrator.integrate(&mut particle.map, scan, node.pose(), Evidence::Remove);
                    erased += 1;
                }
            }
        }

        log::debug!("Incremental update erased {} scans", erased);
        Ok(erased)
    }

    /// Produce the grid of particle `index` for publication when an update
    /// is due.
    ///
    /// Returns `None` when `forced` is unset and the update interval has
    /// not elapsed.
    pub fn regenerate<E: SlamEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        index: usize,
        timestamp_us: u64,
        forced: bool,
    ) -> Result<Option<Arc<OccupancyGrid>>> {
        let due = forced
            || self
                .last_rebuild_us
                .is_none_or(|last| timestamp_us.saturating_sub(last) >= self.interval_us);
        if !due {
            return Ok(None);
        }

        let grid = match self.mode {
            GenerationMode::EngineNative | GenerationMode::Incremental => {
                published_copy(engine.particles(), index)?
            }
            GenerationMode::SideBuffer => {
                rebuild_side_buffers(engine, index)?;
                published_copy(engine.particles(), index)?
            }
            GenerationMode::Delegated => engine.regenerate_in_place(index)?,
        };

        self.last_rebuild_us = Some(timestamp_us);
        self.rebuilds += 1;
        Ok(Some(grid))
    }
}

fn published_copy(particles: &[Particle], index: usize) -> Result<Arc<OccupancyGrid>> {
    if particles.is_empty() {
        return Err(Error::EmptyParticleSet);
    }
    particles
        .get(index)
        .map(|p| Arc::new(p.map.clone()))
        .ok_or_else(|| Error::InvariantViolation(format!("particle {} out of range", index)))
}

/// Rebuild every particle's grid from retained history, then swap all.
///
/// Fails with [`Error::EmptyHistory`] before swapping when particle
/// `index` has nothing left to paint.
fn rebuild_side_buffers<E: SlamEngine + ?Sized>(engine: &mut E, index: usize) -> Result<()> {
    let EngineParts {
        particles,
        history,
        integrator,
    } = engine.parts_mut();
    if particles.is_empty() {
        return Err(Error::EmptyParticleSet);
    }

    let mut staged = Vec::with_capacity(particles.len());
    for (i, particle) in particles.iter().enumerate() {
        let mut grid = particle.map.blank(particle.map.bounds())?;
        let painted = paint_lineage(&mut grid, history, particle.lineage, integrator);
        if i == index && painted == 0 {
            return Err(Error::EmptyHistory);
        }
        staged.push(grid);
    }

    for (particle, grid) in particles.iter_mut().zip(staged) {
        particle.map = grid;
    }
    Ok(())
}
