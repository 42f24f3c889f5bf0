//! Rao-Blackwellised particle filter over a shared measurement history.
//!
//! Each processed scan runs:
//! 1. Predict: sample every particle through the odometry motion model
//! 2. Gate: skip integration until the platform moved or turned enough
//! 3. Weight: score the scan against each particle's own grid
//! 4. Record: append one history node per particle
//! 5. Paint: integrate the scan into each particle's grid
//! 6. Resample: low-variance resampling when Neff drops below threshold

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{EngineParts, Particle, SlamEngine, paint_lineage};
use crate::algorithms::localization::{
    EndpointModel, MotionModel, MotionModelConfig, NoiseGenerator, SensorModel,
    SensorModelConfig, weights,
};
use crate::algorithms::mapping::{
    Evidence, GridBounds, OccupancyGrid, OccupancyGridConfig, ScanIntegrator,
};
use crate::core::types::{LaserScan, Pose2D};
use crate::engine::history::{HistoryArena, IdAllocator};
use crate::error::{Error, Result};

/// Configuration for the particle filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleFilterConfig {
    /// Number of particles.
    pub particles: usize,

    /// Resample when Neff / particles falls below this ratio.
    ///
    /// Typical: 0.5
    pub resample_threshold: f64,

    /// Integrate a scan after this much travel (meters).
    pub linear_update: f32,

    /// Integrate a scan after this much rotation (radians).
    pub angular_update: f32,

    /// Integrate a scan after this much time regardless of motion
    /// (seconds). Negative disables.
    pub temporal_update_s: f32,

    /// Random seed (0 draws from OS entropy).
    pub seed: u64,

    /// Odometry noise coefficients.
    pub motion: MotionModelConfig,

    /// Scan likelihood parameters.
    pub sensor: SensorModelConfig,
}

impl Default for ParticleFilterConfig {
    fn default() -> Self {
        Self {
            particles: 30,
            resample_threshold: 0.5,
            linear_update: 1.0,
            angular_update: 0.5,
            temporal_update_s: -1.0,
            seed: 0,
            motion: MotionModelConfig::default(),
            sensor: SensorModelConfig::default(),
        }
    }
}

/// Motion accumulated since the last integrated scan.
#[derive(Debug, Default)]
struct MotionGate {
    linear: f32,
    angular: f32,
    last_integrated_us: u64,
}

/// Particle filter SLAM engine.
#[derive(Debug)]
pub struct ParticleFilter {
    config: ParticleFilterConfig,
    grid_config: OccupancyGridConfig,
    particles: Vec<Particle>,
    history: HistoryArena,
    integrator: ScanIntegrator,
    motion_model: MotionModel,
    sensor_model: EndpointModel,
    noise: NoiseGenerator,
    last_odom: Option<Pose2D>,
    gate: MotionGate,
    resample_count: u64,
}

impl ParticleFilter {
    pub fn new(
        config: ParticleFilterConfig,
        grid_config: OccupancyGridConfig,
        integrator: ScanIntegrator,
        ids: IdAllocator,
    ) -> Self {
        Self {
            motion_model: MotionModel::new(config.motion),
            sensor_model: EndpointModel::new(config.sensor, integrator.clone()),
            noise: NoiseGenerator::new(config.seed),
            config,
            grid_config,
            particles: Vec::new(),
            history: HistoryArena::new(ids),
            integrator,
            last_odom: None,
            gate: MotionGate::default(),
            resample_count: 0,
        }
    }

    pub fn config(&self) -> &ParticleFilterConfig {
        &self.config
    }

    /// Number of resampling steps so far.
    pub fn resample_count(&self) -> u64 {
        self.resample_count
    }

    fn gate_open(&mut self, delta: &Pose2D, timestamp_us: u64) -> bool {
        self.gate.linear += delta.x.hypot(delta.y);
        self.gate.angular += delta.theta.abs();

        let elapsed_s = timestamp_us.saturating_sub(self.gate.last_integrated_us) as f32 / 1e6;
        let temporal = self.config.temporal_update_s >= 0.0
            && elapsed_s >= self.config.temporal_update_s;

        let open = self.gate.linear >= self.config.linear_update
            || self.gate.angular >= self.config.angular_update
            || temporal;
        if open {
            self.gate = MotionGate {
                linear: 0.0,
                angular: 0.0,
                last_integrated_us: timestamp_us,
            };
        }
        open
    }

    fn update_weights(&mut self, scan: &LaserScan) {
        for particle in &mut self.particles {
            particle.log_weight += self
                .sensor_model
                .log_likelihood(scan, &particle.pose, &particle.map);
        }

        let log_weights: Vec<f64> = self.particles.iter().map(|p| p.log_weight).collect();
        let n = self.particles.len() as f64;
        match weights::normalize_log_weights(&log_weights) {
            Some(normalized) => {
                for (particle, w) in self.particles.iter_mut().zip(normalized) {
                    particle.weight = w;
                }
            }
            None => {
                log::warn!("All particles have zero likelihood, resetting to uniform weights");
                for particle in &mut self.particles {
                    particle.weight = 1.0 / n;
                    particle.log_weight = 0.0;
                }
            }
        }
    }

    fn record_and_paint(&mut self, scan: &Arc<LaserScan>, timestamp_us: u64) -> Result<()> {
        for particle in &mut self.particles {
            let node =
                self.history
                    .append(particle.lineage, particle.pose, scan.clone(), timestamp_us)?;
            if let Some(previous) = particle.lineage.replace(node) {
                self.history.release(previous)?;
            }
            self.integrator
                .integrate(&mut particle.map, scan, &particle.pose, Evidence::Add);
        }
        Ok(())
    }

    fn resample(&mut self) -> Result<()> {
        let n = self.particles.len();
        let w: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        let indices = weights::low_variance_indices(&w, self.noise.uniform_f64());

        let mut next = Vec::with_capacity(n);
        for i in indices {
            let mut particle = self.particles[i].clone();
            if let Some(node) = particle.lineage {
                self.history.acquire(node)?;
            }
            particle.weight = 1.0 / n as f64;
            particle.log_weight = 0.0;
            next.push(particle);
        }

        let previous = std::mem::replace(&mut self.particles, next);
        for particle in previous {
            if let Some(node) = particle.lineage {
                self.history.release(node)?;
            }
        }

        self.resample_count += 1;
        Ok(())
    }
}

impl SlamEngine for ParticleFilter {
    fn is_initialized(&self) -> bool {
        self.last_odom.is_some()
    }

    fn initialize(
        &mut self,
        odom: Pose2D,
        scan: Arc<LaserScan>,
        timestamp_us: u64,
        bounds: GridBounds,
    ) -> Result<()> {
        if self.config.particles == 0 {
            return Err(Error::EmptyParticleSet);
        }

        let grid = OccupancyGrid::try_new(self.grid_config.clone(), bounds)?;
        let weight = 1.0 / self.config.particles as f64;
        self.particles = (0..self.config.particles)
            .map(|_| Particle::new(odom, weight, grid.clone()))
            .collect();

        self.record_and_paint(&scan, timestamp_us)?;
        self.last_odom = Some(odom);
        self.gate.last_integrated_us = timestamp_us;

        log::info!(
            "Particle filter initialized: {} particles at ({:.2}, {:.2}, {:.2})",
            self.particles.len(),
            odom.x,
            odom.y,
            odom.theta
        );
        Ok(())
    }

    fn process(&mut self, odom: Pose2D, scan: Arc<LaserScan>, timestamp_us: u64) -> Result<bool> {
        if self.particles.is_empty() {
            return Err(Error::EmptyParticleSet);
        }
        let Some(last) = self.last_odom.replace(odom) else {
            return Err(Error::InvariantViolation(
                "process called before initialize".into(),
            ));
        };

        let delta = last.delta_to(&odom);
        for particle in &mut self.particles {
            particle.pose = self
                .motion_model
                .sample(&particle.pose, &delta, &mut self.noise);
        }

        if !self.gate_open(&delta, timestamp_us) {
            return Ok(false);
        }

        self.update_weights(&scan);
        self.record_and_paint(&scan, timestamp_us)?;

        let w: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        let neff = weights::effective_sample_size(&w);
        let threshold = self.config.resample_threshold * self.particles.len() as f64;
        if neff < threshold {
            log::debug!("Resampling (neff {:.1} < {:.1})", neff, threshold);
            self.resample()?;
        }

        Ok(true)
    }

    fn particles(&self) -> &[Particle] {
        &self.particles
    }

    fn history(&self) -> &HistoryArena {
        &self.history
    }

    fn history_mut(&mut self) -> &mut HistoryArena {
        &mut self.history
    }

    fn parts_mut(&mut self) -> EngineParts<'_> {
        EngineParts {
            particles: &mut self.particles,
            history: &self.history,
            integrator: &self.integrator,
        }
    }

    fn regenerate_in_place(&mut self, index: usize) -> Result<Arc<OccupancyGrid>> {
        if self.particles.is_empty() {
            return Err(Error::EmptyParticleSet);
        }
        if index >= self.particles.len() {
            return Err(Error::InvariantViolation(format!(
                "particle {} out of range",
                index
            )));
        }
        let mut published_painted = 0;
        for (i, particle) in self.particles.iter_mut().enumerate() {
            particle.map.clear();
            let painted = paint_lineage(
                &mut particle.map,
                &self.history,
                particle.lineage,
                &self.integrator,
            );
            if i == index {
                published_painted = painted;
            }
        }
        if published_painted == 0 {
            return Err(Error::EmptyHistory);
        }
        Ok(Arc::new(self.particles[index].map.clone()))
    }
}
