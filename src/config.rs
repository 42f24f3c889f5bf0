//! Daemon configuration.
//!
//! Loaded from TOML; every section and field falls back to its default.
//!
//! ```toml
//! [window]
//! size = 10.0
//! margin = 1.0
//! hysteresis = 3.5
//! placement = "directional"
//! retention = "window_plus_range"
//! generation = "side_buffer"
//!
//! [grid]
//! resolution = 0.05
//!
//! [laser]
//! max_range = 8.0
//! throttle_scans = 1
//!
//! [filter]
//! particles = 30
//!
//! [filter.motion]
//! srr = 0.1
//!
//! [publish]
//! period_s = 0.5
//! all_paths = false
//! snapshot_path = "/tmp/chala-map.pgm"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithms::mapping::{OccupancyGridConfig, ScanIntegratorConfig};
use crate::engine::MapperConfig;
use crate::engine::slam::ParticleFilterConfig;
use crate::engine::window::WindowConfig;
use crate::error::{Error, Result};
use crate::io::sim::SimConfig;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub grid: OccupancyGridConfig,
    pub laser: LaserConfig,
    pub filter: ParticleFilterConfig,
    pub publish: PublishConfig,
    pub simulation: SimConfig,
}

/// Range sensor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    /// Maximum range the sensor reports (meters).
    pub max_range: f32,

    /// Beams are clipped here when painting (meters).
    pub max_usable_range: f32,

    /// Use every N-th beam.
    pub beam_skip: usize,

    /// Process every N-th scan.
    pub throttle_scans: u32,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            max_range: 8.0,
            max_usable_range: 8.0,
            beam_skip: 1,
            throttle_scans: 1,
        }
    }
}

/// Publish path parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Publisher tick period (seconds).
    pub period_s: f32,

    /// Minimum time between full map regenerations (seconds).
    pub map_update_interval_s: f32,

    /// Publish this particle's map instead of the best one.
    pub particle: Option<usize>,

    /// Also publish every particle's trajectory with each new map.
    pub all_paths: bool,

    /// Write the last snapshot here as PGM at shutdown.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            period_s: 0.5,
            map_update_interval_s: 5.0,
            particle: None,
            all_paths: false,
            snapshot_path: None,
        }
    }
}

impl Config {
    /// Read, parse and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = basic_toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the mapper cannot run with.
    pub fn validate(&self) -> Result<()> {
        let resolution = self.grid.resolution;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(Error::Config(format!(
                "grid.resolution must be positive, got {}",
                resolution
            )));
        }
        let threshold = self.grid.occupancy_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(Error::Config(format!(
                "grid.occupancy_threshold must lie in (0, 1), got {}",
                threshold
            )));
        }

        self.window.validate(resolution)?;

        if self.laser.max_range.is_nan() || self.laser.max_range <= 0.0 {
            return Err(Error::Config(format!(
                "laser.max_range must be positive, got {}",
                self.laser.max_range
            )));
        }
        if self.laser.max_usable_range <= 0.0 || self.laser.max_usable_range > self.laser.max_range
        {
            return Err(Error::Config(format!(
                "laser.max_usable_range must lie in (0, {}], got {}",
                self.laser.max_range, self.laser.max_usable_range
            )));
        }
        if self.laser.beam_skip == 0 {
            return Err(Error::Config("laser.beam_skip must be at least 1".into()));
        }
        if self.laser.throttle_scans == 0 {
            return Err(Error::Config(
                "laser.throttle_scans must be at least 1".into(),
            ));
        }

        if self.filter.particles == 0 {
            return Err(Error::Config("filter.particles must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.filter.resample_threshold) {
            return Err(Error::Config(format!(
                "filter.resample_threshold must lie in [0, 1], got {}",
                self.filter.resample_threshold
            )));
        }

        if self.publish.period_s.is_nan() || self.publish.period_s <= 0.0 {
            return Err(Error::Config(format!(
                "publish.period_s must be positive, got {}",
                self.publish.period_s
            )));
        }
        Ok(())
    }

    pub fn integrator_config(&self) -> ScanIntegratorConfig {
        ScanIntegratorConfig {
            max_usable_range: self.laser.max_usable_range,
            beam_skip: self.laser.beam_skip,
        }
    }

    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            window: self.window.clone(),
            resolution: self.grid.resolution,
            max_range: self.laser.max_range,
            throttle_scans: self.laser.throttle_scans,
            map_update_interval_s: self.publish.map_update_interval_s,
            publish_particle: self.publish.particle,
            publish_all_paths: self.publish.all_paths,
        }
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_secs_f32(self.publish.period_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::window::{GenerationMode, Placement, RetentionMode};

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.window.size, 10.0);
        assert_eq!(config.window.placement, Placement::Directional);
        assert_eq!(config.window.hysteresis, 3.5);
        assert_eq!(config.window.retention, RetentionMode::WindowPlusRange);
        assert_eq!(config.window.generation, GenerationMode::SideBuffer);
        assert_eq!(config.grid.resolution, 0.05);
        assert_eq!(config.filter.particles, 30);
        assert_eq!(config.laser.throttle_scans, 1);
        assert!(!config.publish.all_paths);
    }

    #[test]
    fn test_sections_and_enums_parse() {
        let config = Config::from_toml(
            r#"
            [window]
            size = 12.0
            placement = "directional"
            hysteresis = 2.5
            retention = "window"
            generation = "incremental"

            [laser]
            max_range = 6.0
            max_usable_range = 5.0
            throttle_scans = 3

            [filter]
            particles = 12

            [filter.motion]
            srr = 0.05

            [publish]
            particle = 2
            all_paths = true
            snapshot_path = "/tmp/map.pgm"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.placement, Placement::Directional);
        assert_eq!(config.window.retention, RetentionMode::Window);
        assert_eq!(config.window.generation, GenerationMode::Incremental);
        assert_eq!(config.filter.particles, 12);
        assert_eq!(config.filter.motion.srr, 0.05);
        assert_eq!(config.publish.particle, Some(2));
        assert!(config.publish.all_paths);
        assert_eq!(
            config.publish.snapshot_path,
            Some(PathBuf::from("/tmp/map.pgm"))
        );

        let mapper = config.mapper_config();
        assert_eq!(mapper.throttle_scans, 3);
        assert!(mapper.publish_all_paths);
        assert_eq!(mapper.max_range, 6.0);
        assert_eq!(config.integrator_config().max_usable_range, 5.0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for toml in [
            "[grid]\nresolution = 0.0",
            "[grid]\noccupancy_threshold = 1.0",
            "[window]\nmargin = 5.0",
            "[window]\nsize = -1.0",
            "[window]\nhysteresis = -1.0",
            "[laser]\nthrottle_scans = 0",
            "[laser]\nmax_usable_range = 9.0",
            "[filter]\nparticles = 0",
            "[publish]\nperiod_s = 0.0",
        ] {
            assert!(
                matches!(Config::from_toml(toml), Err(Error::Config(_))),
                "accepted: {}",
                toml
            );
        }
    }

    #[test]
    fn test_unknown_mode_is_config_error() {
        let result = Config::from_toml("[window]\ngeneration = \"magic\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chala.toml");
        fs::write(&path, "[filter]\nparticles = 7\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().filter.particles, 7);
        assert!(matches!(
            Config::load(dir.path().join("missing.toml")),
            Err(Error::Io(_))
        ));
    }
}
