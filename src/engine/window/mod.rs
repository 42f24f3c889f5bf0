//! Rolling-window map management.
//!
//! Keeps every particle's grid bounded to a window that follows the
//! platform:
//!
//! ```text
//! pose ─▶ WindowTracker ──stable──▶ done
//!               │
//!          resize needed
//!               ▼
//!         GridResizer (all particles, all-or-nothing)
//!               ▼
//!         RetentionPolicy (discard history outside the window)
//!               ▼
//!         MapGenerator (un-paint or rebuild from retained history)
//! ```
//!
//! Retention and generation strategies are enums chosen once at startup.

mod generator;
mod resizer;
mod retention;
mod tracker;

pub use generator::{GenerationMode, MapGenerator};
pub use resizer::{ResizeReport, resize_all, verify_uniform};
pub use retention::{RetentionMode, RetentionPolicy, RetentionReport};
pub use tracker::{BoundsCheck, Placement, WindowTracker};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Window geometry and strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Side length of the square window (meters).
    pub size: f32,

    /// Resize once the pose is closer than this to any edge (meters).
    pub margin: f32,

    /// How far ahead of the pose a directional resize centers the new
    /// window (meters). Capped at [`WindowConfig::max_shift`].
    pub hysteresis: f32,

    /// Where a resized window is centered.
    pub placement: Placement,

    /// Which history stays usable for map building.
    pub retention: RetentionMode,

    /// How the grids are rebuilt from retained history.
    pub generation: GenerationMode,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: 10.0,
            margin: 1.0,
            hysteresis: 3.5,
            placement: Placement::Directional,
            retention: RetentionMode::WindowPlusRange,
            generation: GenerationMode::SideBuffer,
        }
    }
}

impl WindowConfig {
    /// Half of the window's actual extent once snapped to `resolution`.
    pub fn half_extent(&self, resolution: f32) -> f32 {
        crate::algorithms::mapping::GridBounds::cells_for_extent(self.size, resolution) as f32
            * resolution
            / 2.0
    }

    /// Largest directional push that still keeps `margin` behind the pose.
    pub fn max_shift(&self, resolution: f32) -> f32 {
        (self.half_extent(resolution) - self.margin - 2.0 * resolution).max(0.0)
    }

    pub fn validate(&self, resolution: f32) -> Result<()> {
        if self.size.is_nan() || self.size <= 0.0 {
            return Err(Error::Config(format!(
                "window.size must be positive, got {}",
                self.size
            )));
        }
        if self.margin < 0.0 {
            return Err(Error::Config(format!(
                "window.margin must not be negative, got {}",
                self.margin
            )));
        }
        let half = self.half_extent(resolution);
        if self.margin >= half - resolution {
            return Err(Error::Config(format!(
                "window.margin {} leaves no room in a window of half-extent {}",
                self.margin, half
            )));
        }
        if self.hysteresis.is_nan() || self.hysteresis < 0.0 {
            return Err(Error::Config(format!(
                "window.hysteresis must not be negative, got {}",
                self.hysteresis
            )));
        }
        Ok(())
    }
}
