//! Window boundary tracking.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::WindowConfig;
use crate::algorithms::mapping::GridBounds;
use crate::core::types::Pose2D;

/// Where a resized window is centered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Center the new window on the pose.
    Centered,
    /// Push the new window ahead of the pose on every axis whose edge
    /// triggered the resize, so forward motion buys more travel per resize.
    #[default]
    Directional,
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Placement::Centered => write!(f, "centered"),
            Placement::Directional => write!(f, "directional"),
        }
    }
}

/// Outcome of a bounds check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsCheck {
    /// Pose keeps the margin to every edge.
    Stable,
    /// Grids must move to these bounds.
    ResizeNeeded(GridBounds),
}

/// Holds the current window and decides when it must move.
#[derive(Debug, Clone)]
pub struct WindowTracker {
    config: WindowConfig,
    resolution: f32,
    bounds: Option<GridBounds>,
    resize_count: u64,
}

impl WindowTracker {
    pub fn new(config: WindowConfig, resolution: f32) -> Self {
        Self {
            config,
            resolution,
            bounds: None,
            resize_count: 0,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Current window, `None` before the map is initialised.
    pub fn bounds(&self) -> Option<GridBounds> {
        self.bounds
    }

    /// Number of committed resizes, initialisation excluded.
    pub fn resize_count(&self) -> u64 {
        self.resize_count
    }

    /// Check the pose against the current window.
    ///
    /// With no window yet, always asks for one centered on the pose.
    pub fn check_bounds(&self, pose: &Pose2D) -> BoundsCheck {
        let Some(current) = self.bounds else {
            return BoundsCheck::ResizeNeeded(self.window_at(pose.x, pose.y));
        };

        let margin = self.config.margin;
        if current.contains_with_margin(pose.x, pose.y, self.resolution, margin) {
            return BoundsCheck::Stable;
        }

        let (cx, cy) = match self.config.placement {
            Placement::Centered => (pose.x, pose.y),
            Placement::Directional => {
                let push = self
                    .config
                    .hysteresis
                    .min(self.config.max_shift(self.resolution));
                let (xmin, ymin, xmax, ymax) = current.world_extent(self.resolution);
                (
                    pushed(pose.x, xmin, xmax, margin, push),
                    pushed(pose.y, ymin, ymax, margin, push),
                )
            }
        };

        BoundsCheck::ResizeNeeded(self.window_at(cx, cy))
    }

    fn window_at(&self, x: f32, y: f32) -> GridBounds {
        GridBounds::centered_on(x, y, self.config.size, self.resolution)
    }

    /// Adopt `bounds` as the current window.
    pub fn commit(&mut self, bounds: GridBounds) {
        if self.bounds.is_some() {
            self.resize_count += 1;
        }
        self.bounds = Some(bounds);
    }
}

/// New center coordinate along one axis.
fn pushed(value: f32, min: f32, max: f32, margin: f32, push: f32) -> f32 {
    if max - value < margin {
        value + push
    } else if value - min < margin {
        value - push
    } else {
        value
    }
}
