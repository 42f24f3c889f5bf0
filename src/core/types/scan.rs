//! Polar laser scan.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One planar range scan in the sensor frame.
///
/// Beam `i` points at `angle_min + i * angle_increment`. Returns outside
/// `(range_min, range_max]` or non-finite values carry no obstacle evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    /// Angle of the first beam (radians).
    pub angle_min: f32,
    /// Angle of the last beam (radians).
    pub angle_max: f32,
    /// Angular step between consecutive beams (radians).
    pub angle_increment: f32,
    /// Minimum valid range (meters).
    pub range_min: f32,
    /// Maximum range the sensor reports (meters).
    pub range_max: f32,
    /// Measured ranges (meters).
    pub ranges: Vec<f32>,
}

impl LaserScan {
    pub fn new(
        angle_min: f32,
        angle_max: f32,
        angle_increment: f32,
        range_min: f32,
        range_max: f32,
        ranges: Vec<f32>,
    ) -> Self {
        Self {
            angle_min,
            angle_max,
            angle_increment,
            range_min,
            range_max,
            ranges,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Angle of beam `index` in the sensor frame.
    #[inline]
    pub fn angle_at(&self, index: usize) -> f32 {
        self.angle_min + index as f32 * self.angle_increment
    }

    /// Whether a range reading is a usable return.
    #[inline]
    pub fn is_valid_range(&self, range: f32) -> bool {
        range.is_finite() && range > self.range_min && range <= self.range_max
    }

    /// Iterate `(angle, range)` over every beam, valid or not.
    pub fn beams(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.ranges
            .iter()
            .enumerate()
            .map(|(i, &r)| (self.angle_at(i), r))
    }

    /// Check the angular parameters agree with the beam count.
    pub fn validate(&self) -> Result<()> {
        if self.ranges.is_empty() {
            return Err(Error::InvalidScan("scan has no beams".into()));
        }
        if self.range_max.is_nan() || self.range_max <= self.range_min {
            return Err(Error::InvalidScan(format!(
                "range_max {} must exceed range_min {}",
                self.range_max, self.range_min
            )));
        }
        if self.ranges.len() > 1 {
            if self.angle_increment == 0.0 || !self.angle_increment.is_finite() {
                return Err(Error::InvalidScan("angle_increment must be non-zero".into()));
            }
            let expected = (self.angle_max - self.angle_min) / self.angle_increment + 1.0;
            if (expected - self.ranges.len() as f32).abs() > 1.5 {
                return Err(Error::InvalidScan(format!(
                    "{} beams but angles span {:.1} increments",
                    self.ranges.len(),
                    expected
                )));
            }
        }
        Ok(())
    }
}
