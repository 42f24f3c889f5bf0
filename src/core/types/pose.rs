//! Pose and point types for planar SLAM.

use serde::{Deserialize, Serialize};

use super::Timestamped;
use crate::core::math::{angle_lerp, normalize_angle};

/// A 2D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Platform pose: position (x, y) in meters and heading theta in radians.
///
/// Theta is kept normalized to [-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose with theta normalized to [-π, π].
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    #[inline]
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Compose two poses: `self ⊕ other`.
    ///
    /// ```text
    /// C.x = A.x + B.x * cos(A.θ) - B.y * sin(A.θ)
    /// C.y = A.y + B.x * sin(A.θ) + B.y * cos(A.θ)
    /// C.θ = normalize(A.θ + B.θ)
    /// ```
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            self.x + other.x * cos_t - other.y * sin_t,
            self.y + other.x * sin_t + other.y * cos_t,
            self.theta + other.theta,
        )
    }

    /// Inverse transform, so that `p.compose(&p.inverse())` is identity.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Motion from `self` to `other`, expressed in the frame of `self`.
    ///
    /// This is the odometry delta fed to the motion model.
    #[inline]
    pub fn delta_to(&self, other: &Pose2D) -> Pose2D {
        self.inverse().compose(other)
    }

    /// Transform a point from this pose's local frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Point2D) -> Point2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Point2D::new(
            self.x + point.x * cos_t - point.y * sin_t,
            self.y + point.x * sin_t + point.y * cos_t,
        )
    }

    /// Planar distance between the positions of two poses.
    #[inline]
    pub fn distance(&self, other: &Pose2D) -> f32 {
        self.position().distance(&other.position())
    }

    /// Interpolate between two timestamped poses.
    ///
    /// Returns `None` when `target_time_us` lies outside `[start, end]`.
    pub fn interpolate(
        start: &Timestamped<Pose2D>,
        end: &Timestamped<Pose2D>,
        target_time_us: u64,
    ) -> Option<Pose2D> {
        if target_time_us < start.timestamp_us || target_time_us > end.timestamp_us {
            return None;
        }
        if start.timestamp_us == end.timestamp_us {
            return Some(start.data);
        }

        let t = (target_time_us - start.timestamp_us) as f32
            / (end.timestamp_us - start.timestamp_us) as f32;

        Some(Pose2D {
            x: start.data.x + t * (end.data.x - start.data.x),
            y: start.data.y + t * (end.data.y - start.data.y),
            theta: angle_lerp(start.data.theta, end.data.theta, t),
        })
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}
