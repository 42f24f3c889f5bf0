//! Odometry motion model for particle propagation.
//!
//! Decomposes each odometry increment into rotate, translate, rotate and
//! perturbs every component with noise that grows with the motion:
//!
//! ```text
//! sigma_rot   = sqrt(stt * |rot| + str * trans)
//! sigma_trans = sqrt(srr * trans + srt * (|rot1| + |rot2|))
//! ```

use serde::{Deserialize, Serialize};

use super::NoiseGenerator;
use crate::core::math::normalize_angle;
use crate::core::types::Pose2D;

/// Odometry error coefficients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionModelConfig {
    /// Translation error from translation (m/m).
    pub srr: f32,
    /// Translation error from rotation (m/rad).
    pub srt: f32,
    /// Rotation error from translation (rad/m).
    pub str: f32,
    /// Rotation error from rotation (rad/rad).
    pub stt: f32,
}

impl Default for MotionModelConfig {
    fn default() -> Self {
        Self {
            srr: 0.1,
            srt: 0.2,
            str: 0.1,
            stt: 0.2,
        }
    }
}

impl MotionModelConfig {
    /// No noise at all; particles follow odometry exactly.
    pub fn noiseless() -> Self {
        Self {
            srr: 0.0,
            srt: 0.0,
            str: 0.0,
            stt: 0.0,
        }
    }
}

/// Odometry motion model for sampling particle poses.
#[derive(Debug, Clone)]
pub struct MotionModel {
    config: MotionModelConfig,
}

impl MotionModel {
    pub fn new(config: MotionModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionModelConfig {
        &self.config
    }

    /// Sample a new pose given the current pose and an odometry delta
    /// expressed in the robot frame.
    pub fn sample(&self, pose: &Pose2D, odom_delta: &Pose2D, noise: &mut NoiseGenerator) -> Pose2D {
        let delta_trans = (odom_delta.x * odom_delta.x + odom_delta.y * odom_delta.y).sqrt();

        if delta_trans < 1e-6 && odom_delta.theta.abs() < 1e-6 {
            return *pose;
        }

        let delta_rot1 = if delta_trans > 1e-6 {
            normalize_angle(odom_delta.y.atan2(odom_delta.x))
        } else {
            0.0
        };
        let delta_rot2 = normalize_angle(odom_delta.theta - delta_rot1);

        let rot1_abs = delta_rot1.abs();
        let rot2_abs = delta_rot2.abs();
        let c = &self.config;

        let sigma_rot1 = (c.stt * rot1_abs + c.str * delta_trans).sqrt();
        let sigma_trans = (c.srr * delta_trans + c.srt * (rot1_abs + rot2_abs)).sqrt();
        let sigma_rot2 = (c.stt * rot2_abs + c.str * delta_trans).sqrt();

        let noisy_rot1 = delta_rot1 + noise.gaussian(sigma_rot1);
        let noisy_trans = delta_trans + noise.gaussian(sigma_trans);
        let noisy_rot2 = delta_rot2 + noise.gaussian(sigma_rot2);

        let heading = normalize_angle(pose.theta + noisy_rot1);
        Pose2D::new(
            pose.x + noisy_trans * heading.cos(),
            pose.y + noisy_trans * heading.sin(),
            normalize_angle(heading + noisy_rot2),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_zero_motion() {
        let model = MotionModel::new(MotionModelConfig::default());
        let mut noise = NoiseGenerator::new(1);
        let pose = Pose2D::new(1.0, 2.0, 0.5);

        let sampled = model.sample(&pose, &Pose2D::identity(), &mut noise);
        assert_eq!(sampled, pose);
    }

    #[test]
    fn test_noiseless_follows_odometry() {
        let model = MotionModel::new(MotionModelConfig::noiseless());
        let mut noise = NoiseGenerator::new(1);
        let pose = Pose2D::new(1.0, 0.0, FRAC_PI_2);
        let delta = Pose2D::new(1.0, 0.0, 0.1);

        let sampled = model.sample(&pose, &delta, &mut noise);
        let expected = pose.compose(&delta);
        assert_relative_eq!(sampled.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(sampled.y, expected.y, epsilon = 1e-5);
        assert_relative_eq!(sampled.theta, expected.theta, epsilon = 1e-5);
    }

    #[test]
    fn test_noise_spreads_samples() {
        let model = MotionModel::new(MotionModelConfig::default());
        let mut noise = NoiseGenerator::new(3);
        let pose = Pose2D::identity();
        let delta = Pose2D::new(1.0, 0.0, 0.0);

        let xs: Vec<f32> = (0..200)
            .map(|_| model.sample(&pose, &delta, &mut noise).x)
            .collect();
        let mean = xs.iter().sum::<f32>() / xs.len() as f32;
        let spread = xs.iter().map(|x| (x - mean).abs()).fold(0.0, f32::max);

        assert!((mean - 1.0).abs() < 0.1, "mean {}", mean);
        assert!(spread > 0.05);
    }
}
