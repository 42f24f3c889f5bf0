//! Particle-filter building blocks.
//!
//! # Components
//!
//! - [`MotionModel`]: odometry motion model with per-component noise
//! - [`NoiseGenerator`]: seeded Gaussian and uniform sampling
//! - [`SensorModel`] / [`EndpointModel`]: scan likelihood against a particle's map
//! - [`weights`]: log-sum-exp normalisation, Neff, low-variance resampling, entropy

mod motion_model;
mod noise;
mod sensor_model;
pub mod weights;

pub use motion_model::{MotionModel, MotionModelConfig};
pub use noise::NoiseGenerator;
pub use sensor_model::{EndpointModel, SensorModel, SensorModelConfig};
