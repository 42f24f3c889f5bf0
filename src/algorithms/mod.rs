//! Mapping and localization algorithms.
//!
//! - [`mapping`]: bounded occupancy grid, ray tracing, scan integration
//! - [`localization`]: motion model, noise, beam likelihood, pose entropy

pub mod localization;
pub mod mapping;
