//! Sensor input and map output.
//!
//! - [`PoseSource`] / [`OdometryBuffer`]: pose lookup by timestamp
//! - [`MapSink`]: destination for published snapshots, transforms and metrics
//! - [`sim`]: simulated corridor drive feeding odometry and scans

mod pose_source;
pub mod sim;
mod sink;

pub use pose_source::{OdometryBuffer, PoseSource};
pub use sink::{ChannelSink, LogSink, MapSink, PublishedMessage};
