//! Core data types.
//!
//! - [`Point2D`] / [`Pose2D`]: planar geometry in meters and radians
//! - [`Timestamped<T>`]: sample wrapper with a microsecond timestamp
//! - [`LaserScan`]: one polar range scan

mod pose;
mod scan;
mod timestamped;

pub use pose::{Point2D, Pose2D};
pub use scan::LaserScan;
pub use timestamped::Timestamped;
