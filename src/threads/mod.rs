//! Thread management for the rolling-window daemon.
//!
//! - `SlamThread`: scan path (odometry buffering, mapping, resizing)
//! - `PublisherThread`: publish path (snapshots, transform, entropy)

mod publisher_thread;
mod slam_thread;

pub use publisher_thread::{Publisher, PublisherThread};
pub use slam_thread::{ODOMETRY_BUFFER_LEN, SlamContext, SlamThread};
