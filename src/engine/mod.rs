//! SLAM orchestration layer.
//!
//! This layer coordinates the algorithms into a bounded, long-running
//! mapper.
//!
//! # Contents
//!
//! - [`history`]: shared, reference-counted measurement history
//! - [`slam`]: particle-filter engine and the [`slam::SlamEngine`] contract
//! - [`window`]: window tracking, uniform resizing, retention, generation
//! - [`mapper`]: per-scan orchestration of all of the above

pub mod history;
pub mod mapper;
pub mod slam;
pub mod window;

pub use mapper::{MapperConfig, MapperStats, RollingMapper, ScanOutcome};
