//! ChalaSLAM - rolling-window occupancy grid mapping for particle-filter SLAM
//!
//! Keeps every particle's grid bounded to a window that follows the
//! platform, so memory and CPU stay flat on an indefinitely long drive
//! while all particles keep identical grid geometry.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     threads/                        │  ← Scan and publish paths
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  io/  ·  state/                     │  ← Infrastructure
//! │   (pose source, sinks, simulation · shared slots)   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │   (history, particle filter, window, mapper)        │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │            (mapping, localization)                  │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```

// Layer 1: Core foundation (no internal deps)
pub mod core;

// Layer 2: Algorithms (depends on core)
pub mod algorithms;

// Layer 3: Engine (depends on core, algorithms)
pub mod engine;

// Layer 4: Shared state and I/O
pub mod io;
pub mod state;

// Layer 5: Threads
pub mod threads;

pub mod config;
pub mod error;

pub use config::Config;
pub use core::types::{LaserScan, Point2D, Pose2D, Timestamped};
pub use engine::{MapperConfig, RollingMapper, ScanOutcome};
pub use error::{Error, Result};
pub use state::{MapSnapshot, SharedStateHandle, create_shared_state};
