//! Pose lookup by timestamp.

use std::collections::VecDeque;

use crate::core::types::{Pose2D, Timestamped};
use crate::error::{Error, Result};

/// Resolves the platform pose in the odometry frame at a given time.
pub trait PoseSource {
    /// Pose at `timestamp_us`, or [`Error::PoseUnavailable`].
    fn lookup(&self, timestamp_us: u64) -> Result<Pose2D>;
}

/// Bounded, time-ordered buffer of odometry samples.
///
/// Lookups between two samples interpolate; lookups outside the buffered
/// span fail rather than extrapolate.
#[derive(Debug, Clone)]
pub struct OdometryBuffer {
    samples: VecDeque<Timestamped<Pose2D>>,
    capacity: usize,
}

impl OdometryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample. Samples older than the newest are dropped.
    pub fn push(&mut self, sample: Timestamped<Pose2D>) {
        if let Some(last) = self.samples.back()
            && sample.timestamp_us < last.timestamp_us
        {
            log::debug!(
                "Dropping out-of-order odometry at t={}us (latest {}us)",
                sample.timestamp_us,
                last.timestamp_us
            );
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&Timestamped<Pose2D>> {
        self.samples.back()
    }
}

impl PoseSource for OdometryBuffer {
    fn lookup(&self, timestamp_us: u64) -> Result<Pose2D> {
        let unavailable = Error::PoseUnavailable { timestamp_us };

        // First sample strictly after the requested time.
        let after = self
            .samples
            .partition_point(|s| s.timestamp_us <= timestamp_us);
        if after == 0 {
            return Err(unavailable);
        }

        let start = &self.samples[after - 1];
        if start.timestamp_us == timestamp_us {
            return Ok(start.data);
        }
        let end = self.samples.get(after).ok_or(unavailable)?;

        Pose2D::interpolate(start, end, timestamp_us).ok_or(Error::PoseUnavailable { timestamp_us })
    }
}
