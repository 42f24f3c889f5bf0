//! History retention policy.
//!
//! Decides which history nodes remain usable for map building once the
//! window moves. Discarding is one-way: a node that left the retention
//! area stays discarded even if the window comes back.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::algorithms::mapping::GridBounds;
use crate::core::types::Pose2D;
use crate::engine::history::{HistoryArena, NodeIdx};
use crate::error::Result;

/// Which nodes stay usable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionMode {
    /// Never discard. The window bounds memory only.
    Keep,
    /// Discard nodes whose pose lies outside the window.
    ///
    /// A discarded scan may already have painted cells up to sensor range
    /// beyond the window, so the visible map edge is not crisp.
    Window,
    /// Discard nodes whose pose lies outside the window grown by the
    /// sensor's maximum range.
    #[default]
    WindowPlusRange,
}

impl std::fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionMode::Keep => write!(f, "keep"),
            RetentionMode::Window => write!(f, "window"),
            RetentionMode::WindowPlusRange => write!(f, "window_plus_range"),
        }
    }
}

/// Result of one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Live nodes examined.
    pub evaluated: usize,
    /// Nodes still retained after the pass.
    pub retained: usize,
    /// Nodes discarded by this pass.
    pub newly_discarded: Vec<NodeIdx>,
}

/// Applies a [`RetentionMode`] to the history.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    mode: RetentionMode,
    resolution: f32,
    max_range: f32,
}

impl RetentionPolicy {
    pub fn new(mode: RetentionMode, resolution: f32, max_range: f32) -> Self {
        Self {
            mode,
            resolution,
            max_range,
        }
    }

    pub fn mode(&self) -> RetentionMode {
        self.mode
    }

    /// Whether a node recorded at `pose` stays usable under `bounds`.
    pub fn retains(&self, pose: &Pose2D, bounds: &GridBounds) -> bool {
        match self.mode {
            RetentionMode::Keep => true,
            RetentionMode::Window => bounds.contains_padded(pose.x, pose.y, self.resolution, 0.0),
            RetentionMode::WindowPlusRange => {
                bounds.contains_padded(pose.x, pose.y, self.resolution, self.max_range)
            }
        }
    }

    /// Evaluate every live node against `bounds`.
    pub fn apply(&self, history: &mut HistoryArena, bounds: &GridBounds) -> Result<RetentionReport> {
        let mut report = RetentionReport::default();

        let candidates: Vec<(NodeIdx, bool)> = history
            .iter()
            .map(|(idx, node)| (idx, node.is_retained() && self.retains(node.pose(), bounds)))
            .collect();

        for (idx, keep) in candidates {
            report.evaluated += 1;
            if keep {
                report.retained += 1;
            } else if history.discard(idx)? {
                report.newly_discarded.push(idx);
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LaserScan;
    use crate::engine::history::IdAllocator;
    use std::sync::Arc;

    fn arena_at(xs: &[f32]) -> (HistoryArena, Vec<NodeIdx>) {
        let mut arena = HistoryArena::new(IdAllocator::new());
        let scan = Arc::new(LaserScan::new(0.0, 0.0, 0.0, 0.1, 5.0, vec![1.0]));
        let idxs = xs
            .iter()
            .map(|&x| {
                arena
                    .append(None, Pose2D::new(x, 0.0, 0.0), scan.clone(), 0)
                    .unwrap()
            })
            .collect();
        (arena, idxs)
    }

    fn window() -> GridBounds {
        GridBounds::centered_on(0.0, 0.0, 10.0, 0.05)
    }

    #[test]
    fn test_keep_never_discards() {
        let (mut arena, _) = arena_at(&[0.0, 50.0, -80.0]);
        let policy = RetentionPolicy::new(RetentionMode::Keep, 0.05, 5.0);
        let report = policy.apply(&mut arena, &window()).unwrap();
        assert_eq!(report.evaluated, 3);
        assert_eq!(report.retained, 3);
        assert!(report.newly_discarded.is_empty());
    }

    #[test]
    fn test_window_mode() {
        let (mut arena, idxs) = arena_at(&[0.0, 4.9, 6.0, 9.0]);
        let policy = RetentionPolicy::new(RetentionMode::Window, 0.05, 5.0);
        let report = policy.apply(&mut arena, &window()).unwrap();
        assert_eq!(report.retained, 2);
        assert_eq!(report.newly_discarded, vec![idxs[2], idxs[3]]);
    }

    #[test]
    fn test_window_plus_range_mode() {
        // 4 m outside the window stays, 6 m outside goes.
        let (mut arena, idxs) = arena_at(&[9.0, 11.0]);
        let policy = RetentionPolicy::new(RetentionMode::WindowPlusRange, 0.05, 5.0);
        let report = policy.apply(&mut arena, &window()).unwrap();
        assert_eq!(report.retained, 1);
        assert_eq!(report.newly_discarded, vec![idxs[1]]);
    }

    #[test]
    fn test_range_measured_from_window_edge() {
        // 10 m window spanning [0, 10] on both axes, 5 m sensor range.
        let bounds = GridBounds::new(0, 0, 200, 200);
        let scan = Arc::new(LaserScan::new(0.0, 0.0, 0.0, 0.1, 5.0, vec![1.0]));
        let mut arena = HistoryArena::new(IdAllocator::new());
        let near = arena
            .append(None, Pose2D::new(12.0, 5.0, 0.0), scan.clone(), 0)
            .unwrap();
        let far = arena
            .append(None, Pose2D::new(16.0, 5.0, 0.0), scan, 0)
            .unwrap();

        let policy = RetentionPolicy::new(RetentionMode::WindowPlusRange, 0.05, 5.0);
        let report = policy.apply(&mut arena, &bounds).unwrap();
        assert_eq!(report.retained, 1);
        assert_eq!(report.newly_discarded, vec![far]);
        assert!(arena.get(near).unwrap().is_retained());

        let (mut arena, idxs) = arena_at(&[12.0, 16.0]);
        let policy = RetentionPolicy::new(RetentionMode::Window, 0.05, 5.0);
        let report = policy.apply(&mut arena, &bounds).unwrap();
        assert_eq!(report.newly_discarded, idxs);
    }

    #[test]
    fn test_discarded_nodes_stay_discarded() {
        let (mut arena, idxs) = arena_at(&[20.0]);
        let policy = RetentionPolicy::new(RetentionMode::Window, 0.05, 5.0);
        policy.apply(&mut arena, &window()).unwrap();

        // Window moves back over the node.
        let report = policy
            .apply(&mut arena, &GridBounds::centered_on(20.0, 0.0, 10.0, 0.05))
            .unwrap();
        assert_eq!(report.retained, 0);
        assert!(report.newly_discarded.is_empty());
        assert!(!arena.get(idxs[0]).unwrap().is_retained());
    }
}
