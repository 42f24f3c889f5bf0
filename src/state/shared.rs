//! Lock-guarded slots shared by the scan thread and the publisher thread.
//!
//! Each slot has its own lock and every critical section is a clone or a
//! pointer swap. The scan thread builds a complete grid outside any lock
//! and only then swaps the `Arc` in, so a reader holding an older `Arc`
//! keeps a consistent grid for as long as it needs it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::MapSnapshot;
use crate::algorithms::mapping::OccupancyGrid;
use crate::core::types::Pose2D;
use crate::error::{Error, Result};

/// Most recent published grid and the trajectory that produced it.
#[derive(Debug, Clone, Default)]
pub struct MapSlot {
    /// Grid of the published particle, `None` before initialization.
    pub grid: Option<Arc<OccupancyGrid>>,
    /// Incremented on every store.
    pub generation: u64,
    /// Sensor time of the scan that produced this grid.
    pub timestamp_us: u64,
    /// Published particle's trajectory, oldest first.
    pub path: Arc<Vec<Pose2D>>,
    /// Trajectories of all particles in particle order, when enabled.
    pub all_paths: Option<Arc<Vec<Vec<Pose2D>>>>,
}

/// Offset from the map frame to the odometry frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapTransform {
    pub map_to_odom: Pose2D,
    pub timestamp_us: u64,
}

impl Default for MapTransform {
    fn default() -> Self {
        Self {
            map_to_odom: Pose2D::identity(),
            timestamp_us: 0,
        }
    }
}

/// Latest binarised snapshot, served to on-demand queries.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: Mutex<Option<Arc<MapSnapshot>>>,
}

impl SnapshotStore {
    pub fn store(&self, snapshot: Arc<MapSnapshot>) {
        *self.latest.lock() = Some(snapshot);
    }

    /// Most recent snapshot, without recomputation.
    pub fn latest(&self) -> Result<Arc<MapSnapshot>> {
        self.latest.lock().clone().ok_or(Error::MapNotReady)
    }

    /// Generation of the most recent snapshot, if any.
    pub fn latest_generation(&self) -> Option<u64> {
        self.latest.lock().as_ref().map(|s| s.generation())
    }
}

/// State shared between the scan path and the publish path.
#[derive(Debug)]
pub struct SharedMapState {
    map: Mutex<MapSlot>,
    transform: Mutex<MapTransform>,
    entropy: Mutex<f64>,
    snapshots: SnapshotStore,
}

impl Default for SharedMapState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMapState {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(MapSlot::default()),
            transform: Mutex::new(MapTransform::default()),
            entropy: Mutex::new(0.0),
            snapshots: SnapshotStore::default(),
        }
    }

    /// Swap in a fully built grid. Returns the new generation.
    pub fn store_map(
        &self,
        grid: Arc<OccupancyGrid>,
        path: Arc<Vec<Pose2D>>,
        timestamp_us: u64,
    ) -> u64 {
        self.store_map_with_paths(grid, path, None, timestamp_us)
    }

    /// Like [`store_map`](Self::store_map), also replacing the per-particle
    /// trajectories in the same critical section.
    pub fn store_map_with_paths(
        &self,
        grid: Arc<OccupancyGrid>,
        path: Arc<Vec<Pose2D>>,
        all_paths: Option<Arc<Vec<Vec<Pose2D>>>>,
        timestamp_us: u64,
    ) -> u64 {
        let mut slot = self.map.lock();
        slot.generation += 1;
        slot.grid = Some(grid);
        slot.path = path;
        slot.all_paths = all_paths;
        slot.timestamp_us = timestamp_us;
        slot.generation
    }

    /// Clone of the current map slot.
    pub fn map_slot(&self) -> MapSlot {
        self.map.lock().clone()
    }

    pub fn generation(&self) -> u64 {
        self.map.lock().generation
    }

    pub fn set_transform(&self, transform: MapTransform) {
        *self.transform.lock() = transform;
    }

    pub fn transform(&self) -> MapTransform {
        *self.transform.lock()
    }

    pub fn set_entropy(&self, entropy: f64) {
        *self.entropy.lock() = entropy;
    }

    pub fn entropy(&self) -> f64 {
        *self.entropy.lock()
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }
}

/// Handle type for shared state.
pub type SharedStateHandle = Arc<SharedMapState>;

/// Create a new shared state handle.
pub fn create_shared_state() -> SharedStateHandle {
    Arc::new(SharedMapState::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::mapping::{GridBounds, OccupancyGridConfig};

    fn grid() -> Arc<OccupancyGrid> {
        Arc::new(
            OccupancyGrid::try_new(OccupancyGridConfig::default(), GridBounds::new(0, 0, 4, 4))
                .unwrap(),
        )
    }

    #[test]
    fn test_store_map_bumps_generation() {
        let state = create_shared_state();
        assert_eq!(state.generation(), 0);
        assert!(state.map_slot().grid.is_none());

        let path = Arc::new(vec![Pose2D::identity()]);
        assert_eq!(state.store_map(grid(), path.clone(), 10), 1);
        assert_eq!(state.store_map(grid(), path, 20), 2);

        let slot = state.map_slot();
        assert_eq!(slot.generation, 2);
        assert_eq!(slot.timestamp_us, 20);
        assert_eq!(slot.path.len(), 1);
        assert!(slot.all_paths.is_none());
    }

    #[test]
    fn test_all_paths_replaced_with_each_store() {
        let state = create_shared_state();
        let all = Arc::new(vec![vec![Pose2D::identity()]; 3]);
        state.store_map_with_paths(grid(), Arc::default(), Some(all), 0);
        assert_eq!(state.map_slot().all_paths.unwrap().len(), 3);

        state.store_map(grid(), Arc::default(), 1);
        assert!(state.map_slot().all_paths.is_none());
    }

    #[test]
    fn test_reader_keeps_old_grid_after_swap() {
        let state = create_shared_state();
        state.store_map(grid(), Arc::default(), 0);
        let held = state.map_slot().grid.unwrap();

        state.store_map(grid(), Arc::default(), 1);
        assert_eq!(held.dimensions(), (4, 4));
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[test]
    fn test_snapshot_store_not_ready() {
        let state = create_shared_state();
        assert!(matches!(
            state.snapshots().latest(),
            Err(Error::MapNotReady)
        ));
        assert_eq!(state.snapshots().latest_generation(), None);

        let snap = MapSnapshot::from_grid(&grid(), 3, 0).unwrap();
        state.snapshots().store(Arc::new(snap));
        assert_eq!(state.snapshots().latest().unwrap().generation(), 3);
    }

    #[test]
    fn test_transform_and_entropy() {
        let state = SharedMapState::default();
        assert_eq!(state.transform(), MapTransform::default());

        let t = MapTransform {
            map_to_odom: Pose2D::new(1.0, -0.5, 0.1),
            timestamp_us: 42,
        };
        state.set_transform(t);
        state.set_entropy(1.5);
        assert_eq!(state.transform(), t);
        assert_eq!(state.entropy(), 1.5);
    }
}
