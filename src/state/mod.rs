//! State shared between the scan path and the publish path.
//!
//! - `SharedMapState`: latest published grid, map→odom transform, entropy
//! - `MapSnapshot`: immutable binarised copy of one grid generation
//! - `SnapshotStore`: most recent snapshot for on-demand queries

mod shared;
mod snapshot;

pub use shared::{
    MapSlot, MapTransform, SharedMapState, SharedStateHandle, SnapshotStore, create_shared_state,
};
pub use snapshot::MapSnapshot;
