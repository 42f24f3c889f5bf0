//! Shared measurement history.
//!
//! Every processed scan appends one node per particle. Nodes form a tree:
//! resampling makes several particles descend from the same ancestor, so
//! a lineage is shared, never copied.
//!
//! Nodes live in an arena addressed by [`NodeIdx`]. Each node counts its
//! references: one per child node plus one per particle whose lineage ends
//! at it. When the count drops to zero the node is no longer part of any
//! lineage and its slot is reclaimed; releasing cascades up the parent
//! chain.
//!
//! Retention marks nodes discarded. A discarded node is never painted
//! again but keeps its place in the tree while descendants still need it.

use std::sync::Arc;

use crate::core::types::{LaserScan, Pose2D};
use crate::error::{Error, Result};

/// Slot index of a node in a [`HistoryArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(usize);

impl NodeIdx {
    #[inline]
    pub fn slot(&self) -> usize {
        self.0
    }
}

/// Stable identity of a node; slots are reused, ids are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Hands out monotonically increasing node ids.
///
/// Owned by one arena, so independent arenas number independently.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// One scan+pose sample of one particle's trajectory.
#[derive(Debug, Clone)]
pub struct HistoryNode {
    id: NodeId,
    parent: Option<NodeIdx>,
    pose: Pose2D,
    scan: Option<Arc<LaserScan>>,
    timestamp_us: u64,
    retained: bool,
    refs: u32,
}

impl HistoryNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeIdx> {
        self.parent
    }

    /// Pose of the particle when the scan was taken.
    pub fn pose(&self) -> &Pose2D {
        &self.pose
    }

    /// The scan, `None` once a discarded node's payload was dropped.
    pub fn scan(&self) -> Option<&Arc<LaserScan>> {
        self.scan.as_ref()
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }

    pub fn refs(&self) -> u32 {
        self.refs
    }
}

/// Arena of history nodes with reference-counted lineage.
#[derive(Debug)]
pub struct HistoryArena {
    slots: Vec<Option<HistoryNode>>,
    free: Vec<usize>,
    ids: IdAllocator,
    live: usize,
    reclaimed_total: u64,
}

impl HistoryArena {
    pub fn new(ids: IdAllocator) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            ids,
            live: 0,
            reclaimed_total: 0,
        }
    }

    fn node_mut(&mut self, idx: NodeIdx) -> Result<&mut HistoryNode> {
        self.slots
            .get_mut(idx.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::InvariantViolation(format!("history node {} is not live", idx.0)))
    }

    pub fn get(&self, idx: NodeIdx) -> Option<&HistoryNode> {
        self.slots.get(idx.0).and_then(Option::as_ref)
    }

    /// Append a node under `parent` and return it holding one lease.
    ///
    /// The caller owns the returned lease and must eventually
    /// [`release`](Self::release) it.
    pub fn append(
        &mut self,
        parent: Option<NodeIdx>,
        pose: Pose2D,
        scan: Arc<LaserScan>,
        timestamp_us: u64,
    ) -> Result<NodeIdx> {
        if let Some(p) = parent {
            self.node_mut(p)?.refs += 1;
        }

        let node = HistoryNode {
            id: self.ids.next_id(),
            parent,
            pose,
            scan: Some(scan),
            timestamp_us,
            retained: true,
            refs: 1,
        };

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Ok(NodeIdx(slot))
    }

    /// Take an additional lease on a node.
    pub fn acquire(&mut self, idx: NodeIdx) -> Result<()> {
        self.node_mut(idx)?.refs += 1;
        Ok(())
    }

    /// Drop one lease. Returns the number of nodes reclaimed.
    pub fn release(&mut self, idx: NodeIdx) -> Result<usize> {
        let mut reclaimed = 0;
        let mut current = Some(idx);

        while let Some(idx) = current {
            let node = self.node_mut(idx)?;
            if node.refs == 0 {
                return Err(Error::InvariantViolation(format!(
                    "history node {} released with no references",
                    idx.0
                )));
            }
            node.refs -= 1;
            if node.refs > 0 {
                break;
            }

            current = node.parent;
            self.slots[idx.0] = None;
            self.free.push(idx.0);
            self.live -= 1;
            reclaimed += 1;
        }

        self.reclaimed_total += reclaimed as u64;
        Ok(reclaimed)
    }

    /// Mark a node unusable for map building.
    ///
    /// Returns `true` when the node was retained before the call.
    pub fn discard(&mut self, idx: NodeIdx) -> Result<bool> {
        let node = self.node_mut(idx)?;
        let was_retained = node.retained;
        node.retained = false;
        Ok(was_retained)
    }

    /// Drop the scans of discarded nodes, keeping their tree linkage.
    pub fn drop_discarded_payloads(&mut self) -> usize {
        let mut dropped = 0;
        for node in self.slots.iter_mut().flatten() {
            if !node.retained && node.scan.take().is_some() {
                dropped += 1;
            }
        }
        dropped
    }

    /// Cut retained nodes loose from ancestries that are discarded all the
    /// way to the root, reclaiming those ancestors.
    ///
    /// A retained node below a discarded gap that still reaches a retained
    /// ancestor keeps its parent. Returns the number of nodes reclaimed.
    pub fn prune_discarded_ancestry(&mut self) -> Result<usize> {
        // Memo per slot: does the chain from here to the root hold only
        // discarded nodes?
        let mut dead_chain: Vec<Option<bool>> = vec![None; self.slots.len()];

        let mut cut = Vec::new();
        for slot in 0..self.slots.len() {
            let Some(node) = &self.slots[slot] else {
                continue;
            };
            if !node.retained {
                continue;
            }
            if let Some(parent) = node.parent
                && self.chain_is_discarded(parent, &mut dead_chain)
            {
                cut.push((slot, parent));
            }
        }

        let mut reclaimed = 0;
        for (slot, parent) in cut {
            if let Some(node) = self.slots[slot].as_mut() {
                node.parent = None;
            }
            reclaimed += self.release(parent)?;
        }
        Ok(reclaimed)
    }

    fn chain_is_discarded(&self, start: NodeIdx, memo: &mut [Option<bool>]) -> bool {
        let mut path = Vec::new();
        let mut current = Some(start);
        let mut result = true;

        while let Some(idx) = current {
            if let Some(known) = memo[idx.0] {
                result = known;
                break;
            }
            let Some(node) = self.get(idx) else {
                break;
            };
            path.push(idx.0);
            if node.retained {
                result = false;
                break;
            }
            current = node.parent;
        }

        for slot in path {
            memo[slot] = Some(result);
        }
        result
    }

    /// Walk from `leaf` up to its root.
    pub fn lineage(&self, leaf: Option<NodeIdx>) -> Lineage<'_> {
        Lineage {
            arena: self,
            current: leaf,
        }
    }

    /// All live nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx, &HistoryNode)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| node.as_ref().map(|n| (NodeIdx(slot), n)))
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of live nodes not yet discarded.
    pub fn retained_count(&self) -> usize {
        self.iter().filter(|(_, n)| n.retained).count()
    }

    /// Nodes reclaimed over the arena's lifetime.
    pub fn reclaimed_total(&self) -> u64 {
        self.reclaimed_total
    }
}

/// Iterator from a leaf node up to its root.
pub struct Lineage<'a> {
    arena: &'a HistoryArena,
    current: Option<NodeIdx>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = (NodeIdx, &'a HistoryNode);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        let node = self.arena.get(idx)?;
        self.current = node.parent;
        Some((idx, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan() -> Arc<LaserScan> {
        Arc::new(LaserScan::new(0.0, 0.0, 0.0, 0.1, 5.0, vec![1.0]))
    }

    fn pose(x: f32) -> Pose2D {
        Pose2D::new(x, 0.0, 0.0)
    }

    #[test]
    fn test_append_and_lineage() {
        let mut arena = HistoryArena::new(IdAllocator::new());
        let a = arena.append(None, pose(0.0), scan(), 0).unwrap();
        let b = arena.append(Some(a), pose(1.0), scan(), 1).unwrap();
        arena.release(a).unwrap();
        let c = arena.append(Some(b), pose(2.0), scan(), 2).unwrap();
        arena.release(b).unwrap();

        let xs: Vec<f32> = arena.lineage(Some(c)).map(|(_, n)| n.pose().x).collect();
        assert_eq!(xs, vec![2.0, 1.0, 0.0]);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.get(a).unwrap().refs(), 1);
    }

    #[test]
    fn test_release_cascades() {
        let mut arena = HistoryArena::new(IdAllocator::new());
        let root = arena.append(None, pose(0.0), scan(), 0).unwrap();
        let left = arena.append(Some(root), pose(1.0), scan(), 1).unwrap();
        let right = arena.append(Some(root), pose(-1.0), scan(), 1).unwrap();
        arena.release(root).unwrap();

        // Dropping one branch keeps the shared root alive.
        assert_eq!(arena.release(left).unwrap(), 1);
        assert_eq!(arena.len(), 2);

        // Dropping the last branch reclaims the root too.
        assert_eq!(arena.release(right).unwrap(), 2);
        assert!(arena.is_empty());
        assert_eq!(arena.reclaimed_total(), 3);
    }

    #[test]
    fn test_double_release_is_violation() {
        let mut arena = HistoryArena::new(IdAllocator::new());
        let a = arena.append(None, pose(0.0), scan(), 0).unwrap();
        arena.release(a).unwrap();
        assert!(matches!(
            arena.release(a),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_slots_reused_with_fresh_ids() {
        let mut arena = HistoryArena::new(IdAllocator::starting_at(100));
        let a = arena.append(None, pose(0.0), scan(), 0).unwrap();
        let first_id = arena.get(a).unwrap().id();
        arena.release(a).unwrap();
        let b = arena.append(None, pose(0.0), scan(), 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(first_id, NodeId(100));
        assert_eq!(arena.get(b).unwrap().id(), NodeId(101));
    }

    #[test]
    fn test_independent_allocators() {
        let mut one = HistoryArena::new(IdAllocator::new());
        let mut two = HistoryArena::new(IdAllocator::new());
        let a = one.append(None, pose(0.0), scan(), 0).unwrap();
        let b = two.append(None, pose(0.0), scan(), 0).unwrap();
        assert_eq!(one.get(a).unwrap().id(), two.get(b).unwrap().id());
    }

    #[test]
    fn test_discard_is_one_way() {
        let mut arena = HistoryArena::new(IdAllocator::new());
        let a = arena.append(None, pose(0.0), scan(), 0).unwrap();
        assert!(arena.discard(a).unwrap());
        assert!(!arena.discard(a).unwrap());
        assert!(!arena.get(a).unwrap().is_retained());
        assert_eq!(arena.retained_count(), 0);

        assert_eq!(arena.drop_discarded_payloads(), 1);
        assert!(arena.get(a).unwrap().scan().is_none());
        // Linkage survives.
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_prune_discarded_ancestry() {
        let mut arena = HistoryArena::new(IdAllocator::new());
        // root(discarded) <- mid(discarded) <- leaf(retained)
        let root = arena.append(None, pose(0.0), scan(), 0).unwrap();
        let mid = arena.append(Some(root), pose(1.0), scan(), 1).unwrap();
        arena.release(root).unwrap();
        let leaf = arena.append(Some(mid), pose(2.0), scan(), 2).unwrap();
        arena.release(mid).unwrap();

        arena.discard(root).unwrap();
        arena.discard(mid).unwrap();

        assert_eq!(arena.prune_discarded_ancestry().unwrap(), 2);
        assert_eq!(arena.len(), 1);
        assert!(arena.get(leaf).unwrap().parent().is_none());
    }

    #[test]
    fn test_prune_keeps_gap_above_retained_ancestor() {
        let mut arena = HistoryArena::new(IdAllocator::new());
        // root(retained) <- gap(discarded) <- leaf(retained)
        let root = arena.append(None, pose(0.0), scan(), 0).unwrap();
        let gap = arena.append(Some(root), pose(20.0), scan(), 1).unwrap();
        arena.release(root).unwrap();
        let leaf = arena.append(Some(gap), pose(0.5), scan(), 2).unwrap();
        arena.release(gap).unwrap();
        arena.discard(gap).unwrap();

        assert_eq!(arena.prune_discarded_ancestry().unwrap(), 0);
        assert_eq!(arena.lineage(Some(leaf)).count(), 3);
    }
}
