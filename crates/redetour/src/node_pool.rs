//! Per-query search scratch: a node arena mapping polygon references to
//! search state, and the open list ordered by total estimated cost.
//!
//! Everything is index based. Detour keeps raw node pointers in its heap;
//! indices into the arena express the same structure without any unsafe
//! code.

use std::collections::HashMap;

use glam::Vec3A;

use crate::poly_ref::PolyRef;

bitflags::bitflags! {
    /// Search state of a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct NodeFlags: u8 {
        /// The node is on the open list.
        const OPEN = 0x01;
        /// The node has been expanded.
        const CLOSED = 0x02;
        /// The node's parent was bypassed by a raycast shortcut; its
        /// `shortcut` list holds the skipped polygons.
        const PARENT_DETACHED = 0x04;
    }
}

/// Index of a node within its pool.
pub(crate) type NodeIndex = u32;

/// Per-reference, per-search mutable state.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// Position used for cost evaluation.
    pub(crate) pos: Vec3A,
    /// Accumulated cost from the search start.
    pub(crate) cost: f32,
    /// Accumulated cost plus the heuristic estimate to the goal.
    pub(crate) total: f32,
    /// Index of the parent node, if any.
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) flags: NodeFlags,
    /// The polygon this node stands for.
    pub(crate) poly: PolyRef,
    /// Polygons bypassed by the raycast shortcut that produced this node's
    /// parent edge. Empty for regular edges.
    pub(crate) shortcut: Vec<PolyRef>,
}

impl Node {
    fn new(poly: PolyRef) -> Self {
        Self {
            pos: Vec3A::ZERO,
            cost: 0.0,
            total: 0.0,
            parent: None,
            flags: NodeFlags::empty(),
            poly,
            shortcut: Vec::new(),
        }
    }
}

/// A bounded arena of search nodes, reused across searches via
/// [`Self::clear`]. Nodes keep their insertion order, so iterating the pool
/// walks polygons in discovery order.
pub(crate) struct NodePool {
    nodes: Vec<Node>,
    lookup: HashMap<PolyRef, NodeIndex>,
    max_nodes: usize,
}

impl NodePool {
    pub(crate) fn new(max_nodes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            lookup: HashMap::new(),
            max_nodes,
        }
    }

    /// Drops all nodes. Allocated capacity is kept for the next search.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.lookup.clear();
    }

    /// The node for `poly`, allocating it on first visit. `None` when the
    /// pool is exhausted.
    pub(crate) fn node(&mut self, poly: PolyRef) -> Option<NodeIndex> {
        if let Some(&index) = self.lookup.get(&poly) {
            return Some(index);
        }
        if self.nodes.len() >= self.max_nodes {
            return None;
        }
        let index = self.nodes.len() as NodeIndex;
        self.nodes.push(Node::new(poly));
        self.lookup.insert(poly, index);
        Some(index)
    }

    /// The node already allocated for `poly`, if any.
    pub(crate) fn find(&self, poly: PolyRef) -> Option<NodeIndex> {
        self.lookup.get(&poly).copied()
    }

    #[inline]
    pub(crate) fn get(&self, index: NodeIndex) -> &Node {
        &self.nodes[index as usize]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index as usize]
    }

    #[inline]
    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub(crate) fn max_nodes(&self) -> usize {
        self.max_nodes
    }
}

/// Min-heap over node indices, ordered by the nodes' total cost. The caller
/// passes the backing node slice into each operation; the heap itself stores
/// nothing but indices.
pub(crate) struct NodeQueue {
    heap: Vec<NodeIndex>,
}

impl NodeQueue {
    pub(crate) fn new() -> Self {
        Self { heap: Vec::new() }
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn push(&mut self, index: NodeIndex, nodes: &[Node]) {
        self.heap.push(index);
        self.bubble_up(self.heap.len() - 1, index, nodes);
    }

    pub(crate) fn pop(&mut self, nodes: &[Node]) -> Option<NodeIndex> {
        let result = *self.heap.first()?;
        let last = self.heap.pop().expect("heap is non-empty");
        if !self.heap.is_empty() {
            self.heap[0] = last;
            self.trickle_down(0, last, nodes);
        }
        Some(result)
    }

    /// Restores heap order after `index`'s total cost decreased.
    pub(crate) fn modify(&mut self, index: NodeIndex, nodes: &[Node]) {
        for i in 0..self.heap.len() {
            if self.heap[i] == index {
                self.bubble_up(i, index, nodes);
                return;
            }
        }
    }

    fn bubble_up(&mut self, mut i: usize, index: NodeIndex, nodes: &[Node]) {
        let total = nodes[index as usize].total;
        while i > 0 {
            let parent = (i - 1) / 2;
            if total >= nodes[self.heap[parent] as usize].total {
                break;
            }
            self.heap[i] = self.heap[parent];
            i = parent;
        }
        self.heap[i] = index;
    }

    fn trickle_down(&mut self, mut i: usize, index: NodeIndex, nodes: &[Node]) {
        let total = nodes[index as usize].total;
        loop {
            let child1 = 2 * i + 1;
            if child1 >= self.heap.len() {
                break;
            }
            let child2 = child1 + 1;
            let mut min_child = child1;
            if child2 < self.heap.len()
                && nodes[self.heap[child2] as usize].total < nodes[self.heap[child1] as usize].total
            {
                min_child = child2;
            }
            if total <= nodes[self.heap[min_child] as usize].total {
                break;
            }
            self.heap[i] = self.heap[min_child];
            i = min_child;
        }
        self.heap[i] = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poly(i: u32) -> PolyRef {
        PolyRef::encode(1, 0, i)
    }

    #[test]
    fn pool_allocates_each_reference_once() {
        let mut pool = NodePool::new(16);
        let a = pool.node(poly(1)).unwrap();
        let b = pool.node(poly(2)).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.node(poly(1)), Some(a));
        assert_eq!(pool.find(poly(2)), Some(b));
        assert_eq!(pool.find(poly(3)), None);
        assert_eq!(pool.nodes().len(), 2);
    }

    #[test]
    fn pool_is_bounded() {
        let mut pool = NodePool::new(2);
        assert!(pool.node(poly(1)).is_some());
        assert!(pool.node(poly(2)).is_some());
        assert!(pool.node(poly(3)).is_none());
        // Existing nodes are still reachable at capacity.
        assert!(pool.node(poly(1)).is_some());
    }

    #[test]
    fn clearing_forgets_nodes() {
        let mut pool = NodePool::new(4);
        pool.node(poly(1)).unwrap();
        pool.clear();
        assert_eq!(pool.find(poly(1)), None);
        assert!(pool.nodes().is_empty());
    }

    #[test]
    fn queue_pops_in_ascending_total_order() {
        let mut pool = NodePool::new(16);
        let mut queue = NodeQueue::new();
        for (i, total) in [(1, 5.0), (2, 3.0), (3, 7.0), (4, 1.0)] {
            let index = pool.node(poly(i)).unwrap();
            pool.get_mut(index).total = total;
            queue.push(index, pool.nodes());
        }

        let mut popped = Vec::new();
        while let Some(index) = queue.pop(pool.nodes()) {
            popped.push(pool.get(index).total);
        }
        assert_eq!(popped, vec![1.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn modify_reorders_after_a_decrease() {
        let mut pool = NodePool::new(16);
        let mut queue = NodeQueue::new();
        let a = pool.node(poly(1)).unwrap();
        pool.get_mut(a).total = 5.0;
        queue.push(a, pool.nodes());
        let b = pool.node(poly(2)).unwrap();
        pool.get_mut(b).total = 3.0;
        queue.push(b, pool.nodes());

        pool.get_mut(a).total = 1.0;
        queue.modify(a, pool.nodes());
        assert_eq!(queue.pop(pool.nodes()), Some(a));
        assert_eq!(queue.pop(pool.nodes()), Some(b));
        assert!(queue.is_empty());
    }
}
