//! Pairing Heap
//!
//! Arena-backed mergeable min-heap with a lazy additive offset, used for the per-cluster
//! queues of outgoing edge parts. All nodes of all heaps live in one shared arena so that
//! heaps can be melded by relinking indices; a heap itself is just a root handle.
//!
//! Offsets are kept per node: the true value of a node is its stored value plus the sum of
//! `child_offset` over all of its ancestors. `add_to_all` therefore only touches the root,
//! and `meld` is a single link that folds the surviving root's offset into the absorbed root.
//!

use crate::util::*;
use num_traits::Zero;

/// index of a heap node inside the shared arena; stays valid until the node is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub const NONE: NodeHandle = NodeHandle(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        self != Self::NONE
    }

    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct HeapNode<P: Copy> {
    /// value relative to the accumulated `child_offset` of all ancestors
    value: Weight,
    /// pending offset lazily applied to all descendants
    child_offset: Weight,
    payload: P,
    child: NodeHandle,
    sibling: NodeHandle,
    /// previous sibling, or the parent for the first child; `NONE` for a root
    left_up: NodeHandle,
}

/// a single heap: a root handle into a [`PairingHeapArena`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PairingHeap {
    root: NodeHandle,
}

impl Default for NodeHandle {
    fn default() -> Self {
        Self::NONE
    }
}

impl PairingHeap {
    pub fn new() -> Self {
        Self { root: NodeHandle::NONE }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

pub struct PairingHeapArena<P: Copy> {
    nodes: Vec<HeapNode<P>>,
    free: Vec<NodeHandle>,
    /// reusable buffer for the two-pass merge in `extract_min`
    scratch: Vec<NodeHandle>,
}

impl<P: Copy> Default for PairingHeapArena<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy> PairingHeapArena<P> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            scratch: Vec::new(),
        }
    }

    fn alloc(&mut self, value: Weight, payload: P) -> NodeHandle {
        let node = HeapNode {
            value,
            child_offset: Weight::zero(),
            payload,
            child: NodeHandle::NONE,
            sibling: NodeHandle::NONE,
            left_up: NodeHandle::NONE,
        };
        match self.free.pop() {
            Some(handle) => {
                self.nodes[handle.idx()] = node;
                handle
            }
            None => {
                self.nodes.push(node);
                NodeHandle((self.nodes.len() - 1) as u32)
            }
        }
    }

    /// link two roots of offset-consistent trees; the loser becomes the first child of the
    /// winner, with the winner's `child_offset` folded out of its stored values
    fn link(&mut self, a: NodeHandle, b: NodeHandle) -> NodeHandle {
        if a.is_none() {
            return b;
        }
        if b.is_none() {
            return a;
        }
        let (parent, child) = if self.nodes[a.idx()].value <= self.nodes[b.idx()].value {
            (a, b)
        } else {
            (b, a)
        };
        let parent_offset = self.nodes[parent.idx()].child_offset;
        let first_child = self.nodes[parent.idx()].child;
        {
            let node = &mut self.nodes[child.idx()];
            node.value -= parent_offset;
            node.child_offset -= parent_offset;
            node.sibling = first_child;
            node.left_up = parent;
        }
        if first_child.is_some() {
            self.nodes[first_child.idx()].left_up = child;
        }
        self.nodes[parent.idx()].child = child;
        parent
    }

    pub fn insert(&mut self, heap: &mut PairingHeap, value: Weight, payload: P) -> NodeHandle {
        let node = self.alloc(value, payload);
        heap.root = self.link(heap.root, node);
        node
    }

    pub fn get_min(&self, heap: &PairingHeap) -> Option<(Weight, P)> {
        if heap.root.is_none() {
            return None;
        }
        let node = &self.nodes[heap.root.idx()];
        Some((node.value, node.payload))
    }

    pub fn extract_min(&mut self, heap: &mut PairingHeap) -> Option<(Weight, P)> {
        if heap.root.is_none() {
            return None;
        }
        let root = heap.root;
        let (value, payload, offset) = {
            let node = &self.nodes[root.idx()];
            (node.value, node.payload, node.child_offset)
        };
        // detach the children, folding the root's pending offset into each
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let mut current = self.nodes[root.idx()].child;
        while current.is_some() {
            let node = &mut self.nodes[current.idx()];
            node.value += offset;
            node.child_offset += offset;
            node.left_up = NodeHandle::NONE;
            let next = node.sibling;
            node.sibling = NodeHandle::NONE;
            scratch.push(current);
            current = next;
        }
        // two-pass merge: pair up left to right, then fold right to left
        let mut count = 0;
        let mut ii = 0;
        while ii + 1 < scratch.len() {
            scratch[count] = self.link(scratch[ii], scratch[ii + 1]);
            count += 1;
            ii += 2;
        }
        if ii < scratch.len() {
            scratch[count] = scratch[ii];
            count += 1;
        }
        let mut merged = NodeHandle::NONE;
        for jj in (0..count).rev() {
            merged = self.link(merged, scratch[jj]);
        }
        self.scratch = scratch;
        heap.root = merged;
        self.free.push(root);
        Some((value, payload))
    }

    /// meld two heaps in O(1); both arguments are consumed
    pub fn meld(&mut self, h1: PairingHeap, h2: PairingHeap) -> PairingHeap {
        PairingHeap {
            root: self.link(h1.root, h2.root),
        }
    }

    /// shift every value held by the heap by `delta` in O(1)
    pub fn add_to_all(&mut self, heap: &PairingHeap, delta: Weight) {
        if heap.root.is_some() {
            let node = &mut self.nodes[heap.root.idx()];
            node.value += delta;
            node.child_offset += delta;
        }
    }

    /// lower the true value of a live node to `new_value`; `new_value` must not exceed the
    /// node's current true value
    pub fn decrease_key(&mut self, heap: &mut PairingHeap, handle: NodeHandle, new_value: Weight) {
        if handle == heap.root {
            self.nodes[handle.idx()].value = new_value;
            return;
        }
        // recover the accumulated ancestor offset by walking up to the root
        let mut accumulated = Weight::zero();
        let mut current = handle;
        loop {
            let up = self.nodes[current.idx()].left_up;
            if up.is_none() {
                break;
            }
            if self.nodes[up.idx()].child == current {
                accumulated += self.nodes[up.idx()].child_offset;
            }
            current = up;
        }
        // detach the node's subtree and fold the ancestor offset into it
        let left_up = self.nodes[handle.idx()].left_up;
        let sibling = self.nodes[handle.idx()].sibling;
        if self.nodes[left_up.idx()].child == handle {
            self.nodes[left_up.idx()].child = sibling;
        } else {
            self.nodes[left_up.idx()].sibling = sibling;
        }
        if sibling.is_some() {
            self.nodes[sibling.idx()].left_up = left_up;
        }
        {
            let node = &mut self.nodes[handle.idx()];
            node.sibling = NodeHandle::NONE;
            node.left_up = NodeHandle::NONE;
            node.child_offset += accumulated;
            node.value = new_value;
        }
        heap.root = self.link(heap.root, handle);
    }
}
