//! Cluster Store
//!
//! Moat-growth clusters and the merge tree. The first `node_num` clusters are the singleton
//! leaves; every merge appends a new cluster whose two children record the merge tree. A
//! merged cluster is immutable apart from pruning marks: its index never names a new cluster.
//!
//! The store also answers the central query of the growth loop: how much dual has one side
//! of an edge contributed so far. That is a walk from the endpoint's singleton up the
//! `merged_into` chain summing moats, with `skip_up` path compression so repeated queries
//! stay near-constant.
//!

use crate::pairing_heap::*;
use crate::util::*;
use derivative::Derivative;
use num_traits::Zero;

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Cluster {
    /// outgoing edge parts, keyed by the time their side's contribution target is reached
    #[derivative(Debug = "ignore")]
    pub edge_parts: PairingHeap,
    /// whether the moat is still growing
    pub active: bool,
    pub active_start_time: Weight,
    /// set at deactivation or merge; the heap clock freezes at this time
    pub active_end_time: Weight,
    /// the merge-tree parent; `None` while the cluster is top-level
    pub merged_into: Option<ClusterIndex>,
    /// total prize of the contained nodes
    pub prize_sum: Weight,
    /// sum of the finalized moats of all merge-tree descendants; the remaining prize credit
    /// is `prize_sum - subcluster_moat_sum - (growth since active_start_time)`
    pub subcluster_moat_sum: Weight,
    /// the amount of dual this cluster grew while it was active, finalized at deactivation
    pub moat: Weight,
    /// clusters containing the root never grow
    pub contains_root: bool,
    /// path compression: a shortcut towards the top of the `merged_into` chain
    pub skip_up: Option<ClusterIndex>,
    /// sum of moats skipped over by `skip_up`
    pub skip_up_sum: Weight,
    /// the edge whose tightness created this cluster
    pub merged_along: Option<EdgeIndex>,
    pub child_cluster_1: Option<ClusterIndex>,
    pub child_cluster_2: Option<ClusterIndex>,
    /// pruning mark: some kept edge depends on this cluster
    pub necessary: bool,
}

/// result of the upward walk from a singleton cluster
#[derive(Debug, Clone, Copy)]
pub struct PathSum {
    /// the current top-level cluster containing the start
    pub top: ClusterIndex,
    /// total dual contribution of this side, including the top cluster's ongoing growth
    pub total: Weight,
    /// contribution from finalized moats only
    pub finished: Weight,
}

pub struct ClusterStore {
    pub clusters: Vec<Cluster>,
    /// shared arena backing every cluster's edge part heap
    pub heap_arena: PairingHeapArena<EdgePartIndex>,
    /// reusable buffer for path compression
    path_buf: Vec<(ClusterIndex, Weight)>,
}

impl ClusterStore {
    pub fn with_capacity(node_num: NodeNum, edge_num: EdgeNum) -> Self {
        Self {
            // every merge adds one cluster, so a full growth allocates at most 2n - 1
            clusters: Vec::with_capacity(2 * node_num),
            heap_arena: PairingHeapArena::with_capacity(2 * edge_num),
            path_buf: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// create the singleton cluster of one node; active iff it carries prize and is not the root
    pub fn new_singleton(&mut self, prize: Weight, is_root: bool) -> ClusterIndex {
        let cluster_index = self.clusters.len();
        self.clusters.push(Cluster {
            edge_parts: PairingHeap::new(),
            active: !is_root && prize > Weight::zero(),
            active_start_time: Weight::zero(),
            active_end_time: Weight::zero(),
            merged_into: None,
            prize_sum: prize,
            subcluster_moat_sum: Weight::zero(),
            moat: Weight::zero(),
            contains_root: is_root,
            skip_up: None,
            skip_up_sum: Weight::zero(),
            merged_along: None,
            child_cluster_1: None,
            child_cluster_2: None,
            necessary: false,
        });
        cluster_index
    }

    /// the current top-level cluster containing `cluster`, without updating shortcuts
    pub fn find(&self, cluster: ClusterIndex) -> ClusterIndex {
        let mut current = cluster;
        loop {
            let node = &self.clusters[current];
            if let Some(skip) = node.skip_up {
                current = skip;
            } else if let Some(parent) = node.merged_into {
                current = parent;
            } else {
                return current;
            }
        }
    }

    /// walk from a singleton cluster to its top-level cluster, summing the moats along the
    /// way; `now` only matters for the ongoing growth of an active top cluster
    pub fn sum_from(&mut self, start: ClusterIndex, now: Weight) -> PathSum {
        let mut total = Weight::zero();
        let mut current = start;
        self.path_buf.clear();
        while self.clusters[current].merged_into.is_some() {
            self.path_buf.push((current, total));
            let node = &self.clusters[current];
            if let Some(skip) = node.skip_up {
                total += node.skip_up_sum;
                current = skip;
            } else {
                total += node.moat;
                current = node.merged_into.unwrap_or(current);
            }
        }
        for ii in 0..self.path_buf.len() {
            let (visited, visited_sum) = self.path_buf[ii];
            self.clusters[visited].skip_up = Some(current);
            self.clusters[visited].skip_up_sum = total - visited_sum;
        }
        let top = &self.clusters[current];
        let finished;
        if top.active {
            finished = total;
            total += now - top.active_start_time;
        } else {
            total += top.moat;
            finished = total;
        }
        PathSum {
            top: current,
            total,
            finished,
        }
    }

    /// visit every node (leaf cluster) contained in the subtree rooted at `top`
    pub fn for_each_leaf(&self, top: ClusterIndex, node_num: NodeNum, mut visit: impl FnMut(NodeIndex)) {
        let mut stack = vec![top];
        while let Some(cluster_index) = stack.pop() {
            if cluster_index < node_num {
                visit(cluster_index);
                continue;
            }
            let cluster = &self.clusters[cluster_index];
            if let Some(child) = cluster.child_cluster_1 {
                stack.push(child);
            }
            if let Some(child) = cluster.child_cluster_2 {
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn cluster_singleton_activity() {
        // cargo test cluster_singleton_activity -- --nocapture
        let mut store = ClusterStore::with_capacity(3, 0);
        let c0 = store.new_singleton(Weight::from(5.), false);
        let c1 = store.new_singleton(Weight::from(0.), false);
        let c2 = store.new_singleton(Weight::from(7.), true);
        assert!(store.clusters[c0].active);
        assert!(!store.clusters[c1].active, "zero prize starts inactive");
        assert!(!store.clusters[c2].active, "the root cluster never grows");
        assert!(store.clusters[c2].contains_root);
    }

    #[test]
    fn cluster_sum_from_walks_moats() {
        // cargo test cluster_sum_from_walks_moats -- --nocapture
        let mut store = ClusterStore::with_capacity(2, 0);
        let c0 = store.new_singleton(Weight::from(10.), false);
        let c1 = store.new_singleton(Weight::from(10.), false);
        // merge the two singletons at time 3 by hand
        let c2 = store.new_singleton(Weight::from(20.), false);
        for child in [c0, c1] {
            store.clusters[child].active = false;
            store.clusters[child].active_end_time = Weight::from(3.);
            store.clusters[child].moat = Weight::from(3.);
            store.clusters[child].merged_into = Some(c2);
        }
        store.clusters[c2].active_start_time = Weight::from(3.);
        store.clusters[c2].subcluster_moat_sum = Weight::from(6.);
        let sum = store.sum_from(c0, Weight::from(5.));
        assert_eq!(sum.top, c2);
        assert_eq!(sum.total, Weight::from(5.));
        assert_eq!(sum.finished, Weight::from(3.));
        // the walk installed a shortcut
        assert_eq!(store.clusters[c0].skip_up, Some(c2));
        assert_eq!(store.clusters[c0].skip_up_sum, Weight::from(3.));
        assert_eq!(store.find(c0), c2);
    }
}
