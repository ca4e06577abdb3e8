//! Moat Growth
//!
//! The Goemans-Williamson dual growth phase. Every prize-carrying node starts as an active
//! cluster whose moat grows at unit rate; the two halves of every edge pay into the edge
//! from their respective sides. The driver consumes a global event queue of edge-tightness
//! and cluster-deactivation events, merging clusters along tight edges until the number of
//! active clusters reaches its target.
//!
//! Invariant maintained throughout: the two contribution targets of an edge's parts always
//! sum to the edge cost. When one side reaches its target while the other side fell behind
//! (it was frozen in an inactive cluster for a while), the residual cost is re-split and
//! both sides are rescheduled.
//!

use crate::cluster::*;
use crate::event_queue::*;
use crate::pairing_heap::*;
use crate::util::*;
use num_traits::Zero;

/// relative tolerance for deciding that an edge has become tight
const EDGE_TIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct EdgePart {
    /// contribution target of this side when its queued event fires; the two targets of an
    /// edge always sum to the edge cost
    pub next_event_val: Weight,
    /// set once the edge is resolved (merged, or became internal to a cluster)
    pub deleted: bool,
    /// current node in the owning cluster's edge part heap
    pub heap_node: NodeHandle,
}

/// one active-inactive merge, recorded for gw pruning
#[derive(Debug, Clone)]
pub struct InactiveMergeEvent {
    pub active_cluster: ClusterIndex,
    pub inactive_cluster: ClusterIndex,
    /// endpoint of the merge edge on the active side
    pub active_node: NodeIndex,
    /// endpoint of the merge edge on the inactive side
    pub inactive_node: NodeIndex,
}

#[derive(Debug, Clone, Default)]
pub struct GrowthStats {
    pub num_edge_events: usize,
    pub num_merge_events: usize,
    pub num_resplit_events: usize,
    pub num_deactivations: usize,
    pub num_stale_events: usize,
}

pub struct GrowthDriver<'a> {
    initializer: &'a SolverInitializer,
    config: &'a SolverConfig,
    logger: Logger<'a>,
    /// owned copy of the edge costs; caller buffers are never touched
    edge_costs: Vec<Weight>,
    pub store: ClusterStore,
    pub edge_parts: Vec<EdgePart>,
    pub event_queue: EventQueue,
    pub current_time: Weight,
    pub num_active_clusters: usize,
    pub target_num_active_clusters: usize,
    pub root: Option<NodeIndex>,
    /// edges that became tight between distinct clusters, in chronological order
    pub good_edges: Vec<EdgeIndex>,
    pub inactive_merge_events: Vec<InactiveMergeEvent>,
    /// per edge: the active-inactive merge it triggered, if any
    pub edge_inactive_merge_event: Vec<Option<usize>>,
    pub stats: GrowthStats,
}

impl<'a> GrowthDriver<'a> {
    pub fn new(initializer: &'a SolverInitializer, config: &'a SolverConfig, logger: Logger<'a>) -> Self {
        let node_num = initializer.node_num;
        let edge_num = initializer.weighted_edges.len();
        let mut store = ClusterStore::with_capacity(node_num, edge_num);
        let mut num_active_clusters = 0;
        for node_index in 0..node_num {
            let cluster = store.new_singleton(
                Weight::from(initializer.prizes[node_index]),
                config.root == Some(node_index),
            );
            if store.clusters[cluster].active {
                num_active_clusters += 1;
            }
        }
        let edge_costs: Vec<Weight> = initializer
            .weighted_edges
            .iter()
            .map(|edge| Weight::from(edge.cost))
            .collect();
        let mut edge_parts = Vec::with_capacity(2 * edge_num);
        for (edge_index, edge) in initializer.weighted_edges.iter().enumerate() {
            let cost = edge_costs[edge_index];
            let u_active = store.clusters[edge.u].active;
            let v_active = store.clusters[edge.v].active;
            // both sides pay half when both grow; otherwise the growing side pays everything
            let (u_val, v_val) = match (u_active, v_active) {
                (true, true) => (cost * Weight::from(0.5), cost * Weight::from(0.5)),
                (true, false) => (cost, Weight::zero()),
                (false, true) => (Weight::zero(), cost),
                (false, false) => (Weight::zero(), Weight::zero()),
            };
            for (endpoint, value) in [(edge.u, u_val), (edge.v, v_val)] {
                let part_index = edge_parts.len();
                let mut heap = store.clusters[endpoint].edge_parts;
                let heap_node = store.heap_arena.insert(&mut heap, value, part_index);
                store.clusters[endpoint].edge_parts = heap;
                edge_parts.push(EdgePart {
                    next_event_val: value,
                    deleted: false,
                    heap_node,
                });
            }
        }
        let mut driver = Self {
            initializer,
            config,
            logger,
            edge_costs,
            store,
            edge_parts,
            event_queue: EventQueue::new(),
            current_time: Weight::zero(),
            num_active_clusters,
            target_num_active_clusters: config.target_num_active_clusters,
            root: config.root,
            good_edges: Vec::new(),
            inactive_merge_events: Vec::new(),
            edge_inactive_merge_event: vec![None; edge_num],
            stats: GrowthStats::default(),
        };
        for cluster_index in 0..node_num {
            if driver.store.clusters[cluster_index].active {
                let deactivate_at = driver.store.clusters[cluster_index].prize_sum;
                driver
                    .event_queue
                    .will_happen(deactivate_at, GrowthEvent::ClusterDeactivation { cluster: cluster_index });
                driver.push_next_edge_event(cluster_index);
            }
        }
        driver
    }

    /// run the growth loop to termination
    pub fn run(&mut self) -> Result<(), SolverError> {
        while self.num_active_clusters > self.target_num_active_clusters {
            let Some((time, event)) = self.event_queue.pop_event() else {
                return Err(self.fail("event queue exhausted while clusters are still active"));
            };
            debug_assert!(time >= self.current_time, "event times must be non-decreasing");
            match event {
                GrowthEvent::EdgePartActive { cluster } => self.handle_edge_event(time, cluster)?,
                GrowthEvent::ClusterDeactivation { cluster } => self.handle_deactivation(time, cluster),
            }
        }
        if self.logger.enabled(1) {
            self.logger.log(&format!(
                "growth finished at t={}: {} merges, {} deactivations, {} edge events ({} stale), {} re-splits",
                self.current_time,
                self.stats.num_merge_events,
                self.stats.num_deactivations,
                self.stats.num_edge_events,
                self.stats.num_stale_events,
                self.stats.num_resplit_events,
            ));
        }
        Ok(())
    }

    fn handle_deactivation(&mut self, time: Weight, cluster_index: ClusterIndex) {
        let cluster = &self.store.clusters[cluster_index];
        if cluster.merged_into.is_some() || !cluster.active {
            self.stats.num_stale_events += 1;
            return;
        }
        self.current_time = time;
        let cluster = &mut self.store.clusters[cluster_index];
        cluster.active = false;
        cluster.active_end_time = time;
        cluster.moat = time - cluster.active_start_time;
        self.num_active_clusters -= 1;
        self.stats.num_deactivations += 1;
        if self.logger.enabled(2) {
            self.logger.log(&format!(
                "t={}: cluster {} deactivates with moat {}",
                time, cluster_index, self.store.clusters[cluster_index].moat
            ));
        }
    }

    fn handle_edge_event(&mut self, time: Weight, cluster_index: ClusterIndex) -> Result<(), SolverError> {
        {
            let cluster = &self.store.clusters[cluster_index];
            if cluster.merged_into.is_some() || !cluster.active {
                self.stats.num_stale_events += 1;
                return Ok(());
            }
            match self.store.heap_arena.get_min(&cluster.edge_parts) {
                Some((min_value, _)) if min_value == time => {}
                _ => {
                    // the heap changed since this entry was pushed
                    self.stats.num_stale_events += 1;
                    return Ok(());
                }
            }
        }
        self.current_time = time;
        self.stats.num_edge_events += 1;
        let mut heap = self.store.clusters[cluster_index].edge_parts;
        let Some((_, part_index)) = self.store.heap_arena.extract_min(&mut heap) else {
            return Err(self.fail("edge part heap is empty right after a non-empty peek"));
        };
        self.store.clusters[cluster_index].edge_parts = heap;
        if self.edge_parts[part_index].deleted {
            self.stats.num_stale_events += 1;
            self.push_next_edge_event(cluster_index);
            return Ok(());
        }
        let edge_index = part_index / 2;
        let other_part_index = part_index ^ 1;
        let cost = self.edge_costs[edge_index];
        let cur = self.sum_on_edge_part(part_index);
        let other = self.sum_on_edge_part(other_part_index);
        debug_assert_eq!(cur.top, cluster_index, "an edge part fired outside its own cluster");
        if cur.top == other.top {
            // both endpoints already in one cluster, the edge is internal
            self.edge_parts[other_part_index].deleted = true;
            if self.logger.enabled(2) {
                self.logger.log(&format!("t={}: edge {} became internal, discarded", time, edge_index));
            }
            self.push_next_edge_event(cluster_index);
            return Ok(());
        }
        let remainder = cost - cur.total - other.total;
        if remainder <= Weight::zero() || remainder < cost * Weight::from(EDGE_TIGHT_TOLERANCE) {
            self.stats.num_merge_events += 1;
            self.edge_parts[other_part_index].deleted = true;
            if self.logger.enabled(2) {
                self.logger.log(&format!(
                    "t={}: edge {} is tight, merging clusters {} and {}",
                    time, edge_index, cur.top, other.top
                ));
            }
            self.merge_clusters(edge_index, part_index, cur, other_part_index, other)?;
        } else {
            self.split_remainder(part_index, cur, other_part_index, other, remainder);
        }
        Ok(())
    }

    /// one side reached its contribution target but the edge is not yet tight: re-split the
    /// residual cost between the two sides and reschedule
    fn split_remainder(
        &mut self,
        part_index: EdgePartIndex,
        cur: PathSum,
        other_part_index: EdgePartIndex,
        other: PathSum,
        remainder: Weight,
    ) {
        self.stats.num_resplit_events += 1;
        let now = self.current_time;
        let other_active = self.store.clusters[other.top].active;
        if other_active {
            let half = remainder * Weight::from(0.5);
            let next_event_time = now + half;
            let mut heap = self.store.clusters[cur.top].edge_parts;
            let heap_node = self.store.heap_arena.insert(&mut heap, next_event_time, part_index);
            self.store.clusters[cur.top].edge_parts = heap;
            self.edge_parts[part_index].next_event_val = cur.total + half;
            self.edge_parts[part_index].heap_node = heap_node;
            let mut other_heap = self.store.clusters[other.top].edge_parts;
            self.store
                .heap_arena
                .decrease_key(&mut other_heap, self.edge_parts[other_part_index].heap_node, next_event_time);
            self.store.clusters[other.top].edge_parts = other_heap;
            self.edge_parts[other_part_index].next_event_val = other.total + half;
            self.push_next_edge_event(cur.top);
            self.push_next_edge_event(other.top);
        } else {
            // the inactive side's contribution is frozen, so this side pays the rest alone;
            // the frozen part is repriced to fire the moment its cluster is absorbed
            let next_event_time = now + remainder;
            let cost = self.edge_costs[part_index / 2];
            let mut heap = self.store.clusters[cur.top].edge_parts;
            let heap_node = self.store.heap_arena.insert(&mut heap, next_event_time, part_index);
            self.store.clusters[cur.top].edge_parts = heap;
            self.edge_parts[part_index].next_event_val = cost - other.finished;
            self.edge_parts[part_index].heap_node = heap_node;
            let frozen_at = self.store.clusters[other.top].active_end_time;
            let mut other_heap = self.store.clusters[other.top].edge_parts;
            self.store
                .heap_arena
                .decrease_key(&mut other_heap, self.edge_parts[other_part_index].heap_node, frozen_at);
            self.store.clusters[other.top].edge_parts = other_heap;
            self.edge_parts[other_part_index].next_event_val = other.finished;
            self.push_next_edge_event(cur.top);
        }
        if self.logger.enabled(2) {
            self.logger.log(&format!(
                "t={}: edge {} not yet tight, remainder {} re-split",
                now,
                part_index / 2,
                remainder
            ));
        }
    }

    /// merge the two clusters joined by a tight edge; `cur` must be the active side the
    /// event fired from
    fn merge_clusters(
        &mut self,
        edge_index: EdgeIndex,
        part_index: EdgePartIndex,
        cur: PathSum,
        other_part_index: EdgePartIndex,
        other: PathSum,
    ) -> Result<(), SolverError> {
        let now = self.current_time;
        if !self.store.clusters[cur.top].active {
            return Err(self.fail("merge initiated from an inactive cluster"));
        }
        self.good_edges.push(edge_index);
        let new_index = self.store.clusters.len();
        // finalize the side the event fired from
        {
            let cluster = &mut self.store.clusters[cur.top];
            cluster.active = false;
            cluster.active_end_time = now;
            cluster.moat = now - cluster.active_start_time;
            cluster.merged_into = Some(new_index);
            self.num_active_clusters -= 1;
        }
        let other_was_active = self.store.clusters[other.top].active;
        let contains_root = self.store.clusters[cur.top].contains_root || self.store.clusters[other.top].contains_root;
        if other_was_active {
            let cluster = &mut self.store.clusters[other.top];
            cluster.active = false;
            cluster.active_end_time = now;
            cluster.moat = now - cluster.active_start_time;
            cluster.merged_into = Some(new_index);
            self.num_active_clusters -= 1;
        } else {
            self.store.clusters[other.top].merged_into = Some(new_index);
            if !contains_root {
                // realign the absorbed side's frozen heap clock with the current time
                let gap = now - self.store.clusters[other.top].active_end_time;
                let frozen_heap = self.store.clusters[other.top].edge_parts;
                self.store.heap_arena.add_to_all(&frozen_heap, gap);
                self.edge_inactive_merge_event[edge_index] = Some(self.inactive_merge_events.len());
                self.inactive_merge_events.push(InactiveMergeEvent {
                    active_cluster: cur.top,
                    inactive_cluster: other.top,
                    active_node: self.endpoint_of(part_index),
                    inactive_node: self.endpoint_of(other_part_index),
                });
            }
        }
        let prize_sum = self.store.clusters[cur.top].prize_sum + self.store.clusters[other.top].prize_sum;
        let subcluster_moat_sum = self.store.clusters[cur.top].subcluster_moat_sum
            + self.store.clusters[cur.top].moat
            + self.store.clusters[other.top].subcluster_moat_sum
            + self.store.clusters[other.top].moat;
        let merged_heap = self
            .store
            .heap_arena
            .meld(self.store.clusters[cur.top].edge_parts, self.store.clusters[other.top].edge_parts);
        self.store.clusters[cur.top].edge_parts = PairingHeap::new();
        self.store.clusters[other.top].edge_parts = PairingHeap::new();
        let active = !contains_root;
        self.store.clusters.push(Cluster {
            edge_parts: merged_heap,
            active,
            active_start_time: now,
            active_end_time: now,
            merged_into: None,
            prize_sum,
            subcluster_moat_sum,
            moat: Weight::zero(),
            contains_root,
            skip_up: None,
            skip_up_sum: Weight::zero(),
            merged_along: Some(edge_index),
            child_cluster_1: Some(cur.top),
            child_cluster_2: Some(other.top),
            necessary: false,
        });
        if active {
            self.num_active_clusters += 1;
            let mut remaining = prize_sum - subcluster_moat_sum;
            if remaining < Weight::zero() {
                remaining = Weight::zero();
            }
            self.event_queue
                .will_happen(now + remaining, GrowthEvent::ClusterDeactivation { cluster: new_index });
            self.push_next_edge_event(new_index);
        }
        Ok(())
    }

    fn sum_on_edge_part(&mut self, part_index: EdgePartIndex) -> PathSum {
        let now = self.current_time;
        self.store.sum_from(self.endpoint_of(part_index), now)
    }

    fn endpoint_of(&self, part_index: EdgePartIndex) -> NodeIndex {
        let edge = &self.initializer.weighted_edges[part_index / 2];
        if part_index % 2 == 0 {
            edge.u
        } else {
            edge.v
        }
    }

    /// queue the next edge event of an active top-level cluster, if it has one
    fn push_next_edge_event(&mut self, cluster_index: ClusterIndex) {
        let cluster = &self.store.clusters[cluster_index];
        if !cluster.active || cluster.merged_into.is_some() {
            return;
        }
        if let Some((value, _)) = self.store.heap_arena.get_min(&cluster.edge_parts) {
            self.event_queue
                .will_happen(value, GrowthEvent::EdgePartActive { cluster: cluster_index });
        }
    }

    /// nodes that survive growth: everything under the root's final cluster (rooted), or
    /// under a top-level cluster still active at termination (unrooted)
    pub fn good_nodes(&self) -> Vec<bool> {
        let node_num = self.initializer.node_num;
        let mut good = vec![false; node_num];
        match self.root {
            Some(root) => {
                let top = self.store.find(root);
                self.store.for_each_leaf(top, node_num, |node| good[node] = true);
            }
            None => {
                for cluster_index in 0..self.store.clusters.len() {
                    let cluster = &self.store.clusters[cluster_index];
                    if cluster.merged_into.is_none() && cluster.active {
                        self.store.for_each_leaf(cluster_index, node_num, |node| good[node] = true);
                    }
                }
            }
        }
        good
    }

    fn fail(&self, message: &str) -> SolverError {
        SolverError::AlgorithmFailure {
            message: message.to_string(),
            context: FailureContext::new(self.initializer, self.config),
        }
    }
}
