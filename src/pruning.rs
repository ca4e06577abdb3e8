//! Pruning
//!
//! Post-processing of the growth trace. Growth marks the surviving clusters; pruning
//! restricts the tight edges to those clusters and then, depending on the method, removes
//! further edges whose removal improves the objective. The final node and edge sets are
//! assembled here.
//!

use crate::growth::*;
use crate::util::*;
use hashbrown::HashMap;
use itertools::Itertools;

pub struct Pruner<'a, 'g> {
    growth: &'a mut GrowthDriver<'g>,
    initializer: &'a SolverInitializer,
    root: Option<NodeIndex>,
    node_good: Vec<bool>,
    node_deleted: Vec<bool>,
    /// adjacency over the surviving forest: node -> (neighbor, edge index)
    neighbors: Vec<Vec<(NodeIndex, EdgeIndex)>>,
}

impl<'a, 'g> Pruner<'a, 'g> {
    pub fn new(initializer: &'a SolverInitializer, growth: &'a mut GrowthDriver<'g>) -> Self {
        let node_good = growth.good_nodes();
        let node_num = initializer.node_num;
        let root = growth.root;
        Self {
            growth,
            initializer,
            root,
            node_good,
            node_deleted: vec![false; node_num],
            neighbors: vec![Vec::new(); node_num],
        }
    }

    pub fn run(self, method: PruningMethod) -> SolverOutput {
        match method {
            PruningMethod::None => {
                let kept = self.growth.good_edges.clone();
                self.assemble(kept)
            }
            PruningMethod::Simple => self.prune_simple(),
            PruningMethod::Gw => self.prune_gw(),
            PruningMethod::Strong => self.prune_strong(),
        }
    }

    /// tight edges whose both endpoints survived growth; these form the surviving forest
    fn surviving_edges(&self) -> Vec<EdgeIndex> {
        self.growth
            .good_edges
            .iter()
            .copied()
            .filter(|&edge_index| {
                let edge = &self.initializer.weighted_edges[edge_index];
                self.node_good[edge.u] && self.node_good[edge.v]
            })
            .collect()
    }

    fn build_neighbors(&mut self, edges: &[EdgeIndex]) {
        for list in self.neighbors.iter_mut() {
            list.clear();
        }
        for &edge_index in edges {
            let edge = &self.initializer.weighted_edges[edge_index];
            self.neighbors[edge.u].push((edge.v, edge_index));
            self.neighbors[edge.v].push((edge.u, edge_index));
        }
    }

    /// iteratively delete leaf edges whose leaf prize is less than the edge cost
    fn prune_simple(mut self) -> SolverOutput {
        let surviving = self.surviving_edges();
        self.build_neighbors(&surviving);
        let node_num = self.initializer.node_num;
        let mut edge_alive: HashMap<EdgeIndex, bool> = surviving.iter().map(|&edge| (edge, true)).collect();
        let mut degree = vec![0usize; node_num];
        for &edge_index in surviving.iter() {
            let edge = &self.initializer.weighted_edges[edge_index];
            degree[edge.u] += 1;
            degree[edge.v] += 1;
        }
        let mut worklist: Vec<NodeIndex> = (0..node_num).filter(|&node| degree[node] == 1).collect();
        while let Some(node) = worklist.pop() {
            if degree[node] != 1 || Some(node) == self.root {
                continue;
            }
            let Some(&(neighbor, edge_index)) = self.neighbors[node]
                .iter()
                .find(|&&(_, edge_index)| edge_alive[&edge_index])
            else {
                continue;
            };
            if self.initializer.prizes[node] < self.initializer.weighted_edges[edge_index].cost {
                edge_alive.insert(edge_index, false);
                degree[node] -= 1;
                degree[neighbor] -= 1;
                if degree[neighbor] == 1 {
                    worklist.push(neighbor);
                }
            }
        }
        let kept = surviving.into_iter().filter(|edge| edge_alive[edge]).collect();
        self.assemble(kept)
    }

    /// walk the merge tree newest-first; an absorbed inactive subcluster is kept only if a
    /// later-kept edge depends on it, otherwise its whole subtree is deleted
    fn prune_gw(mut self) -> SolverOutput {
        let surviving = self.surviving_edges();
        self.build_neighbors(&surviving);
        let mut kept = Vec::with_capacity(surviving.len());
        for &edge_index in surviving.iter().rev() {
            let edge = &self.initializer.weighted_edges[edge_index];
            if self.node_deleted[edge.u] && self.node_deleted[edge.v] {
                continue;
            }
            match self.growth.edge_inactive_merge_event[edge_index] {
                None => {
                    // both sides were growing when the edge became tight
                    if !self.node_deleted[edge.u] && !self.node_deleted[edge.v] {
                        kept.push(edge_index);
                        self.mark_clusters_necessary(edge.u);
                        self.mark_clusters_necessary(edge.v);
                    }
                }
                Some(event_index) => {
                    let event = self.growth.inactive_merge_events[event_index].clone();
                    if self.growth.store.clusters[event.inactive_cluster].necessary {
                        kept.push(edge_index);
                        self.mark_clusters_necessary(event.inactive_node);
                        self.mark_clusters_necessary(event.active_node);
                    } else {
                        self.mark_subtree_deleted(event.inactive_node, event.active_node);
                    }
                }
            }
        }
        self.assemble(kept)
    }

    /// per component of the surviving forest, root it and delete every subtree whose payoff
    /// does not cover the cost of its attaching edge
    fn prune_strong(mut self) -> SolverOutput {
        let surviving = self.surviving_edges();
        self.build_neighbors(&surviving);
        let node_num = self.initializer.node_num;
        let mut component = vec![usize::MAX; node_num];
        let mut component_first: Vec<NodeIndex> = Vec::new();
        for node in 0..node_num {
            if component[node] != usize::MAX || self.neighbors[node].is_empty() {
                continue;
            }
            let component_index = component_first.len();
            component_first.push(node);
            let mut queue = vec![node];
            component[node] = component_index;
            while let Some(current) = queue.pop() {
                for &(neighbor, _) in self.neighbors[current].iter() {
                    if component[neighbor] == usize::MAX {
                        component[neighbor] = component_index;
                        queue.push(neighbor);
                    }
                }
            }
        }
        let mut payoff = vec![0f64; node_num];
        let mut parent: Vec<Option<(NodeIndex, f64)>> = vec![None; node_num];
        for (component_index, &first_node) in component_first.iter().enumerate() {
            let component_root = match self.root {
                Some(root) if component[root] == component_index => root,
                _ => self.find_best_component_root(first_node, &mut payoff, &mut parent),
            };
            self.strong_prune_from(component_root, true, &mut payoff, &mut parent);
        }
        let kept = surviving
            .into_iter()
            .filter(|&edge_index| {
                let edge = &self.initializer.weighted_edges[edge_index];
                !self.node_deleted[edge.u] && !self.node_deleted[edge.v]
            })
            .collect();
        self.assemble(kept)
    }

    /// compute subtree payoffs below `tree_root` and, when `mark` is set, delete every
    /// subtree that does not pay for its attaching edge; returns the traversal pre-order
    fn strong_prune_from(
        &mut self,
        tree_root: NodeIndex,
        mark: bool,
        payoff: &mut [f64],
        parent: &mut [Option<(NodeIndex, f64)>],
    ) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        parent[tree_root] = None;
        let mut stack = vec![tree_root];
        while let Some(node) = stack.pop() {
            order.push(node);
            payoff[node] = self.initializer.prizes[node];
            let parent_node = parent[node].map(|(parent_node, _)| parent_node);
            for &(neighbor, edge_index) in self.neighbors[node].iter() {
                if Some(neighbor) != parent_node {
                    parent[neighbor] = Some((node, self.initializer.weighted_edges[edge_index].cost));
                    stack.push(neighbor);
                }
            }
        }
        for &node in order.iter().rev() {
            let Some((parent_node, edge_cost)) = parent[node] else {
                continue;
            };
            let net_payoff = payoff[node] - edge_cost;
            if net_payoff > 0. {
                payoff[parent_node] += net_payoff;
            } else if mark && !self.node_deleted[node] {
                self.mark_subtree_deleted(node, parent_node);
            }
        }
        order
    }

    /// rerooting pass: compute the payoff of the whole component for every choice of root
    /// and return the best one
    fn find_best_component_root(
        &mut self,
        first_node: NodeIndex,
        payoff: &mut [f64],
        parent: &mut [Option<(NodeIndex, f64)>],
    ) -> NodeIndex {
        let order = self.strong_prune_from(first_node, false, payoff, parent);
        let mut best_root = first_node;
        let mut best_value = payoff[first_node];
        // parents precede children in the order, so payoff[parent] already holds the value
        // of the whole component rooted at the parent when a child is visited
        for &node in order.iter().skip(1) {
            let Some((parent_node, edge_cost)) = parent[node] else {
                continue;
            };
            let subtree_value = payoff[node];
            let parent_without_node = payoff[parent_node] - (subtree_value - edge_cost).max(0.);
            let rerooted = subtree_value + (parent_without_node - edge_cost).max(0.);
            payoff[node] = rerooted;
            if rerooted > best_value {
                best_value = rerooted;
                best_root = node;
            }
        }
        best_root
    }

    /// flag every cluster on the merge-tree chain of `node` as load-bearing
    fn mark_clusters_necessary(&mut self, node: NodeIndex) {
        let mut cluster_index = node;
        loop {
            let cluster = &mut self.growth.store.clusters[cluster_index];
            if cluster.necessary {
                break;
            }
            cluster.necessary = true;
            match cluster.merged_into {
                Some(parent_cluster) => cluster_index = parent_cluster,
                None => break,
            }
        }
    }

    /// delete the whole forest subtree hanging off `start`, approached from `parent`
    fn mark_subtree_deleted(&mut self, start: NodeIndex, parent: NodeIndex) {
        self.node_deleted[start] = true;
        let mut queue = vec![start];
        while let Some(node) = queue.pop() {
            for ii in 0..self.neighbors[node].len() {
                let (neighbor, _) = self.neighbors[node][ii];
                if neighbor != parent && !self.node_deleted[neighbor] {
                    self.node_deleted[neighbor] = true;
                    queue.push(neighbor);
                }
            }
        }
    }

    /// final node and edge sets: endpoints of the kept edges plus isolated kept nodes that
    /// carry prize (and the root, which is always retained)
    fn assemble(&self, kept: Vec<EdgeIndex>) -> SolverOutput {
        let node_num = self.initializer.node_num;
        let mut selected = vec![false; node_num];
        for &edge_index in kept.iter() {
            let edge = &self.initializer.weighted_edges[edge_index];
            selected[edge.u] = true;
            selected[edge.v] = true;
        }
        for node in 0..node_num {
            let keep_isolated = match self.root {
                // every selected node must share a component with the root
                Some(root) => node == root,
                None => self.node_good[node] && !self.node_deleted[node] && self.initializer.prizes[node] > 0.,
            };
            if keep_isolated {
                selected[node] = true;
            }
        }
        SolverOutput {
            node_ids: (0..node_num).filter(|&node| selected[node]).collect(),
            edge_ids: kept.into_iter().sorted_unstable().collect(),
        }
    }
}
