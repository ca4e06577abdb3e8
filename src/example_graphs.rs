//! Example Graphs
//!
//! Deterministic instance generators used by the tests and the benchmark command, plus
//! small reference oracles (brute force, forest and connectivity checks). These are for
//! debugging and verification, not for modelling any particular application domain.
//!

use crate::util::*;
use petgraph::algo::{connected_components, is_cyclic_undirected, min_spanning_tree};
use petgraph::data::FromElements;
use petgraph::graph::UnGraph;
use rand_xoshiro::rand_core::SeedableRng;

pub trait ExampleGraph {
    fn initializer(&self) -> SolverInitializer;
}

/// a path `0 - 1 - ... - (n-1)`
pub struct ChainGraph {
    pub prizes: Vec<f64>,
    pub costs: Vec<f64>,
}

impl ChainGraph {
    pub fn new(prizes: Vec<f64>, costs: Vec<f64>) -> Self {
        assert_eq!(prizes.len(), costs.len() + 1, "a chain on n nodes has n - 1 edges");
        Self { prizes, costs }
    }
}

impl ExampleGraph for ChainGraph {
    fn initializer(&self) -> SolverInitializer {
        let weighted_edges = self
            .costs
            .iter()
            .enumerate()
            .map(|(ii, &cost)| WeightedEdge::new(ii, ii + 1, cost))
            .collect();
        SolverInitializer::new(self.prizes.clone(), weighted_edges)
    }
}

/// node 0 is the center, connected to every leaf
pub struct StarGraph {
    pub center_prize: f64,
    pub leaf_prizes: Vec<f64>,
    pub leaf_costs: Vec<f64>,
}

impl StarGraph {
    pub fn new(center_prize: f64, leaf_prizes: Vec<f64>, leaf_costs: Vec<f64>) -> Self {
        assert_eq!(leaf_prizes.len(), leaf_costs.len());
        Self {
            center_prize,
            leaf_prizes,
            leaf_costs,
        }
    }
}

impl ExampleGraph for StarGraph {
    fn initializer(&self) -> SolverInitializer {
        let mut prizes = vec![self.center_prize];
        prizes.extend_from_slice(&self.leaf_prizes);
        let weighted_edges = self
            .leaf_costs
            .iter()
            .enumerate()
            .map(|(ii, &cost)| WeightedEdge::new(0, ii + 1, cost))
            .collect();
        SolverInitializer::new(prizes, weighted_edges)
    }
}

/// Erdős–Rényi style instance with uniform random prizes and costs
pub struct RandomGraph {
    pub node_num: NodeNum,
    pub edge_probability: f64,
    pub max_prize: f64,
    pub max_cost: f64,
    pub seed: u64,
}

impl ExampleGraph for RandomGraph {
    fn initializer(&self) -> SolverInitializer {
        let mut rng = DeterministicRng::seed_from_u64(self.seed);
        let prizes = (0..self.node_num).map(|_| rng.next_f64() * self.max_prize).collect();
        let mut weighted_edges = Vec::new();
        for u in 0..self.node_num {
            for v in (u + 1)..self.node_num {
                if rng.next_f64() < self.edge_probability {
                    weighted_edges.push(WeightedEdge::new(u, v, rng.next_f64() * self.max_cost));
                }
            }
        }
        SolverInitializer::new(prizes, weighted_edges)
    }
}

/// whether the selected edges form a forest over the selected nodes
pub fn subgraph_is_forest(initializer: &SolverInitializer, output: &SolverOutput) -> bool {
    let mut graph = UnGraph::<(), f64>::new_undirected();
    let mut node_map = vec![None; initializer.node_num];
    for &node in output.node_ids.iter() {
        node_map[node] = Some(graph.add_node(()));
    }
    for &edge_index in output.edge_ids.iter() {
        let edge = &initializer.weighted_edges[edge_index];
        let (Some(u), Some(v)) = (node_map[edge.u], node_map[edge.v]) else {
            return false; // an edge endpoint outside the selected node set
        };
        graph.add_edge(u, v, edge.cost);
    }
    !is_cyclic_undirected(&graph)
}

/// whether the selected subgraph is a single connected component
pub fn subgraph_is_connected(initializer: &SolverInitializer, output: &SolverOutput) -> bool {
    if output.node_ids.is_empty() {
        return true;
    }
    let mut graph = UnGraph::<(), f64>::new_undirected();
    let mut node_map = vec![None; initializer.node_num];
    for &node in output.node_ids.iter() {
        node_map[node] = Some(graph.add_node(()));
    }
    for &edge_index in output.edge_ids.iter() {
        let edge = &initializer.weighted_edges[edge_index];
        if let (Some(u), Some(v)) = (node_map[edge.u], node_map[edge.v]) {
            graph.add_edge(u, v, edge.cost);
        }
    }
    connected_components(&graph) == 1
}

/// exhaustive search over connected node subsets, returning the best achievable objective;
/// only feasible for small instances
pub fn brute_force_best_objective(initializer: &SolverInitializer) -> f64 {
    let node_num = initializer.node_num;
    assert!(node_num <= 16, "brute force is exponential in the node count");
    let mut best = 0f64; // the empty forest
    for mask in 1u32..(1 << node_num) {
        if let Some(objective) = subset_objective(initializer, mask) {
            best = best.max(objective);
        }
    }
    best
}

/// minimum of the penalty form `cost(T) + sum of prizes outside T` over connected subsets
pub fn brute_force_min_penalty(initializer: &SolverInitializer) -> f64 {
    let total_prize: f64 = initializer.prizes.iter().sum();
    total_prize - brute_force_best_objective(initializer)
}

/// objective of the best tree spanning exactly the nodes in `mask`, or `None` if the
/// induced subgraph is not connected
fn subset_objective(initializer: &SolverInitializer, mask: u32) -> Option<f64> {
    let mut graph = UnGraph::<(), f64>::new_undirected();
    let mut node_map = vec![None; initializer.node_num];
    let mut prize_sum = 0f64;
    for node in 0..initializer.node_num {
        if mask & (1 << node) != 0 {
            node_map[node] = Some(graph.add_node(()));
            prize_sum += initializer.prizes[node];
        }
    }
    for edge in initializer.weighted_edges.iter() {
        if let (Some(u), Some(v)) = (node_map[edge.u], node_map[edge.v]) {
            if u != v {
                graph.add_edge(u, v, edge.cost);
            }
        }
    }
    if connected_components(&graph) != 1 {
        return None;
    }
    let spanning: UnGraph<(), f64> = UnGraph::from_elements(min_spanning_tree(&graph));
    let tree_cost: f64 = spanning.edge_weights().sum();
    Some(prize_sum - tree_cost)
}
