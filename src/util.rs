use crate::rand_xoshiro;
use crate::rand_xoshiro::rand_core::RngCore;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub type Weight = crate::ordered_float::OrderedFloat;
pub type NodeIndex = usize;
pub type EdgeIndex = usize;
pub type ClusterIndex = usize;
/// edge part `2e` is the `u` endpoint of edge `e`, edge part `2e + 1` is the `v` endpoint
pub type EdgePartIndex = usize;
pub type NodeNum = usize;
pub type EdgeNum = usize;

/// use Xoshiro256StarStar for deterministic random number generator
pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// an undirected edge with a non-negative traversal cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedEdge {
    /// the two endpoints, each within the range [0, node_num)
    pub u: NodeIndex,
    pub v: NodeIndex,
    /// the cost of including this edge in the forest
    pub cost: f64,
}

impl WeightedEdge {
    pub fn new(u: NodeIndex, v: NodeIndex, cost: f64) -> Self {
        Self { u, v, cost }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverInitializer {
    /// the number of nodes
    pub node_num: NodeNum,
    /// non-negative node prizes, length `node_num`
    pub prizes: Vec<f64>,
    /// weighted edges, where node indices are within the range [0, node_num)
    pub weighted_edges: Vec<WeightedEdge>,
}

impl SolverInitializer {
    pub fn new(prizes: Vec<f64>, weighted_edges: Vec<WeightedEdge>) -> Self {
        Self {
            node_num: prizes.len(),
            prizes,
            weighted_edges,
        }
    }

    /// construct from the flat `(edges, costs, prizes)` representation used by host adapters
    pub fn from_arrays(prizes: Vec<f64>, edges: Vec<(NodeIndex, NodeIndex)>, costs: Vec<f64>) -> Self {
        assert_eq!(edges.len(), costs.len(), "each edge must come with exactly one cost");
        let weighted_edges = edges
            .into_iter()
            .zip(costs)
            .map(|((u, v), cost)| WeightedEdge::new(u, v, cost))
            .collect();
        Self::new(prizes, weighted_edges)
    }

    /// sanity check of the instance and the solve parameters, before anything is allocated for the solve
    pub fn validate(&self, config: &SolverConfig) -> Result<(), InputError> {
        for (node_index, &prize) in self.prizes.iter().enumerate() {
            if !prize.is_finite() {
                return Err(InputError::NonFinite {
                    what: "prize",
                    index: node_index,
                    value: prize,
                });
            }
            if prize < 0. {
                return Err(InputError::NegativePrize { node_index, prize });
            }
        }
        for (edge_index, edge) in self.weighted_edges.iter().enumerate() {
            if !edge.cost.is_finite() {
                return Err(InputError::NonFinite {
                    what: "cost",
                    index: edge_index,
                    value: edge.cost,
                });
            }
            if edge.cost < 0. {
                return Err(InputError::NegativeCost {
                    edge_index,
                    cost: edge.cost,
                });
            }
            for endpoint in [edge.u, edge.v] {
                if endpoint >= self.node_num {
                    return Err(InputError::EdgeEndpointOutOfRange {
                        edge_index,
                        endpoint,
                        node_num: self.node_num,
                    });
                }
            }
        }
        if let Some(root) = config.root {
            if root >= self.node_num {
                return Err(InputError::RootOutOfRange {
                    root,
                    node_num: self.node_num,
                });
            }
            if config.target_num_active_clusters != 0 {
                return Err(InputError::RootConflictsWithClusters {
                    target_num_active_clusters: config.target_num_active_clusters,
                });
            }
            if config.pruning == PruningMethod::Gw {
                return Err(InputError::RootWithGwPruning);
            }
        }
        Ok(())
    }

    /// the value `sum of selected prizes - sum of selected costs` of an output
    pub fn get_output_objective(&self, output: &SolverOutput) -> f64 {
        let prizes: f64 = output.node_ids.iter().map(|&v| self.prizes[v]).sum();
        let costs: f64 = output.edge_ids.iter().map(|&e| self.weighted_edges[e].cost).sum();
        prizes - costs
    }

    /// the penalty form `sum of selected costs + sum of unselected prizes`, the quantity
    /// bounded by the primal-dual analysis
    pub fn get_output_penalty(&self, output: &SolverOutput) -> f64 {
        let total_prize: f64 = self.prizes.iter().sum();
        total_prize - self.get_output_objective(output)
    }
}

/// how the growth trace is post-processed into the final forest
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize, Debug, Default)]
pub enum PruningMethod {
    /// keep every edge that became tight during growth, for benchmarking only
    None,
    /// drop edges leaving the surviving clusters, then unprofitable leaf edges
    Simple,
    /// walk the merge tree backwards and drop absorbed subclusters that never became necessary
    Gw,
    /// per-component rooted subtree deletion on top of the surviving forest
    #[default]
    Strong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// when set, the forest is a tree containing this node and growth runs in the rooted regime
    pub root: Option<NodeIndex>,
    /// growth stops once this many clusters are still actively growing; must be 0 when rooted
    pub target_num_active_clusters: usize,
    pub pruning: PruningMethod,
    /// 0: silent, 1: per-solve summary, 2: per-event trace
    pub verbosity: u8,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            root: None,
            target_num_active_clusters: 1,
            pruning: PruningMethod::Strong,
            verbosity: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    /// distinct selected node indices, ascending
    pub node_ids: Vec<NodeIndex>,
    /// distinct selected edge indices, ascending; they induce a forest over `node_ids`
    pub edge_ids: Vec<EdgeIndex>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("edge {edge_index} has negative cost {cost}")]
    NegativeCost { edge_index: EdgeIndex, cost: f64 },
    #[error("node {node_index} has negative prize {prize}")]
    NegativePrize { node_index: NodeIndex, prize: f64 },
    #[error("{what} at index {index} is not finite: {value}")]
    NonFinite {
        what: &'static str,
        index: usize,
        value: f64,
    },
    #[error("edge {edge_index} has endpoint {endpoint} out of range for {node_num} nodes")]
    EdgeEndpointOutOfRange {
        edge_index: EdgeIndex,
        endpoint: NodeIndex,
        node_num: NodeNum,
    },
    #[error("root {root} is out of range for {node_num} nodes")]
    RootOutOfRange { root: NodeIndex, node_num: NodeNum },
    #[error("target_num_active_clusters is {target_num_active_clusters} but must be 0 when a root is given")]
    RootConflictsWithClusters { target_num_active_clusters: usize },
    #[error("gw pruning is not supported for rooted instances, use simple or strong pruning")]
    RootWithGwPruning,
}

/// parameters of the failing solve, attached to internal failures so they can be reproduced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureContext {
    pub node_num: NodeNum,
    pub edge_num: EdgeNum,
    pub root: Option<NodeIndex>,
    pub target_num_active_clusters: usize,
    pub pruning: PruningMethod,
}

impl FailureContext {
    pub fn new(initializer: &SolverInitializer, config: &SolverConfig) -> Self {
        Self {
            node_num: initializer.node_num,
            edge_num: initializer.weighted_edges.len(),
            root: config.root,
            target_num_active_clusters: config.target_num_active_clusters,
            pruning: config.pruning,
        }
    }
}

impl std::fmt::Display for FailureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "node_num: {}, edge_num: {}, root: {:?}, target_num_active_clusters: {}, pruning: {:?}",
            self.node_num, self.edge_num, self.root, self.target_num_active_clusters, self.pruning
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    /// an internal invariant was violated; this indicates a bug, not bad input
    #[error("algorithm failure: {message} ({context})")]
    AlgorithmFailure { message: String, context: FailureContext },
}

/// log sink injected by the host; the core itself never prints
#[derive(Clone, Copy)]
pub struct Logger<'a> {
    verbosity: u8,
    sink: Option<&'a dyn Fn(&str)>,
}

impl<'a> Logger<'a> {
    pub fn new(verbosity: u8, sink: Option<&'a dyn Fn(&str)>) -> Self {
        Self { verbosity, sink }
    }

    pub fn silent() -> Self {
        Self {
            verbosity: 0,
            sink: None,
        }
    }

    pub fn enabled(&self, level: u8) -> bool {
        self.verbosity >= level && self.sink.is_some()
    }

    pub fn log(&self, message: &str) {
        if let Some(sink) = self.sink {
            sink(message);
        }
    }
}

impl std::fmt::Debug for Logger<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("verbosity", &self.verbosity).finish()
    }
}
