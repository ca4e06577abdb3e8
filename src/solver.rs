//! PCSF Solver
//!
//! Top-level orchestration: eager input validation, the moat growth phase, pruning, and
//! result assembly. A solver instance is a per-solve value; nothing global is touched and
//! all memory is released together when the instance is dropped.
//!

use crate::growth::*;
use crate::pruning::*;
use crate::util::*;

pub struct PcsfSolver<'a> {
    initializer: &'a SolverInitializer,
    config: SolverConfig,
    log_sink: Option<&'a dyn Fn(&str)>,
}

impl<'a> PcsfSolver<'a> {
    /// validate the instance and parameters; nothing is allocated for the solve on error
    pub fn new(initializer: &'a SolverInitializer, config: SolverConfig) -> Result<Self, SolverError> {
        initializer.validate(&config)?;
        Ok(Self {
            initializer,
            config,
            log_sink: None,
        })
    }

    pub fn set_log_sink(&mut self, sink: &'a dyn Fn(&str)) {
        self.log_sink = Some(sink);
    }

    pub fn run(&self) -> Result<SolverOutput, SolverError> {
        let logger = Logger::new(self.config.verbosity, self.log_sink);
        let mut growth = GrowthDriver::new(self.initializer, &self.config, logger);
        growth.run()?;
        let output = Pruner::new(self.initializer, &mut growth).run(self.config.pruning);
        if logger.enabled(1) {
            logger.log(&format!(
                "selected {} nodes and {} edges, objective {}",
                output.node_ids.len(),
                output.edge_ids.len(),
                self.initializer.get_output_objective(&output)
            ));
        }
        Ok(output)
    }
}

/// one-shot entry point
pub fn solve(
    initializer: &SolverInitializer,
    config: &SolverConfig,
    log_sink: Option<&dyn Fn(&str)>,
) -> Result<SolverOutput, SolverError> {
    let mut solver = PcsfSolver::new(initializer, config.clone())?;
    if let Some(sink) = log_sink {
        solver.set_log_sink(sink);
    }
    solver.run()
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::example_graphs::*;
    use maplit::btreeset;
    use more_asserts::{assert_ge, assert_le};
    use std::collections::BTreeSet;

    fn solve_with(
        initializer: &SolverInitializer,
        root: Option<NodeIndex>,
        target_num_active_clusters: usize,
        pruning: PruningMethod,
    ) -> SolverOutput {
        let config = SolverConfig {
            root,
            target_num_active_clusters,
            pruning,
            verbosity: 0,
        };
        solve(initializer, &config, None).unwrap()
    }

    fn node_set(output: &SolverOutput) -> BTreeSet<NodeIndex> {
        output.node_ids.iter().copied().collect()
    }

    fn edge_set(output: &SolverOutput) -> BTreeSet<EdgeIndex> {
        output.edge_ids.iter().copied().collect()
    }

    #[test]
    fn solver_chain_unrooted_strong() {
        // cargo test solver_chain_unrooted_strong -- --nocapture
        let initializer = ChainGraph::new(vec![50., 10., 15., 40.], vec![5., 8., 12.]).initializer();
        let output = solve_with(&initializer, None, 1, PruningMethod::Strong);
        assert_eq!(edge_set(&output), btreeset! {0, 1, 2});
        assert_eq!(node_set(&output), btreeset! {0, 1, 2, 3});
        assert_eq!(initializer.get_output_objective(&output), 90.);
    }

    #[test]
    fn solver_chain_rooted_simple() {
        // cargo test solver_chain_rooted_simple -- --nocapture
        let initializer = ChainGraph::new(vec![50., 10., 15., 40.], vec![5., 8., 12.]).initializer();
        let output = solve_with(&initializer, Some(0), 0, PruningMethod::Simple);
        assert_eq!(edge_set(&output), btreeset! {0, 1, 2});
        assert_eq!(node_set(&output), btreeset! {0, 1, 2, 3});
        assert_eq!(initializer.get_output_objective(&output), 90.);
    }

    #[test]
    fn solver_star_keeps_steiner_center() {
        // cargo test solver_star_keeps_steiner_center -- --nocapture
        let initializer = StarGraph::new(0., vec![100., 80., 60., 90.], vec![10., 12., 8., 15.]).initializer();
        for pruning in [PruningMethod::Strong, PruningMethod::Gw, PruningMethod::Simple] {
            let output = solve_with(&initializer, None, 1, pruning);
            assert_eq!(edge_set(&output), btreeset! {0, 1, 2, 3}, "pruning {:?}", pruning);
            // node 0 carries no prize but is kept for connectivity
            assert_eq!(node_set(&output), btreeset! {0, 1, 2, 3, 4});
            assert_eq!(initializer.get_output_objective(&output), 285.);
        }
    }

    #[test]
    fn solver_three_components_forest() {
        // cargo test solver_three_components_forest -- --nocapture
        let initializer = SolverInitializer::new(
            vec![10., 10., 10., 10., 10., 10.],
            vec![
                WeightedEdge::new(0, 1, 4.),
                WeightedEdge::new(2, 3, 4.),
                WeightedEdge::new(4, 5, 4.),
            ],
        );
        let output = solve_with(&initializer, None, 3, PruningMethod::Strong);
        assert_eq!(edge_set(&output), btreeset! {0, 1, 2});
        assert_eq!(node_set(&output), btreeset! {0, 1, 2, 3, 4, 5});
        assert_eq!(initializer.get_output_objective(&output), 48.);
    }

    #[test]
    fn solver_single_node_no_edges() {
        // cargo test solver_single_node_no_edges -- --nocapture
        let initializer = SolverInitializer::new(vec![50.], vec![]);
        let output = solve_with(&initializer, None, 1, PruningMethod::Strong);
        assert_eq!(output.node_ids, vec![0]);
        assert!(output.edge_ids.is_empty());
    }

    #[test]
    fn solver_triangle_all_unprofitable() {
        // cargo test solver_triangle_all_unprofitable -- --nocapture
        let initializer = SolverInitializer::new(
            vec![10., 20., 30.],
            vec![
                WeightedEdge::new(0, 1, 100.),
                WeightedEdge::new(1, 2, 100.),
                WeightedEdge::new(0, 2, 100.),
            ],
        );
        for pruning in [PruningMethod::None, PruningMethod::Simple, PruningMethod::Gw, PruningMethod::Strong] {
            let output = solve_with(&initializer, None, 0, pruning);
            assert!(output.node_ids.is_empty(), "pruning {:?}", pruning);
            assert!(output.edge_ids.is_empty());
        }
        // penalty-form check against the brute-force oracle: paying every prize is still
        // within the approximation factor
        let output = solve_with(&initializer, None, 0, PruningMethod::Strong);
        let opt_penalty = brute_force_min_penalty(&initializer);
        assert_le!(initializer.get_output_penalty(&output), 2. * opt_penalty + 1e-9);
    }

    #[test]
    fn solver_zero_cost_edge_merges_at_time_zero() {
        // cargo test solver_zero_cost_edge_merges_at_time_zero -- --nocapture
        let initializer = SolverInitializer::new(vec![5., 7.], vec![WeightedEdge::new(0, 1, 0.)]);
        let output = solve_with(&initializer, None, 1, PruningMethod::Strong);
        assert_eq!(output.edge_ids, vec![0]);
        assert_eq!(output.node_ids, vec![0, 1]);
        assert_eq!(initializer.get_output_objective(&output), 12.);
    }

    #[test]
    fn solver_self_loop_is_ignored() {
        // cargo test solver_self_loop_is_ignored -- --nocapture
        let initializer = SolverInitializer::new(vec![10.], vec![WeightedEdge::new(0, 0, 3.)]);
        let output = solve_with(&initializer, None, 1, PruningMethod::Strong);
        assert_eq!(output.node_ids, vec![0]);
        assert!(output.edge_ids.is_empty());
        // even when growth runs to full deactivation the loop never becomes a good edge
        let output = solve_with(&initializer, None, 0, PruningMethod::Strong);
        assert!(output.edge_ids.is_empty());
    }

    #[test]
    fn solver_parallel_edges_pick_one() {
        // cargo test solver_parallel_edges_pick_one -- --nocapture
        let initializer = SolverInitializer::new(
            vec![20., 20.],
            vec![WeightedEdge::new(0, 1, 6.), WeightedEdge::new(0, 1, 10.)],
        );
        let output = solve_with(&initializer, None, 1, PruningMethod::Strong);
        assert_eq!(output.edge_ids, vec![0], "only the cheaper parallel edge is selected");
        assert_eq!(output.node_ids, vec![0, 1]);
    }

    #[test]
    fn solver_zero_prizes_empty_result() {
        // cargo test solver_zero_prizes_empty_result -- --nocapture
        let initializer = SolverInitializer::new(
            vec![0., 0., 0.],
            vec![WeightedEdge::new(0, 1, 1.), WeightedEdge::new(1, 2, 1.)],
        );
        for pruning in [PruningMethod::None, PruningMethod::Simple, PruningMethod::Gw, PruningMethod::Strong] {
            let output = solve_with(&initializer, None, 0, pruning);
            assert!(output.node_ids.is_empty(), "pruning {:?}", pruning);
            assert!(output.edge_ids.is_empty());
        }
    }

    #[test]
    fn solver_dominant_prizes_select_spanning_forest() {
        // cargo test solver_dominant_prizes_select_spanning_forest -- --nocapture
        // 4-cycle with huge prizes: any spanning tree of the cycle is selected
        let initializer = SolverInitializer::new(
            vec![1000.; 4],
            vec![
                WeightedEdge::new(0, 1, 1.),
                WeightedEdge::new(1, 2, 1.),
                WeightedEdge::new(2, 3, 1.),
                WeightedEdge::new(3, 0, 1.),
            ],
        );
        let output = solve_with(&initializer, None, 1, PruningMethod::Strong);
        assert_eq!(output.node_ids, vec![0, 1, 2, 3]);
        assert_eq!(output.edge_ids.len(), 3);
        assert!(subgraph_is_forest(&initializer, &output));
        assert!(subgraph_is_connected(&initializer, &output));
        assert_eq!(initializer.get_output_objective(&output), 4000. - 3.);
    }

    #[test]
    fn solver_rooted_connectivity() {
        // cargo test solver_rooted_connectivity -- --nocapture
        for seed in [0, 1, 2, 3, 4] {
            let initializer = RandomGraph {
                node_num: 12,
                edge_probability: 0.3,
                max_prize: 10.,
                max_cost: 6.,
                seed,
            }
            .initializer();
            for pruning in [PruningMethod::Simple, PruningMethod::Strong] {
                let output = solve_with(&initializer, Some(0), 0, pruning);
                assert!(output.node_ids.contains(&0), "the root is always selected");
                assert!(subgraph_is_forest(&initializer, &output));
                assert!(subgraph_is_connected(&initializer, &output));
            }
        }
    }

    #[test]
    fn solver_random_outputs_are_forests() {
        // cargo test solver_random_outputs_are_forests -- --nocapture
        for seed in 0..20 {
            let initializer = RandomGraph {
                node_num: 30,
                edge_probability: 0.15,
                max_prize: 8.,
                max_cost: 5.,
                seed,
            }
            .initializer();
            for pruning in [PruningMethod::None, PruningMethod::Simple, PruningMethod::Gw, PruningMethod::Strong] {
                let output = solve_with(&initializer, None, 1, pruning);
                assert!(subgraph_is_forest(&initializer, &output), "seed {seed} pruning {pruning:?}");
                // node and edge ids are distinct and in range
                assert!(output.node_ids.windows(2).all(|w| w[0] < w[1]));
                assert!(output.edge_ids.windows(2).all(|w| w[0] < w[1]));
                assert!(output.node_ids.iter().all(|&v| v < initializer.node_num));
                assert!(output.edge_ids.iter().all(|&e| e < initializer.weighted_edges.len()));
            }
            // strong pruning never returns a negative objective
            let output = solve_with(&initializer, None, 1, PruningMethod::Strong);
            assert_ge!(initializer.get_output_objective(&output), -1e-9);
        }
    }

    #[test]
    fn solver_deterministic_across_runs() {
        // cargo test solver_deterministic_across_runs -- --nocapture
        let initializer = RandomGraph {
            node_num: 25,
            edge_probability: 0.2,
            max_prize: 10.,
            max_cost: 8.,
            seed: 42,
        }
        .initializer();
        for pruning in [PruningMethod::None, PruningMethod::Simple, PruningMethod::Gw, PruningMethod::Strong] {
            let first = solve_with(&initializer, None, 1, pruning);
            let second = solve_with(&initializer, None, 1, pruning);
            assert_eq!(first, second, "identical inputs must yield identical outputs");
        }
    }

    #[test]
    fn solver_approximation_bound_small_instances() {
        // cargo test solver_approximation_bound_small_instances -- --nocapture
        // exact hand-checkable instances first
        let chain = ChainGraph::new(vec![50., 10., 15., 40.], vec![5., 8., 12.]).initializer();
        assert_eq!(brute_force_best_objective(&chain), 90.);
        let star = StarGraph::new(0., vec![100., 80., 60., 90.], vec![10., 12., 8., 15.]).initializer();
        assert_eq!(brute_force_best_objective(&star), 285.);
        // penalty-form 2-approximation on small random instances
        for seed in [7, 8] {
            let initializer = RandomGraph {
                node_num: 6,
                edge_probability: 0.6,
                max_prize: 6.,
                max_cost: 4.,
                seed,
            }
            .initializer();
            let opt_penalty = brute_force_min_penalty(&initializer);
            for pruning in [PruningMethod::Gw, PruningMethod::Strong] {
                let output = solve_with(&initializer, None, 1, pruning);
                let penalty = initializer.get_output_penalty(&output);
                assert_le!(penalty, 2. * opt_penalty + 1e-9, "seed {seed} pruning {pruning:?}");
            }
        }
    }

    #[test]
    fn solver_input_validation() {
        // cargo test solver_input_validation -- --nocapture
        let valid = SolverInitializer::new(vec![1., 2.], vec![WeightedEdge::new(0, 1, 1.)]);
        let config = SolverConfig::default();
        assert!(solve(&valid, &config, None).is_ok());

        let negative_cost = SolverInitializer::new(vec![1., 2.], vec![WeightedEdge::new(0, 1, -1.)]);
        assert_eq!(
            solve(&negative_cost, &config, None),
            Err(SolverError::InvalidInput(InputError::NegativeCost {
                edge_index: 0,
                cost: -1.
            }))
        );

        let negative_prize = SolverInitializer::new(vec![1., -2.], vec![]);
        assert_eq!(
            solve(&negative_prize, &config, None),
            Err(SolverError::InvalidInput(InputError::NegativePrize {
                node_index: 1,
                prize: -2.
            }))
        );

        let non_finite = SolverInitializer::new(vec![1., f64::NAN], vec![]);
        assert!(matches!(
            solve(&non_finite, &config, None),
            Err(SolverError::InvalidInput(InputError::NonFinite { what: "prize", index: 1, .. }))
        ));

        let infinite_cost = SolverInitializer::new(vec![1., 2.], vec![WeightedEdge::new(0, 1, f64::INFINITY)]);
        assert!(matches!(
            solve(&infinite_cost, &config, None),
            Err(SolverError::InvalidInput(InputError::NonFinite { what: "cost", index: 0, .. }))
        ));

        let out_of_range = SolverInitializer::new(vec![1., 2.], vec![WeightedEdge::new(0, 5, 1.)]);
        assert_eq!(
            solve(&out_of_range, &config, None),
            Err(SolverError::InvalidInput(InputError::EdgeEndpointOutOfRange {
                edge_index: 0,
                endpoint: 5,
                node_num: 2
            }))
        );

        let bad_root = SolverConfig {
            root: Some(7),
            target_num_active_clusters: 0,
            ..Default::default()
        };
        assert_eq!(
            solve(&valid, &bad_root, None),
            Err(SolverError::InvalidInput(InputError::RootOutOfRange {
                root: 7,
                node_num: 2
            }))
        );

        let root_with_clusters = SolverConfig {
            root: Some(0),
            target_num_active_clusters: 2,
            ..Default::default()
        };
        assert_eq!(
            solve(&valid, &root_with_clusters, None),
            Err(SolverError::InvalidInput(InputError::RootConflictsWithClusters {
                target_num_active_clusters: 2
            }))
        );

        let rooted_gw = SolverConfig {
            root: Some(0),
            target_num_active_clusters: 0,
            pruning: PruningMethod::Gw,
            ..Default::default()
        };
        assert_eq!(
            solve(&valid, &rooted_gw, None),
            Err(SolverError::InvalidInput(InputError::RootWithGwPruning))
        );
    }

    #[test]
    fn solver_log_sink_receives_messages() {
        // cargo test solver_log_sink_receives_messages -- --nocapture
        let initializer = ChainGraph::new(vec![50., 10., 15., 40.], vec![5., 8., 12.]).initializer();
        let config = SolverConfig {
            target_num_active_clusters: 1,
            verbosity: 2,
            ..Default::default()
        };
        let messages = std::cell::RefCell::new(Vec::<String>::new());
        let sink = |message: &str| messages.borrow_mut().push(message.to_string());
        solve(&initializer, &config, Some(&sink)).unwrap();
        assert!(!messages.borrow().is_empty(), "verbosity 2 must produce a trace");
        assert!(messages.borrow().iter().any(|m| m.contains("merging")));
    }
}
