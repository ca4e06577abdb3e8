use crate::clap;
use crate::clap::{Parser, Subcommand, ValueEnum};
use crate::example_graphs::*;
use crate::solver::*;
use crate::util::*;
use more_asserts::assert_le;
use pbr::ProgressBar;
use rand::{thread_rng, Rng};
use serde::Serialize;
use std::env;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

#[derive(Parser, Clone)]
#[clap(author = clap::crate_authors!(", "))]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Prize-Collecting Steiner Forest approximation solver")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// benchmark the speed (and also correctness if enabled) on random instances
    Benchmark(BenchmarkParameters),
}

#[derive(Parser, Clone)]
pub struct BenchmarkParameters {
    /// number of nodes of each random instance
    #[clap(value_parser)]
    node_num: NodeNum,
    /// probability of each node pair to be connected by an edge
    #[clap(value_parser)]
    edge_probability: f64,
    /// maximum node prize, sampled uniformly
    #[clap(long, default_value_t = 100.)]
    max_prize: f64,
    /// maximum edge cost, sampled uniformly
    #[clap(long, default_value_t = 50.)]
    max_cost: f64,
    /// the pruning method applied after growth
    #[clap(short = 'p', long, value_enum, default_value_t = PruningMethod::Strong)]
    pruning: PruningMethod,
    /// how many clusters may still be growing when growth stops
    #[clap(long, default_value_t = 1)]
    target_num_active_clusters: usize,
    /// solve the rooted variant from this node; forces target_num_active_clusters = 0
    #[clap(long)]
    root: Option<NodeIndex>,
    /// the method to verify the correctness of each solve
    #[clap(long, value_enum, default_value_t = Verifier::Structural)]
    verifier: Verifier,
    /// the number of instances to solve
    #[clap(short = 'r', long, default_value_t = 1000)]
    total_rounds: usize,
    /// message on the progress bar
    #[clap(long, default_value_t = format!(""))]
    pb_message: String,
    /// use deterministic seed for debugging purpose
    #[clap(long, action)]
    use_deterministic_seed: bool,
    /// skip some iterations, useful when debugging
    #[clap(long, default_value_t = 0)]
    starting_iteration: usize,
    /// print the solver trace of every round to stderr
    #[clap(long, default_value_t = 0)]
    verbosity: u8,
    /// write a JSON summary of the benchmark to this path
    #[clap(long)]
    benchmark_output: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Debug)]
pub enum Verifier {
    /// disable verifier
    None,
    /// check the forest property, index ranges and (rooted) connectivity
    Structural,
    /// also compare against brute force on small instances
    BruteForce,
}

#[derive(Debug, Serialize)]
struct BenchmarkSummary {
    node_num: NodeNum,
    edge_probability: f64,
    pruning: PruningMethod,
    total_rounds: usize,
    total_solve_seconds: f64,
    average_solve_seconds: f64,
    average_objective: f64,
}

impl Cli {
    pub fn run(self) {
        match self.command {
            Commands::Benchmark(BenchmarkParameters {
                node_num,
                edge_probability,
                max_prize,
                max_cost,
                pruning,
                target_num_active_clusters,
                root,
                verifier,
                total_rounds,
                pb_message,
                use_deterministic_seed,
                starting_iteration,
                verbosity,
                benchmark_output,
            }) => {
                // whether to disable progress bar, useful when running jobs in background
                let disable_progress_bar = env::var("DISABLE_PROGRESS_BAR").is_ok();
                let config = SolverConfig {
                    root,
                    target_num_active_clusters: if root.is_some() { 0 } else { target_num_active_clusters },
                    pruning,
                    verbosity,
                };
                let result_verifier = verifier.build();
                let mut pb = if !disable_progress_bar {
                    let mut pb = ProgressBar::on(std::io::stderr(), total_rounds as u64);
                    pb.message(format!("{pb_message} ").as_str());
                    Some(pb)
                } else {
                    if !pb_message.is_empty() {
                        print!("{pb_message} ");
                    }
                    None
                };
                let stderr_sink = |message: &str| eprintln!("{message}");
                let mut rng = thread_rng();
                let mut total_solve_seconds = 0.;
                let mut total_objective = 0.;
                for round in starting_iteration..total_rounds {
                    if let Some(pb) = pb.as_mut() {
                        pb.set(round as u64);
                    }
                    let seed = if use_deterministic_seed { round as u64 } else { rng.gen() };
                    let initializer = RandomGraph {
                        node_num,
                        edge_probability,
                        max_prize,
                        max_cost,
                        seed,
                    }
                    .initializer();
                    let begin = Instant::now();
                    let output = solve(&initializer, &config, Some(&stderr_sink)).unwrap();
                    total_solve_seconds += begin.elapsed().as_secs_f64();
                    total_objective += initializer.get_output_objective(&output);
                    result_verifier.verify(&initializer, &config, &output);
                }
                if let Some(pb) = pb.as_mut() {
                    pb.finish();
                    eprintln!();
                }
                let rounds = total_rounds - starting_iteration;
                let summary = BenchmarkSummary {
                    node_num,
                    edge_probability,
                    pruning,
                    total_rounds: rounds,
                    total_solve_seconds,
                    average_solve_seconds: total_solve_seconds / rounds.max(1) as f64,
                    average_objective: total_objective / rounds.max(1) as f64,
                };
                println!(
                    "{} rounds, {:.3}s total, {:.6}s per solve, average objective {:.3}",
                    summary.total_rounds,
                    summary.total_solve_seconds,
                    summary.average_solve_seconds,
                    summary.average_objective
                );
                if let Some(path) = benchmark_output {
                    let mut file = File::create(&path).expect("cannot create benchmark output file");
                    file.write_all(json!(summary).to_string().as_bytes())
                        .expect("cannot write benchmark output file");
                }
            }
        }
    }
}

impl Verifier {
    fn build(&self) -> Box<dyn ResultVerifier> {
        match self {
            Self::None => Box::new(VerifierNone {}),
            Self::Structural => Box::new(VerifierStructural {}),
            Self::BruteForce => Box::new(VerifierBruteForce {}),
        }
    }
}

trait ResultVerifier {
    fn verify(&self, initializer: &SolverInitializer, config: &SolverConfig, output: &SolverOutput);
}

struct VerifierNone {}

impl ResultVerifier for VerifierNone {
    fn verify(&self, _initializer: &SolverInitializer, _config: &SolverConfig, _output: &SolverOutput) {}
}

struct VerifierStructural {}

impl ResultVerifier for VerifierStructural {
    fn verify(&self, initializer: &SolverInitializer, config: &SolverConfig, output: &SolverOutput) {
        assert!(
            subgraph_is_forest(initializer, output),
            "bug: the selected edges contain a cycle"
        );
        assert!(output.node_ids.windows(2).all(|w| w[0] < w[1]), "node ids must be distinct");
        assert!(output.edge_ids.windows(2).all(|w| w[0] < w[1]), "edge ids must be distinct");
        if let Some(root) = config.root {
            assert!(output.node_ids.contains(&root), "bug: the root is not selected");
            // `none` pruning returns the raw growth trace, which may span dead components
            if config.pruning != PruningMethod::None {
                assert!(
                    subgraph_is_connected(initializer, output),
                    "bug: a selected node is not connected to the root"
                );
            }
        }
    }
}

struct VerifierBruteForce {}

impl ResultVerifier for VerifierBruteForce {
    fn verify(&self, initializer: &SolverInitializer, config: &SolverConfig, output: &SolverOutput) {
        VerifierStructural {}.verify(initializer, config, output);
        if initializer.node_num > 14 {
            unimplemented!("brute force verification is exponential, use small instances");
        }
        if config.root.is_none() && config.target_num_active_clusters == 1 {
            let opt_penalty = brute_force_min_penalty(initializer);
            let penalty = initializer.get_output_penalty(output);
            assert_le!(
                penalty,
                2. * opt_penalty + 1e-6,
                "the primal-dual approximation guarantee is violated"
            );
        }
    }
}
