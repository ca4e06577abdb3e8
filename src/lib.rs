extern crate serde;
#[macro_use]
extern crate serde_json;
extern crate clap;
extern crate derivative;
extern crate hashbrown;
extern crate itertools;
extern crate maplit;
extern crate more_asserts;
extern crate num_traits;
extern crate petgraph;
extern crate rand;
extern crate rand_xoshiro;
extern crate thiserror;

#[cfg(feature = "cli")]
pub mod cli;
pub mod cluster;
pub mod event_queue;
pub mod example_graphs;
pub mod growth;
pub mod ordered_float;
pub mod pairing_heap;
pub mod pruning;
pub mod solver;
pub mod util;
