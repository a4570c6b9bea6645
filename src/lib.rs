extern crate cfg_if;
extern crate chrono;
extern crate derivative;
extern crate libc;
extern crate rand;
extern crate rand_xoshiro;
extern crate rayon;
extern crate serde;
#[macro_use]
extern crate serde_json;

pub mod blossom_serial;
pub mod blossom_v;
pub mod correction;
pub mod decoding_graph;
pub mod error;
pub mod lattice;
pub mod mwpm_solver;
pub mod simulation;
pub mod syndrome;
pub mod util;
pub mod visualize;

use error::MatchingError;
use mwpm_solver::{Matching, MatchingSolver};
use util::*;

/// solve a minimum-weight perfect matching with the serial blossom solver
pub fn planar_mwpm(node_num: NodeNum, weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Result<Matching, MatchingError> {
    mwpm_solver::SolverSerial::new().solve(node_num, weighted_edges)
}

/// fall back to the blossom V library (install blossom V required)
pub fn blossom_v_mwpm(node_num: NodeNum, weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Result<Matching, MatchingError> {
    mwpm_solver::SolverBlossomV::new()?.solve(node_num, weighted_edges)
}

/// run one trial of `config` with the default solver and report whether the logical state survived
pub fn simulate_and_decode(config: &simulation::TrialConfig, seed: u64) -> error::Result<bool> {
    config.validate()?;
    let mut solver = mwpm_solver::SolverSerial::new();
    Ok(simulation::run_trial(config, 0, seed, &mut solver)?.success)
}
