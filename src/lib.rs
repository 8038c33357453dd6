extern crate cfg_if;
extern crate log;
extern crate rand;
extern crate rand_xoshiro;
extern crate serde;
extern crate serde_json;
extern crate thiserror;

pub mod dual;
pub mod graph;
pub mod initializer;
pub mod pairing;
pub mod pairing_heap;
pub mod primal;
pub mod solver;
pub mod state;
pub mod tree;
pub mod util;

use solver::MatchingOutcome;
use util::*;

/// solve a minimum weight perfect matching with the default options
pub fn minimum_weight_perfect_matching(input: &SolverInput) -> Result<MatchingOutcome, MatchingError> {
    solver::get_matching(input, ObjectiveSense::Minimize, &BlossomOptions::default())
}

/// solve a maximum weight perfect matching with the default options
pub fn maximum_weight_perfect_matching(input: &SolverInput) -> Result<MatchingOutcome, MatchingError> {
    solver::get_matching(input, ObjectiveSense::Maximize, &BlossomOptions::default())
}
