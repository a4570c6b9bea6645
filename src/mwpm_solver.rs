//! Minimum-Weight Perfect Matching Solver
//!
//! A solver turns a sparse weighted graph into an involution `partner` of minimum total weight using only the supplied
//! edges. The serial blossom solver is always available; the blossom V binding is compiled in with the `blossom_v`
//! feature and is interchangeable with it.
//!

use super::blossom_serial;
use super::blossom_v;
use super::decoding_graph::DecodingGraph;
use super::error::MatchingError;
use super::util::*;
use crate::derivative::Derivative;
use serde::{Deserialize, Serialize};

/// an involution over `0..node_num` without fixed points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matching {
    partner: Vec<NodeIndex>,
}

impl Matching {
    pub fn new(partner: Vec<NodeIndex>) -> Result<Self, MatchingError> {
        let node_num = partner.len();
        for (i, &j) in partner.iter().enumerate() {
            if j >= node_num {
                return Err(MatchingError::InvalidInvolution(format!("node {i} matched to {j} out of {node_num} nodes")));
            }
            if j == i {
                return Err(MatchingError::InvalidInvolution(format!("node {i} matched to itself")));
            }
            if partner[j] != i {
                return Err(MatchingError::InvalidInvolution(format!(
                    "node {i} matched to {j} but {j} matched to {}",
                    partner[j]
                )));
            }
        }
        Ok(Self { partner })
    }

    pub fn partner(&self, node_index: NodeIndex) -> NodeIndex {
        self.partner[node_index]
    }

    pub fn len(&self) -> usize {
        self.partner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partner.is_empty()
    }

    pub fn as_slice(&self) -> &[NodeIndex] {
        &self.partner
    }

    /// every matched pair once, as `(i, partner[i])` with `i < partner[i]`
    pub fn pairs(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.partner.iter().enumerate().filter(|&(i, &j)| i < j).map(|(i, &j)| (i, j))
    }

    /// total weight of the matched edges; `None` if a pair is not an edge of `weighted_edges`
    pub fn total_weight(&self, weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Option<Weight> {
        let mut lightest = std::collections::BTreeMap::<(NodeIndex, NodeIndex), Weight>::new();
        for &(i, j, weight) in weighted_edges.iter() {
            let entry = lightest.entry((i.min(j), i.max(j))).or_insert(weight);
            *entry = (*entry).min(weight);
        }
        self.pairs().map(|pair| lightest.get(&pair).copied()).sum()
    }
}

/// common interface of all matching solvers
pub trait MatchingSolver {
    /// solve the minimum-weight perfect matching over `node_num` nodes
    fn solve(&mut self, node_num: NodeNum, weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Result<Matching, MatchingError>;

    fn solve_graph(&mut self, graph: &DecodingGraph) -> Result<Matching, MatchingError> {
        self.solve(graph.node_num, &graph.weighted_edges)
    }
}

fn check_weights(weighted_edges: &[(NodeIndex, NodeIndex, Weight)], max_safe_weight: Weight) -> Result<(), MatchingError> {
    match weighted_edges.iter().find(|&&(_, _, weight)| weight.abs() > max_safe_weight) {
        Some(&(_, _, weight)) => Err(MatchingError::WeightOverflow { weight, max_safe_weight }),
        None => Ok(()),
    }
}

/// pure-Rust Edmonds blossom algorithm
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct SolverSerial {
    pub max_safe_weight: Weight,
    /// number of calls to [`MatchingSolver::solve`]
    #[derivative(Debug = "ignore")]
    pub solved_count: usize,
}

impl Default for SolverSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverSerial {
    pub fn new() -> Self {
        Self {
            // weights are shifted and doubled inside the algorithm
            max_safe_weight: Weight::MAX / 8,
            solved_count: 0,
        }
    }
}

impl MatchingSolver for SolverSerial {
    fn solve(&mut self, node_num: NodeNum, weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Result<Matching, MatchingError> {
        check_weights(weighted_edges, self.max_safe_weight)?;
        let partner = blossom_serial::minimum_weight_perfect_matching(node_num, weighted_edges)?;
        self.solved_count += 1;
        tracing::trace!(node_num, edge_num = weighted_edges.len(), "serial blossom solved");
        Matching::new(partner)
    }
}

/// binding to the blossom V library
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct SolverBlossomV {
    pub max_safe_weight: Weight,
    #[derivative(Debug = "ignore")]
    pub solved_count: usize,
}

impl SolverBlossomV {
    pub fn new() -> Result<Self, MatchingError> {
        if !blossom_v::is_available() {
            return Err(MatchingError::BlossomVUnavailable);
        }
        Ok(Self {
            max_safe_weight: blossom_v::MAX_SAFE_WEIGHT,
            solved_count: 0,
        })
    }
}

impl MatchingSolver for SolverBlossomV {
    fn solve(&mut self, node_num: NodeNum, weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Result<Matching, MatchingError> {
        check_weights(weighted_edges, self.max_safe_weight)?;
        let partner = blossom_v::safe_minimum_weight_perfect_matching(node_num, weighted_edges)?;
        self.solved_count += 1;
        tracing::trace!(node_num, edge_num = weighted_edges.len(), "blossom V solved");
        Matching::new(partner)
    }
}

/// run-time solver selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SolverType {
    Serial,
    BlossomV,
}

impl Default for SolverType {
    fn default() -> Self {
        Self::Serial
    }
}

impl SolverType {
    /// a fresh solver instance; each trial owns its own
    pub fn build(&self) -> Result<Box<dyn MatchingSolver + Send>, MatchingError> {
        Ok(match self {
            Self::Serial => Box::new(SolverSerial::new()),
            Self::BlossomV => Box::new(SolverBlossomV::new()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding_graph::{DecodingGraphBuilder, DecodingWeights};
    use crate::lattice::StabilizerType;
    use proptest::prelude::*;

    #[test]
    fn mwpm_solver_involution_validation() {
        // cargo test mwpm_solver_involution_validation -- --nocapture
        assert!(Matching::new(vec![1, 0, 3, 2]).is_ok());
        assert!(Matching::new(vec![]).unwrap().is_empty());
        assert!(matches!(Matching::new(vec![0, 1]), Err(MatchingError::InvalidInvolution(_))));
        assert!(matches!(Matching::new(vec![1, 2, 0]), Err(MatchingError::InvalidInvolution(_))));
        assert!(matches!(Matching::new(vec![5, 0]), Err(MatchingError::InvalidInvolution(_))));
        let matching = Matching::new(vec![3, 2, 1, 0]).unwrap();
        assert_eq!(matching.pairs().collect::<Vec<_>>(), vec![(0, 3), (1, 2)]);
        assert_eq!(matching.partner(2), 1);
        assert_eq!(matching.total_weight(&[(3, 0, 4), (1, 2, 5), (0, 3, 2)]), Some(7));
        assert_eq!(matching.total_weight(&[(0, 3, 2)]), None);
    }

    #[test]
    fn mwpm_solver_serial_basic() {
        // cargo test mwpm_solver_serial_basic -- --nocapture
        let mut solver = SolverSerial::new();
        let edges = vec![(0, 1, 100), (2, 3, 110), (0, 2, 500), (1, 3, 300)];
        let matching = solver.solve(4, &edges).unwrap();
        assert_eq!(matching.as_slice(), &[1, 0, 3, 2]);
        assert_eq!(matching.total_weight(&edges), Some(210));
        assert_eq!(solver.solve(0, &[]).unwrap().len(), 0);
        assert_eq!(solver.solved_count, 2);
    }

    #[test]
    fn mwpm_solver_no_perfect_matching() {
        // cargo test mwpm_solver_no_perfect_matching -- --nocapture
        let mut solver = SolverSerial::new();
        assert_eq!(
            solver.solve(4, &[(0, 1, 1), (1, 2, 1), (2, 0, 1)]),
            Err(MatchingError::NoPerfectMatching { node_num: 4 })
        );
        assert_eq!(solver.solve(3, &[(0, 1, 1)]), Err(MatchingError::NoPerfectMatching { node_num: 3 }));
        assert_eq!(solver.solve(2, &[(0, 2, 1)]), Err(MatchingError::InvalidEdge(0, 2)));
        let huge = Weight::MAX / 2;
        assert!(matches!(solver.solve(2, &[(0, 1, huge)]), Err(MatchingError::WeightOverflow { .. })));
    }

    #[test]
    fn mwpm_solver_type_selection() {
        // cargo test mwpm_solver_type_selection -- --nocapture
        assert_eq!(SolverType::default(), SolverType::Serial);
        assert!(SolverType::Serial.build().is_ok());
        assert_eq!(SolverType::BlossomV.build().is_ok(), blossom_v::is_available());
        assert_eq!(serde_json::to_string(&SolverType::BlossomV).unwrap(), "\"blossom-v\"");
    }

    #[test]
    fn mwpm_solver_decoding_graph() {
        // cargo test mwpm_solver_decoding_graph -- --nocapture
        let builder = DecodingGraphBuilder::new(5, StabilizerType::Star, DecodingWeights::default()).unwrap();
        // two nearby defects in the bulk pair with each other, one close to the left rail goes to the boundary
        let graph = builder.build(&[vec![Anyon::new(0, 4, 3), Anyon::new(0, 4, 5), Anyon::new(0, 8, 1)]]).unwrap();
        graph.sanity_check().unwrap();
        let mut solver = SolverSerial::new();
        let matching = solver.solve_graph(&graph).unwrap();
        assert_eq!(matching.partner(0), 1);
        assert_eq!(matching.partner(2), 5);
        assert_eq!(matching.partner(3), 4);
        assert_eq!(matching.total_weight(&graph.weighted_edges), Some(4));
    }

    proptest! {
        #[test]
        fn mwpm_solver_decoding_graph_pairs(
            raw in prop::collection::vec((0usize..4, 0isize..5, 0isize..4), 0..12),
            time_weight in 0isize..3,
        ) {
            let mut anyons: Vec<Anyon> = raw.iter().map(|&(t, r, c)| Anyon::new(t, 2 * r, 2 * c + 1)).collect();
            anyons.sort();
            anyons.dedup();
            let weights = DecodingWeights { space: 1, time: time_weight, boundary: None };
            let builder = DecodingGraphBuilder::new(4, StabilizerType::Star, weights).unwrap();
            let graph = builder.build(&[anyons]).unwrap();
            let matching = SolverSerial::new().solve_graph(&graph).unwrap();
            prop_assert_eq!(matching.len(), graph.node_num);
            prop_assert_eq!(matching.pairs().count(), graph.node_num / 2);
            // matching everything to the boundary is always possible, so the optimum is no heavier
            let all_boundary: Weight = (0..graph.defect_num()).map(|i| builder.boundary_weight(&graph.positions[i])).sum();
            prop_assert!(matching.total_weight(&graph.weighted_edges).unwrap() <= all_boundary);
        }
    }
}
