//! Decoding Graph
//!
//! Builds the sparse matching problem of one stabilizer type from its spacetime defects. Every real defect `i` gets a
//! mirror node `i + n` on the nearest boundary rail; mirrors may pair among themselves at no cost, which lets any
//! subset of real defects be matched to the boundary.
//!

use crate::error::ConfigurationError;
use crate::lattice::StabilizerType;
use crate::util::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// real-real edges are only added between defects less than this many rounds apart
pub const MAX_TIME_SEPARATION: usize = 15;
/// mirror-mirror edges are only added between mirrors less than this many rounds apart
pub const BOUNDARY_TIME_SEPARATION: usize = 5;

/// multiplicative edge weights in space, time and towards the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecodingWeights {
    pub space: Weight,
    pub time: Weight,
    /// defaults to `space`
    #[serde(default)]
    pub boundary: Option<Weight>,
}

impl Default for DecodingWeights {
    fn default() -> Self {
        Self {
            space: 1,
            time: 1,
            boundary: None,
        }
    }
}

impl DecodingWeights {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.space <= 0 {
            return Err(ConfigurationError::InvalidWeight {
                name: "space",
                value: self.space,
            });
        }
        if self.time < 0 {
            return Err(ConfigurationError::InvalidWeight {
                name: "time",
                value: self.time,
            });
        }
        if let Some(boundary) = self.boundary {
            if boundary < 0 {
                return Err(ConfigurationError::InvalidWeight {
                    name: "boundary",
                    value: boundary,
                });
            }
        }
        Ok(())
    }

    pub fn boundary(&self) -> Weight {
        self.boundary.unwrap_or(self.space)
    }
}

/// the weighted graph handed to a matching solver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodingGraph {
    pub stabilizer_type: StabilizerType,
    pub size: usize,
    /// `2n`: real defects first, then their mirrors in the same order
    pub node_num: NodeNum,
    pub weighted_edges: Vec<(NodeIndex, NodeIndex, Weight)>,
    /// spacetime position of every node
    pub positions: Vec<Anyon>,
}

impl DecodingGraph {
    pub fn empty(stabilizer_type: StabilizerType, size: usize) -> Self {
        Self {
            stabilizer_type,
            size,
            node_num: 0,
            weighted_edges: vec![],
            positions: vec![],
        }
    }

    /// number of real defects
    pub fn defect_num(&self) -> usize {
        self.node_num / 2
    }

    pub fn is_empty(&self) -> bool {
        self.node_num == 0
    }

    pub fn is_mirror(&self, node_index: NodeIndex) -> bool {
        node_index >= self.defect_num()
    }

    /// no self loops, no duplicated edges and exactly one edge between each real node and its mirror
    pub fn sanity_check(&self) -> Result<(), String> {
        if self.node_num % 2 != 0 {
            return Err(format!("odd node number {}", self.node_num));
        }
        if self.positions.len() != self.node_num {
            return Err(format!(
                "{} positions for {} nodes",
                self.positions.len(),
                self.node_num
            ));
        }
        let n = self.defect_num();
        let mut existing_edges = BTreeSet::<(NodeIndex, NodeIndex)>::new();
        let mut mirror_edge_count = vec![0usize; n];
        for &(i, j, weight) in self.weighted_edges.iter() {
            if i == j {
                return Err(format!("self loop at node {i}"));
            }
            if i >= self.node_num || j >= self.node_num {
                return Err(format!("edge ({i}, {j}) out of {} nodes", self.node_num));
            }
            if weight < 0 {
                return Err(format!("negative weight {weight} on edge ({i}, {j})"));
            }
            let unique_edge = if i < j { (i, j) } else { (j, i) };
            if !existing_edges.insert(unique_edge) {
                return Err(format!("duplicate edge between nodes {i} and {j}"));
            }
            let (low, high) = unique_edge;
            if low < n && high >= n {
                if high != low + n {
                    return Err(format!("real node {low} connects to foreign mirror {high}"));
                }
                mirror_edge_count[low] += 1;
            }
        }
        if let Some(real) = mirror_edge_count.iter().position(|&count| count != 1) {
            return Err(format!("real node {real} has no edge to its mirror"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DecodingGraphBuilder {
    pub size: usize,
    pub stabilizer_type: StabilizerType,
    pub weights: DecodingWeights,
    pub max_time_separation: usize,
    pub boundary_time_separation: usize,
    /// `w_s * |p - q|` for `p, q` in `-1..=2d+1`, indexed by `(p + 1) * (2d + 3) + (q + 1)`
    weight_lookup: Vec<Weight>,
}

impl DecodingGraphBuilder {
    pub fn new(size: usize, stabilizer_type: StabilizerType, weights: DecodingWeights) -> Result<Self, ConfigurationError> {
        if size == 0 {
            return Err(ConfigurationError::InvalidSize(size));
        }
        weights.validate()?;
        let m = 2 * size as isize + 1;
        let mut weight_lookup = Vec::with_capacity(((m + 2) * (m + 2)) as usize);
        for p in -1..=m {
            for q in -1..=m {
                weight_lookup.push(weights.space * ((p - q).abs() as Weight));
            }
        }
        Ok(Self {
            size,
            stabilizer_type,
            weights,
            max_time_separation: MAX_TIME_SEPARATION,
            boundary_time_separation: BOUNDARY_TIME_SEPARATION,
            weight_lookup,
        })
    }

    fn lookup(&self, p: isize, q: isize) -> Weight {
        let stride = 2 * self.size as isize + 3;
        self.weight_lookup[((p + 1) * stride + (q + 1)) as usize]
    }

    /// spatial part of the weight between two positions
    pub fn spatial_weight(&self, a: &Anyon, b: &Anyon) -> Weight {
        self.lookup(b.i, a.i) + self.lookup(b.j, a.j)
    }

    /// the closest rail point: stars move horizontally, plaquettes vertically
    pub fn mirror(&self, anyon: &Anyon) -> Anyon {
        let size = self.size as isize;
        let rail = |coordinate: isize| if coordinate < size { -1 } else { 2 * size + 1 };
        match self.stabilizer_type {
            StabilizerType::Star => Anyon::new(anyon.t, anyon.i, rail(anyon.j)),
            StabilizerType::Plaquette => Anyon::new(anyon.t, rail(anyon.i), anyon.j),
        }
    }

    /// weight between a real defect and its mirror, scaled from the space weight to the boundary weight
    pub fn boundary_weight(&self, anyon: &Anyon) -> Weight {
        let spatial = self.spatial_weight(anyon, &self.mirror(anyon));
        spatial * self.weights.boundary() / self.weights.space
    }

    fn check_defect(&self, anyon: &Anyon) -> Result<(), ConfigurationError> {
        let max = 2 * self.size as isize;
        let (row_parity, column_parity) = match self.stabilizer_type {
            StabilizerType::Star => (0, 1),
            StabilizerType::Plaquette => (1, 0),
        };
        let on_grid = (0..=max).contains(&anyon.i) && (0..=max).contains(&anyon.j);
        if on_grid && anyon.i.rem_euclid(2) == row_parity && anyon.j.rem_euclid(2) == column_parity {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidDefect {
                anyon: *anyon,
                stabilizer_type: self.stabilizer_type.name(),
            })
        }
    }

    /// build the graph from per-round defect lists; every defect must sit on a stabilizer site of the builder's type
    pub fn build(&self, rounds: &[Vec<Anyon>]) -> Result<DecodingGraph, ConfigurationError> {
        let mut nodes: Vec<Anyon> = rounds.iter().flatten().copied().collect();
        for anyon in nodes.iter() {
            self.check_defect(anyon)?;
        }
        nodes.sort_by_key(|anyon| anyon.t); // stable, a no-op for per-round input
        let n = nodes.len();
        if n == 0 {
            return Ok(DecodingGraph::empty(self.stabilizer_type, self.size));
        }
        let mut weighted_edges = vec![];
        for i in 0..n - 1 {
            let p = &nodes[i];
            for j in i + 1..n {
                let q = &nodes[j];
                let gap = q.t - p.t;
                if gap >= self.max_time_separation {
                    break;
                }
                let weight = self.spatial_weight(p, q) + gap as Weight * self.weights.time;
                weighted_edges.push((i, j, weight));
            }
        }
        let mirrors: Vec<Anyon> = nodes.iter().map(|anyon| self.mirror(anyon)).collect();
        for (i, anyon) in nodes.iter().enumerate() {
            weighted_edges.push((i, i + n, self.boundary_weight(anyon)));
        }
        for i in 0..n - 1 {
            for j in i + 1..n {
                let gap = mirrors[j].t - mirrors[i].t;
                if gap >= self.boundary_time_separation {
                    break;
                }
                weighted_edges.push((n + i, n + j, 0));
            }
        }
        let mut positions = nodes;
        positions.extend(mirrors);
        Ok(DecodingGraph {
            stabilizer_type: self.stabilizer_type,
            size: self.size,
            node_num: 2 * n,
            weighted_edges,
            positions,
        })
    }
}
