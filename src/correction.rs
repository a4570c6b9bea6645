//! Correction
//!
//! Turns a matching of the decoding graph into a flip pattern: every matched pair is joined by a Manhattan path that
//! first runs along the row of the earlier endpoint and then along the column of the later one. Pairs of two boundary
//! mirrors on the rails of the corrected channel produce no flips.
//!

use crate::decoding_graph::DecodingGraph;
use crate::error::ConfigurationError;
use crate::lattice::{Channel, PlanarLattice};
use crate::mwpm_solver::Matching;
use crate::util::*;
use serde::{Deserialize, Serialize};

/// `(2d+1) x (2d+1)` grid of signs multiplied into one channel of the lattice qubits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipPattern {
    pub size: usize,
    width: usize,
    signs: Vec<Sign>,
}

impl FlipPattern {
    pub fn new(size: usize) -> Self {
        let width = 2 * size + 1;
        Self {
            size,
            width,
            signs: vec![1; width * width],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn index(&self, position: Position) -> Option<usize> {
        let w = self.width as isize;
        let (r, c) = position;
        if (0..w).contains(&r) && (0..w).contains(&c) {
            Some(r as usize * self.width + c as usize)
        } else {
            None
        }
    }

    /// the multiplier at `position`, `+1` outside the grid
    pub fn get(&self, position: Position) -> Sign {
        self.index(position).map_or(1, |index| self.signs[index])
    }

    /// toggle one position; positions outside the grid are ignored
    pub fn flip(&mut self, position: Position) {
        if let Some(index) = self.index(position) {
            self.signs[index] = -self.signs[index];
        }
    }

    /// true when applying the pattern changes nothing
    pub fn is_identity(&self) -> bool {
        self.signs.iter().all(|&sign| sign == 1)
    }

    /// positions that are flipped, row-major
    pub fn flipped(&self) -> Vec<Position> {
        (0..self.signs.len())
            .filter(|&index| self.signs[index] == -1)
            .map(|index| ((index / self.width) as isize, (index % self.width) as isize))
            .collect()
    }

    fn is_rail(&self, coordinate: isize) -> bool {
        coordinate == -1 || coordinate == 2 * self.size as isize + 1
    }

    /// toggle the correction path from `p` to `q`; stars (Z channel) have column rails, plaquettes (X) row rails
    pub fn flip_path(&mut self, channel: Channel, p: Position, q: Position) {
        let on_rails = match channel {
            Channel::Z => self.is_rail(p.1) && self.is_rail(q.1),
            Channel::X => self.is_rail(p.0) && self.is_rail(q.0),
        };
        if on_rails {
            return;
        }
        let (p0, p1) = p;
        let (q0, q1) = q;
        let s0 = if q0 >= p0 { 1 } else { -1 };
        let s1 = if q1 >= p1 { 1 } else { -1 };
        for x in (1..(q1 - p1).abs()).step_by(2) {
            self.flip_path_point((p0, p1 + s1 * x));
        }
        for y in (1..(q0 - p0).abs()).step_by(2) {
            self.flip_path_point((p0 + s0 * y, q1));
        }
    }

    fn flip_path_point(&mut self, position: Position) {
        debug_assert!(self.index(position).is_some(), "path point {position:?} outside the grid of width {}", self.width);
        self.flip(position);
    }

    /// multiply another pattern into this one
    pub fn combine(&mut self, other: &FlipPattern) -> Result<(), ConfigurationError> {
        if other.width != self.width {
            return Err(ConfigurationError::PatternSizeMismatch {
                expected: self.width,
                actual: other.width,
            });
        }
        for (sign, other_sign) in self.signs.iter_mut().zip(other.signs.iter()) {
            *sign *= *other_sign;
        }
        Ok(())
    }
}

/// matched position pairs `(p, q)` for every `i < partner[i]`, in node order
pub fn matched_pairs(graph: &DecodingGraph, matching: &Matching) -> Vec<(Anyon, Anyon)> {
    matching
        .pairs()
        .map(|(i, j)| (graph.positions[i], graph.positions[j]))
        .collect()
}

/// accumulate the correction of a whole matching; spacetime endpoints are projected onto the lattice
pub fn correction_pattern(graph: &DecodingGraph, matching: &Matching) -> FlipPattern {
    let channel = graph.stabilizer_type.channel();
    let mut pattern = FlipPattern::new(graph.size);
    for (p, q) in matched_pairs(graph, matching) {
        pattern.flip_path(channel, p.position(), q.position());
    }
    pattern
}

/// apply the correction of `matching` to the channel the graph's stabilizers read
pub fn apply_correction(lattice: &mut PlanarLattice, graph: &DecodingGraph, matching: &Matching) -> Result<FlipPattern, ConfigurationError> {
    let pattern = correction_pattern(graph, matching);
    lattice.apply_flip_array(graph.stabilizer_type.channel(), &pattern)?;
    Ok(pattern)
}
