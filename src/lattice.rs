//! Planar Lattice
//!
//! A `(2d+1) x (2d+1)` grid of tagged cells. Qubits sit where `row ≡ col (mod 2)`, star stabilizers at (even row, odd
//! column) and plaquette stabilizers at (odd row, even column):
//!
//! ```text
//!        top          top
//!   Q -- STAR -- Q -- STAR -- Q
//!         |            |
//!  left   Q    PLAQ    Q    right
//!  PLAQ   |            |    PLAQ
//!   Q -- STAR -- Q -- STAR -- Q
//!        bottom       bottom
//! ```
//!
//! Plaquettes read the X channel of their support and their boundary rails are the rows `-1` and `2d+1`; stars read
//! the Z channel and their boundary rails are the columns `-1` and `2d+1`.
//!

use crate::correction::FlipPattern;
use crate::error::{check_probability, check_sign, ConfigurationError};
use crate::rand::seq::SliceRandom;
use crate::util::*;
use serde::{Deserialize, Serialize};

/// the Pauli channel of a qubit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    X,
    Z,
}

impl Channel {
    pub fn index(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Z => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilizerType {
    Star,
    Plaquette,
}

impl StabilizerType {
    /// the qubit channel this stabilizer reads, which is also the channel its defects are corrected on
    pub fn channel(&self) -> Channel {
        match self {
            Self::Star => Channel::Z,
            Self::Plaquette => Channel::X,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Star => "star",
            Self::Plaquette => "plaquette",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StabilizerShape {
    Full,
    TopEdge,
    BottomEdge,
    LeftEdge,
    RightEdge,
}

impl StabilizerShape {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::TopEdge => "top-edge",
            Self::BottomEdge => "bottom-edge",
            Self::LeftEdge => "left-edge",
            Self::RightEdge => "right-edge",
        }
    }

    /// support qubits of a stabilizer at `position`, in the order left, right, up, down (missing ones skipped)
    pub fn support(&self, position: Position) -> Vec<Position> {
        let (r, c) = position;
        let (up, down, left, right) = ((r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1));
        match self {
            Self::Full => vec![left, right, up, down],
            Self::LeftEdge => vec![right, up, down],
            Self::RightEdge => vec![left, up, down],
            Self::TopEdge => vec![left, right, down],
            Self::BottomEdge => vec![left, right, up],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Qubit { x: Sign, z: Sign },
    Stabilizer(Sign),
}

/// which half of an interleaved measurement cycle a stabilizer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementRound {
    /// gate error first, then read out
    First,
    /// read out first, then gate error
    Second,
}

/// error applied while measuring a single stabilizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizerError {
    /// multiplied into the measured value
    pub lie: Sign,
    /// `[x, z]` multipliers of the two support qubits touched by the faulty gate
    pub qubit_errors: [[Sign; 2]; 2],
}

impl StabilizerError {
    /// every multiplier must be +1 or -1
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_sign("lie", self.lie)?;
        for &value in self.qubit_errors.iter().flatten() {
            check_sign("qubit_errors", value)?;
        }
        Ok(())
    }
}

impl Default for StabilizerError {
    fn default() -> Self {
        Self {
            lie: 1,
            qubit_errors: [[1, 1], [1, 1]],
        }
    }
}

/// one half of the alternating measurement schedule of a stabilizer type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizerRound {
    pub full: Vec<Position>,
    pub edge_low: Vec<Position>,
    pub edge_high: Vec<Position>,
}

/// stabilizer positions of one type; `edge_low` is the top (stars) or left (plaquettes) boundary and `edge_high` the
/// opposite one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizerLayout {
    pub stabilizer_type: StabilizerType,
    pub full: Vec<Position>,
    pub edge_low: Vec<Position>,
    pub edge_high: Vec<Position>,
    pub rounds: [StabilizerRound; 2],
}

impl StabilizerLayout {
    fn new_stars(size: isize) -> Self {
        let w = 2 * size;
        let full: Vec<Position> = (2..w - 1)
            .step_by(2)
            .flat_map(|r| (1..w).step_by(2).map(move |c| (r, c)))
            .collect();
        let round_full = |start: fn(isize) -> isize| -> Vec<Position> {
            (2..w - 1)
                .step_by(2)
                .flat_map(|r| (start(r)..w).step_by(4).map(move |c| (r, c)))
                .collect()
        };
        let top = |start: isize| -> Vec<Position> { (start..w).step_by(4).map(|c| (0, c)).collect() };
        let bottom = |start: isize| -> Vec<Position> { (start..w).step_by(4).map(|c| (w, c)).collect() };
        Self {
            stabilizer_type: StabilizerType::Star,
            full,
            edge_low: (1..w).step_by(2).map(|c| (0, c)).collect(),
            edge_high: (1..w).step_by(2).map(|c| (w, c)).collect(),
            rounds: [
                StabilizerRound {
                    full: round_full(|r| (r + 2).rem_euclid(4) + 1),
                    edge_low: top(1),
                    edge_high: bottom(2 * (size % 2) + 1),
                },
                StabilizerRound {
                    full: round_full(|r| r.rem_euclid(4) + 1),
                    edge_low: top(3),
                    edge_high: bottom(2 * ((size + 1) % 2) + 1),
                },
            ],
        }
    }

    fn new_plaquettes(size: isize) -> Self {
        let w = 2 * size;
        let full: Vec<Position> = (1..w)
            .step_by(2)
            .flat_map(|r| (2..w - 1).step_by(2).map(move |c| (r, c)))
            .collect();
        let round_full = |start: fn(isize) -> isize| -> Vec<Position> {
            (1..w)
                .step_by(2)
                .flat_map(|r| (start(r)..w).step_by(4).map(move |c| (r, c)))
                .collect()
        };
        let left = |start: isize| -> Vec<Position> { (start..w).step_by(4).map(|r| (r, 0)).collect() };
        let right = |start: isize| -> Vec<Position> { (start..w).step_by(4).map(|r| (r, w)).collect() };
        Self {
            stabilizer_type: StabilizerType::Plaquette,
            full,
            edge_low: (1..w).step_by(2).map(|r| (r, 0)).collect(),
            edge_high: (1..w).step_by(2).map(|r| (r, w)).collect(),
            rounds: [
                StabilizerRound {
                    full: round_full(|r| (r + 1).rem_euclid(4) + 2),
                    edge_low: left(1),
                    edge_high: right(2 * (size % 2) + 1),
                },
                StabilizerRound {
                    full: round_full(|r| (r - 1).rem_euclid(4) + 2),
                    edge_low: left(3),
                    edge_high: right(2 * ((size + 1) % 2) + 1),
                },
            ],
        }
    }

    pub fn low_shape(&self) -> StabilizerShape {
        match self.stabilizer_type {
            StabilizerType::Star => StabilizerShape::TopEdge,
            StabilizerType::Plaquette => StabilizerShape::LeftEdge,
        }
    }

    pub fn high_shape(&self) -> StabilizerShape {
        match self.stabilizer_type {
            StabilizerType::Star => StabilizerShape::BottomEdge,
            StabilizerType::Plaquette => StabilizerShape::RightEdge,
        }
    }

    /// every stabilizer with its shape: full ones first, then the low edge, then the high edge
    pub fn iter_with_shape(&self) -> impl Iterator<Item = (Position, StabilizerShape)> + '_ {
        let (low, high) = (self.low_shape(), self.high_shape());
        self.full
            .iter()
            .map(|&p| (p, StabilizerShape::Full))
            .chain(self.edge_low.iter().map(move |&p| (p, low)))
            .chain(self.edge_high.iter().map(move |&p| (p, high)))
    }

    pub fn len(&self) -> usize {
        self.full.len() + self.edge_low.len() + self.edge_high.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// single-round defects, read directly off the stabilizer cells
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeAnyons {
    pub stars: Vec<Position>,
    pub plaquettes: Vec<Position>,
}

/// read-only export of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CellSnapshot {
    Qubit { x: Sign, z: Sign },
    Star { value: Sign },
    Plaquette { value: Sign },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeSnapshot {
    pub size: usize,
    /// row-major cells
    pub cells: Vec<Vec<CellSnapshot>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarLattice {
    /// code distance `d`
    pub size: usize,
    /// grid width `2d+1`
    pub width: usize,
    cells: Vec<Cell>,
    pub qubits: Vec<Position>,
    pub stars: StabilizerLayout,
    pub plaquettes: StabilizerLayout,
}

impl PlanarLattice {
    pub fn new(size: usize) -> Result<Self, ConfigurationError> {
        if size == 0 {
            return Err(ConfigurationError::InvalidSize(size));
        }
        let width = 2 * size + 1;
        let w = width as isize;
        let qubits: Vec<Position> = (0..w)
            .flat_map(|r| (r % 2..w).step_by(2).map(move |c| (r, c)))
            .collect();
        let mut cells = Vec::with_capacity(width * width);
        for r in 0..w {
            for c in 0..w {
                cells.push(if (r - c) % 2 == 0 {
                    Cell::Qubit { x: 1, z: 1 }
                } else {
                    Cell::Stabilizer(1)
                });
            }
        }
        Ok(Self {
            size,
            width,
            cells,
            qubits,
            stars: StabilizerLayout::new_stars(size as isize),
            plaquettes: StabilizerLayout::new_plaquettes(size as isize),
        })
    }

    pub fn layout(&self, stabilizer_type: StabilizerType) -> &StabilizerLayout {
        match stabilizer_type {
            StabilizerType::Star => &self.stars,
            StabilizerType::Plaquette => &self.plaquettes,
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        let w = self.width as isize;
        (0..w).contains(&position.0) && (0..w).contains(&position.1)
    }

    fn index(&self, position: Position) -> usize {
        assert!(self.contains(position), "position {position:?} outside lattice of size {}", self.size);
        position.0 as usize * self.width + position.1 as usize
    }

    pub fn cell(&self, position: Position) -> Cell {
        self.cells[self.index(position)]
    }

    pub fn qubit(&self, position: Position, channel: Channel) -> Sign {
        match self.cell(position) {
            Cell::Qubit { x, z } => match channel {
                Channel::X => x,
                Channel::Z => z,
            },
            Cell::Stabilizer(_) => unreachable!("{position:?} is not a qubit"),
        }
    }

    /// multiply one channel of a qubit by `sign`, which must be +1 or -1
    pub fn multiply_qubit(&mut self, position: Position, channel: Channel, sign: Sign) {
        assert!(sign == 1 || sign == -1, "qubit multiplier must be +1 or -1, got {sign}");
        let index = self.index(position);
        match &mut self.cells[index] {
            Cell::Qubit { x, z } => match channel {
                Channel::X => *x *= sign,
                Channel::Z => *z *= sign,
            },
            Cell::Stabilizer(_) => unreachable!("{position:?} is not a qubit"),
        }
    }

    pub fn stabilizer(&self, position: Position) -> Sign {
        match self.cell(position) {
            Cell::Stabilizer(value) => value,
            Cell::Qubit { .. } => unreachable!("{position:?} is not a stabilizer"),
        }
    }

    fn set_stabilizer(&mut self, position: Position, value: Sign) {
        let index = self.index(position);
        match &mut self.cells[index] {
            Cell::Stabilizer(old) => *old = value,
            Cell::Qubit { .. } => unreachable!("{position:?} is not a stabilizer"),
        }
    }

    /// independent X and Z flips on every qubit, two draws per qubit in qubit order
    pub fn apply_random_errors(&mut self, p_x: f64, p_z: f64, rng: &mut DeterministicRng) -> Result<(), ConfigurationError> {
        check_probability("p_x", p_x)?;
        check_probability("p_z", p_z)?;
        for qubit_index in 0..self.qubits.len() {
            let position = self.qubits[qubit_index];
            let r1 = rng.next_f64();
            let r2 = rng.next_f64();
            if r1 < p_x {
                self.multiply_qubit(position, Channel::X, -1);
            }
            if r2 < p_z {
                self.multiply_qubit(position, Channel::Z, -1);
            }
        }
        Ok(())
    }

    /// three sequential draws per qubit: X, then Y (flips both channels), then Z
    pub fn apply_random_errors_xyz(
        &mut self,
        p_x: f64,
        p_y: f64,
        p_z: f64,
        rng: &mut DeterministicRng,
    ) -> Result<(), ConfigurationError> {
        check_probability("p_x", p_x)?;
        check_probability("p_y", p_y)?;
        check_probability("p_z", p_z)?;
        for qubit_index in 0..self.qubits.len() {
            let position = self.qubits[qubit_index];
            if rng.next_f64() < p_x {
                self.multiply_qubit(position, Channel::X, -1);
            }
            if rng.next_f64() < p_y {
                self.multiply_qubit(position, Channel::X, -1);
                self.multiply_qubit(position, Channel::Z, -1);
            }
            if rng.next_f64() < p_z {
                self.multiply_qubit(position, Channel::Z, -1);
            }
        }
        Ok(())
    }

    fn support_product(&self, position: Position, shape: StabilizerShape, channel: Channel) -> Sign {
        shape
            .support(position)
            .into_iter()
            .map(|qubit| self.qubit(qubit, channel))
            .product()
    }

    fn measure_layout(&mut self, stabilizer_type: StabilizerType, p_lie: f64, rng: &mut DeterministicRng) {
        let channel = stabilizer_type.channel();
        let sites: Vec<(Position, StabilizerShape)> = self.layout(stabilizer_type).iter_with_shape().collect();
        for (position, shape) in sites {
            let mut value = self.support_product(position, shape, channel);
            // one draw per stabilizer even when `p_lie` is zero, so the random stream does not depend on it
            if rng.next_f64() < p_lie {
                value = -value;
            }
            self.set_stabilizer(position, value);
        }
    }

    /// measure every plaquette (X channel); each outcome lies with probability `p_lie`
    pub fn measure_plaquettes(&mut self, p_lie: f64, rng: &mut DeterministicRng) -> Result<(), ConfigurationError> {
        check_probability("p_lie", p_lie)?;
        self.measure_layout(StabilizerType::Plaquette, p_lie, rng);
        Ok(())
    }

    /// measure every star (Z channel); each outcome lies with probability `p_lie`
    pub fn measure_stars(&mut self, p_lie: f64, rng: &mut DeterministicRng) -> Result<(), ConfigurationError> {
        check_probability("p_lie", p_lie)?;
        self.measure_layout(StabilizerType::Star, p_lie, rng);
        Ok(())
    }

    /// the shape a stabilizer of the given type has at `position`, `None` if it is not such a site
    pub fn shape_at(&self, stabilizer_type: StabilizerType, position: Position) -> Option<StabilizerShape> {
        if !self.contains(position) {
            return None;
        }
        let (r, c) = position;
        let w = 2 * self.size as isize;
        match stabilizer_type {
            StabilizerType::Star if r % 2 == 0 && c % 2 == 1 => Some(if r == 0 {
                StabilizerShape::TopEdge
            } else if r == w {
                StabilizerShape::BottomEdge
            } else {
                StabilizerShape::Full
            }),
            StabilizerType::Plaquette if r % 2 == 1 && c % 2 == 0 => Some(if c == 0 {
                StabilizerShape::LeftEdge
            } else if c == w {
                StabilizerShape::RightEdge
            } else {
                StabilizerShape::Full
            }),
            _ => None,
        }
    }

    /// measure a single stabilizer through a faulty gate sequence
    ///
    /// With probability `incomplete_probability` nothing happens. Otherwise two distinct support qubits are picked at
    /// random and multiplied by `error.qubit_errors`; in the first round the stabilizer is read out after this gate
    /// error, in the second round before it. The outcome is multiplied by `error.lie`.
    #[allow(clippy::too_many_arguments)]
    pub fn measure_stabilizer_with_error(
        &mut self,
        stabilizer_type: StabilizerType,
        position: Position,
        shape: StabilizerShape,
        error: &StabilizerError,
        round: MeasurementRound,
        incomplete_probability: f64,
        rng: &mut DeterministicRng,
    ) -> Result<(), ConfigurationError> {
        check_probability("incomplete_probability", incomplete_probability)?;
        error.validate()?;
        if self.shape_at(stabilizer_type, position) != Some(shape) {
            return Err(ConfigurationError::InvalidStabilizer {
                position,
                stabilizer_type: stabilizer_type.name(),
                shape: shape.name(),
            });
        }
        if rng.next_f64() < incomplete_probability {
            return Ok(());
        }
        let channel = stabilizer_type.channel();
        if round == MeasurementRound::Second {
            let value = error.lie * self.support_product(position, shape, channel);
            self.set_stabilizer(position, value);
        }
        let mut support = shape.support(position);
        support.shuffle(rng);
        for (qubit, [x, z]) in support.iter().zip(error.qubit_errors.iter()) {
            self.multiply_qubit(*qubit, Channel::X, *x);
            self.multiply_qubit(*qubit, Channel::Z, *z);
        }
        if round == MeasurementRound::First {
            let value = error.lie * self.support_product(position, shape, channel);
            self.set_stabilizer(position, value);
        }
        Ok(())
    }

    fn random_pauli(p_gate: f64, rng: &mut DeterministicRng) -> [Sign; 2] {
        if rng.next_f64() >= p_gate {
            return [1, 1];
        }
        match (rng.next_f64() * 3.) as usize {
            0 => [-1, 1],
            1 => [-1, -1],
            _ => [1, -1],
        }
    }

    /// measure all stabilizers of a type in two interleaved rounds with faulty gates
    pub fn measure_stabilizers_interleaved(
        &mut self,
        stabilizer_type: StabilizerType,
        p_lie: f64,
        p_gate: f64,
        rng: &mut DeterministicRng,
    ) -> Result<(), ConfigurationError> {
        check_probability("p_lie", p_lie)?;
        check_probability("p_gate", p_gate)?;
        let layout = self.layout(stabilizer_type).clone();
        let (low, high) = (layout.low_shape(), layout.high_shape());
        for (round, subsets) in [MeasurementRound::First, MeasurementRound::Second].into_iter().zip(layout.rounds.iter()) {
            let sites = subsets
                .full
                .iter()
                .map(|&p| (p, StabilizerShape::Full))
                .chain(subsets.edge_low.iter().map(|&p| (p, low)))
                .chain(subsets.edge_high.iter().map(|&p| (p, high)));
            for (position, shape) in sites {
                let lie = if rng.next_f64() < p_lie { -1 } else { 1 };
                let qubit_errors = [Self::random_pauli(p_gate, rng), Self::random_pauli(p_gate, rng)];
                let error = StabilizerError { lie, qubit_errors };
                self.measure_stabilizer_with_error(stabilizer_type, position, shape, &error, round, 0., rng)?;
            }
        }
        Ok(())
    }

    fn layout_anyons(&self, layout: &StabilizerLayout) -> Vec<Position> {
        let mut anyons: Vec<Position> = layout.full.iter().copied().filter(|&p| self.stabilizer(p) == -1).collect();
        for (&low, &high) in layout.edge_low.iter().zip(layout.edge_high.iter()) {
            for position in [low, high] {
                if self.stabilizer(position) == -1 {
                    anyons.push(position);
                }
            }
        }
        anyons
    }

    /// defects of the last measurement alone: full stabilizers first, then both edges interleaved index by index
    pub fn find_anyons(&self) -> LatticeAnyons {
        LatticeAnyons {
            stars: self.layout_anyons(&self.stars),
            plaquettes: self.layout_anyons(&self.plaquettes),
        }
    }

    /// multiply one channel of every qubit by the pattern value at its position
    pub fn apply_flip_array(&mut self, channel: Channel, pattern: &FlipPattern) -> Result<(), ConfigurationError> {
        if pattern.width() != self.width {
            return Err(ConfigurationError::PatternSizeMismatch {
                expected: self.width,
                actual: pattern.width(),
            });
        }
        for qubit_index in 0..self.qubits.len() {
            let position = self.qubits[qubit_index];
            self.multiply_qubit(position, channel, pattern.get(position));
        }
        Ok(())
    }

    /// correct along the paths of matched position pairs
    pub fn apply_matching(&mut self, channel: Channel, pairs: &[(Position, Position)]) -> Result<(), ConfigurationError> {
        let mut pattern = FlipPattern::new(self.size);
        for &(p, q) in pairs {
            pattern.flip_path(channel, p, q);
        }
        self.apply_flip_array(channel, &pattern)
    }

    /// `[X, Z]`: product of X along the top row and of Z along the left column
    pub fn measure_logical(&self) -> [Sign; 2] {
        let w = self.width as isize;
        let logical_x: Sign = (0..w).step_by(2).map(|c| self.qubit((0, c), Channel::X)).product();
        let logical_z: Sign = (0..w).step_by(2).map(|r| self.qubit((r, 0), Channel::Z)).product();
        [logical_x, logical_z]
    }

    /// every site of a type in row-major order: stars at (even, odd), plaquettes at (odd, even)
    pub fn stabilizer_sites(&self, stabilizer_type: StabilizerType) -> Vec<Position> {
        stabilizer_sites(self.size, stabilizer_type)
    }

    /// current stabilizer values of a type in [`Self::stabilizer_sites`] order
    pub fn raw_layer(&self, stabilizer_type: StabilizerType) -> Vec<Sign> {
        self.stabilizer_sites(stabilizer_type)
            .into_iter()
            .map(|position| self.stabilizer(position))
            .collect()
    }

    pub fn snapshot(&self) -> LatticeSnapshot {
        let w = self.width as isize;
        let cells = (0..w)
            .map(|r| {
                (0..w)
                    .map(|c| match self.cell((r, c)) {
                        Cell::Qubit { x, z } => CellSnapshot::Qubit { x, z },
                        Cell::Stabilizer(value) if r % 2 == 0 => CellSnapshot::Star { value },
                        Cell::Stabilizer(value) => CellSnapshot::Plaquette { value },
                    })
                    .collect()
            })
            .collect();
        LatticeSnapshot { size: self.size, cells }
    }
}

/// row-major stabilizer sites of a lattice of `size`
pub fn stabilizer_sites(size: usize, stabilizer_type: StabilizerType) -> Vec<Position> {
    let w = 2 * size as isize + 1;
    let (row_start, col_start) = match stabilizer_type {
        StabilizerType::Star => (0, 1),
        StabilizerType::Plaquette => (1, 0),
    };
    (row_start..w)
        .step_by(2)
        .flat_map(|r| (col_start..w).step_by(2).map(move |c| (r, c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn sorted_union(a: &[Position], b: &[Position]) -> Vec<Position> {
        let mut union: Vec<Position> = a.iter().chain(b.iter()).copied().collect();
        union.sort_unstable();
        union
    }

    fn assert_partition(parent: &[Position], round_1: &[Position], round_2: &[Position]) {
        let set_1: BTreeSet<Position> = round_1.iter().copied().collect();
        let set_2: BTreeSet<Position> = round_2.iter().copied().collect();
        assert!(set_1.is_disjoint(&set_2));
        let mut parent = parent.to_vec();
        parent.sort_unstable();
        assert_eq!(sorted_union(round_1, round_2), parent);
    }

    #[test]
    fn lattice_invalid_size() {
        // cargo test lattice_invalid_size -- --nocapture
        assert_eq!(PlanarLattice::new(0).unwrap_err(), ConfigurationError::InvalidSize(0));
    }

    #[test]
    fn lattice_layout_size_3() {
        // cargo test lattice_layout_size_3 -- --nocapture
        let lattice = PlanarLattice::new(3).unwrap();
        assert_eq!(lattice.width, 7);
        assert_eq!(lattice.qubits.len(), 25);
        assert_eq!(lattice.stars.full, vec![(2, 1), (2, 3), (2, 5), (4, 1), (4, 3), (4, 5)]);
        assert_eq!(lattice.stars.edge_low, vec![(0, 1), (0, 3), (0, 5)]);
        assert_eq!(lattice.stars.edge_high, vec![(6, 1), (6, 3), (6, 5)]);
        assert_eq!(lattice.plaquettes.full, vec![(1, 2), (1, 4), (3, 2), (3, 4), (5, 2), (5, 4)]);
        assert_eq!(lattice.plaquettes.edge_low, vec![(1, 0), (3, 0), (5, 0)]);
        assert_eq!(lattice.plaquettes.edge_high, vec![(1, 6), (3, 6), (5, 6)]);
        // interleaved rounds
        assert_eq!(lattice.plaquettes.rounds[0].full, vec![(1, 4), (3, 2), (5, 4)]);
        assert_eq!(lattice.plaquettes.rounds[1].full, vec![(1, 2), (3, 4), (5, 2)]);
        assert_eq!(lattice.plaquettes.rounds[0].edge_high, vec![(3, 6)]);
        assert_eq!(lattice.plaquettes.rounds[1].edge_high, vec![(1, 6), (5, 6)]);
        assert_eq!(lattice.stars.rounds[0].full, vec![(2, 1), (2, 5), (4, 3)]);
        assert_eq!(lattice.stars.rounds[1].full, vec![(2, 3), (4, 1), (4, 5)]);
        assert_eq!(lattice.stars.rounds[0].edge_low, vec![(0, 1), (0, 5)]);
        assert_eq!(lattice.stars.rounds[1].edge_low, vec![(0, 3)]);
    }

    proptest! {
        #[test]
        fn lattice_layout_counts(size in 1usize..14) {
            let lattice = PlanarLattice::new(size).unwrap();
            prop_assert_eq!(lattice.qubits.len(), 2 * size * size + 2 * size + 1);
            for layout in [&lattice.stars, &lattice.plaquettes] {
                prop_assert_eq!(layout.full.len(), size * (size - 1));
                prop_assert_eq!(layout.edge_low.len(), size);
                prop_assert_eq!(layout.edge_high.len(), size);
                assert_partition(&layout.full, &layout.rounds[0].full, &layout.rounds[1].full);
                assert_partition(&layout.edge_low, &layout.rounds[0].edge_low, &layout.rounds[1].edge_low);
                assert_partition(&layout.edge_high, &layout.rounds[0].edge_high, &layout.rounds[1].edge_high);
                for (position, shape) in layout.iter_with_shape() {
                    prop_assert_eq!(lattice.shape_at(layout.stabilizer_type, position), Some(shape));
                }
            }
            for stabilizer_type in [StabilizerType::Star, StabilizerType::Plaquette] {
                prop_assert_eq!(lattice.stabilizer_sites(stabilizer_type).len(), size * (size + 1));
                prop_assert_eq!(lattice.raw_layer(stabilizer_type).len(), size * (size + 1));
            }
        }

        #[test]
        fn lattice_clean_measurement(size in 1usize..10, seed in any::<u64>()) {
            let mut lattice = PlanarLattice::new(size).unwrap();
            let mut rng = DeterministicRng::seed_from_u64(seed);
            lattice.measure_plaquettes(0., &mut rng).unwrap();
            lattice.measure_stars(0., &mut rng).unwrap();
            prop_assert_eq!(lattice.find_anyons(), LatticeAnyons::default());
            prop_assert_eq!(lattice.measure_logical(), [1, 1]);
        }
    }

    #[test]
    fn lattice_single_errors() {
        // cargo test lattice_single_errors -- --nocapture
        let mut lattice = PlanarLattice::new(3).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(0);
        lattice.multiply_qubit((2, 2), Channel::X, -1);
        lattice.multiply_qubit((2, 2), Channel::Z, -1);
        lattice.multiply_qubit((1, 1), Channel::X, -1);
        lattice.measure_plaquettes(0., &mut rng).unwrap();
        lattice.measure_stars(0., &mut rng).unwrap();
        let anyons = lattice.find_anyons();
        // (1, 2) sees both X errors
        assert_eq!(anyons.plaquettes, vec![(3, 2), (1, 0)]);
        assert_eq!(anyons.stars, vec![(2, 1), (2, 3)]);
        assert_eq!(lattice.measure_logical(), [1, 1]);
        // errors on the logical supports
        lattice.multiply_qubit((0, 4), Channel::X, -1);
        assert_eq!(lattice.measure_logical(), [-1, 1]);
        lattice.multiply_qubit((4, 0), Channel::Z, -1);
        assert_eq!(lattice.measure_logical(), [-1, -1]);
    }

    #[test]
    fn lattice_lies_without_errors() {
        // cargo test lattice_lies_without_errors -- --nocapture
        let mut lattice = PlanarLattice::new(4).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(1);
        lattice.measure_stars(1., &mut rng).unwrap();
        assert!(lattice.raw_layer(StabilizerType::Star).iter().all(|&v| v == -1));
        assert!(lattice.raw_layer(StabilizerType::Plaquette).iter().all(|&v| v == 1));
        assert!(lattice.measure_stars(1.5, &mut rng).is_err());
        assert!(lattice.measure_plaquettes(f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn lattice_random_errors_deterministic() {
        // cargo test lattice_random_errors_deterministic -- --nocapture
        let run = |seed: u64| {
            let mut lattice = PlanarLattice::new(5).unwrap();
            let mut rng = DeterministicRng::seed_from_u64(seed);
            lattice.apply_random_errors(0.2, 0.2, &mut rng).unwrap();
            lattice.apply_random_errors_xyz(0.1, 0.1, 0.1, &mut rng).unwrap();
            lattice
        };
        assert_eq!(run(7), run(7));
        let mut lattice = PlanarLattice::new(3).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(0);
        lattice.apply_random_errors(1., 0., &mut rng).unwrap();
        assert!(lattice.qubits.iter().all(|&q| lattice.qubit(q, Channel::X) == -1));
        assert!(lattice.qubits.iter().all(|&q| lattice.qubit(q, Channel::Z) == 1));
        // Y flips both and composes with X back to a pure Z
        lattice.apply_random_errors_xyz(0., 1., 0., &mut rng).unwrap();
        assert!(lattice.qubits.iter().all(|&q| lattice.qubit(q, Channel::X) == 1));
        assert!(lattice.qubits.iter().all(|&q| lattice.qubit(q, Channel::Z) == -1));
        assert!(lattice.apply_random_errors(-0.1, 0., &mut rng).is_err());
    }

    #[test]
    fn lattice_flip_array_size_mismatch() {
        // cargo test lattice_flip_array_size_mismatch -- --nocapture
        let mut lattice = PlanarLattice::new(3).unwrap();
        let pattern = FlipPattern::new(4);
        let before = lattice.clone();
        assert_eq!(
            lattice.apply_flip_array(Channel::X, &pattern).unwrap_err(),
            ConfigurationError::PatternSizeMismatch { expected: 7, actual: 9 }
        );
        assert_eq!(lattice, before);
    }

    #[test]
    fn lattice_apply_matching_to_boundary() {
        // cargo test lattice_apply_matching_to_boundary -- --nocapture
        let mut lattice = PlanarLattice::new(3).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(0);
        lattice.multiply_qubit((2, 2), Channel::X, -1);
        lattice.measure_plaquettes(0., &mut rng).unwrap();
        assert_eq!(lattice.find_anyons().plaquettes, vec![(1, 2), (3, 2)]);
        // (1, 2) to the top rail flips (0, 2), (3, 2) to the bottom rail flips (4, 2) and (6, 2)
        lattice
            .apply_matching(Channel::X, &[((1, 2), (-1, 2)), ((3, 2), (7, 2)), ((-1, 2), (7, 2))])
            .unwrap();
        lattice.measure_plaquettes(0., &mut rng).unwrap();
        assert!(lattice.find_anyons().plaquettes.is_empty());
        // a chain from rail to rail is a logical operator
        assert_eq!(lattice.measure_logical(), [-1, 1]);
    }

    #[test]
    fn lattice_stabilizer_with_error() {
        // cargo test lattice_stabilizer_with_error -- --nocapture
        let mut lattice = PlanarLattice::new(3).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(3);
        let lie = StabilizerError {
            lie: -1,
            ..Default::default()
        };
        lattice
            .measure_stabilizer_with_error(
                StabilizerType::Star,
                (0, 3),
                StabilizerShape::TopEdge,
                &lie,
                MeasurementRound::First,
                0.,
                &mut rng,
            )
            .unwrap();
        assert_eq!(lattice.stabilizer((0, 3)), -1);
        // wrong shape or wrong site is rejected before any mutation
        let before = lattice.clone();
        assert!(lattice
            .measure_stabilizer_with_error(
                StabilizerType::Star,
                (0, 3),
                StabilizerShape::Full,
                &lie,
                MeasurementRound::First,
                0.,
                &mut rng
            )
            .is_err());
        assert!(lattice
            .measure_stabilizer_with_error(
                StabilizerType::Plaquette,
                (0, 3),
                StabilizerShape::TopEdge,
                &lie,
                MeasurementRound::First,
                0.,
                &mut rng
            )
            .is_err());
        assert_eq!(lattice, before);
        // incomplete measurement leaves everything untouched
        lattice
            .measure_stabilizer_with_error(
                StabilizerType::Star,
                (0, 3),
                StabilizerShape::TopEdge,
                &StabilizerError::default(),
                MeasurementRound::First,
                1.,
                &mut rng,
            )
            .unwrap();
        assert_eq!(lattice, before);
    }

    #[test]
    fn lattice_stabilizer_round_order() {
        // cargo test lattice_stabilizer_round_order -- --nocapture
        // Z errors on two support qubits of a full star cancel in its product but are visible on the neighbours
        let gate_error = StabilizerError {
            lie: 1,
            qubit_errors: [[1, -1], [1, -1]],
        };
        for round in [MeasurementRound::First, MeasurementRound::Second] {
            let mut lattice = PlanarLattice::new(3).unwrap();
            let mut rng = DeterministicRng::seed_from_u64(11);
            lattice
                .measure_stabilizer_with_error(
                    StabilizerType::Star,
                    (2, 3),
                    StabilizerShape::Full,
                    &gate_error,
                    round,
                    0.,
                    &mut rng,
                )
                .unwrap();
            assert_eq!(lattice.stabilizer((2, 3)), 1);
            let flipped = StabilizerShape::Full
                .support((2, 3))
                .into_iter()
                .filter(|&q| lattice.qubit(q, Channel::Z) == -1)
                .count();
            assert_eq!(flipped, 2);
        }
        // a single Y error: read out before (round 2) sees nothing, after (round 1) sees the flip
        let single = StabilizerError {
            lie: 1,
            qubit_errors: [[-1, -1], [1, 1]],
        };
        for (round, expected) in [(MeasurementRound::First, -1), (MeasurementRound::Second, 1)] {
            let mut lattice = PlanarLattice::new(3).unwrap();
            let mut rng = DeterministicRng::seed_from_u64(5);
            lattice
                .measure_stabilizer_with_error(
                    StabilizerType::Plaquette,
                    (3, 0),
                    StabilizerShape::LeftEdge,
                    &single,
                    round,
                    0.,
                    &mut rng,
                )
                .unwrap();
            assert_eq!(lattice.stabilizer((3, 0)), expected);
        }
    }

    #[test]
    fn lattice_interleaved_clean() {
        // cargo test lattice_interleaved_clean -- --nocapture
        let mut lattice = PlanarLattice::new(5).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(2);
        lattice.measure_stabilizers_interleaved(StabilizerType::Plaquette, 0., 0., &mut rng).unwrap();
        lattice.measure_stabilizers_interleaved(StabilizerType::Star, 0., 0., &mut rng).unwrap();
        assert_eq!(lattice.find_anyons(), LatticeAnyons::default());
        lattice.measure_stabilizers_interleaved(StabilizerType::Star, 1., 0., &mut rng).unwrap();
        assert_eq!(lattice.find_anyons().stars.len(), lattice.stars.len());
    }

    #[test]
    fn lattice_snapshot_tags() {
        // cargo test lattice_snapshot_tags -- --nocapture
        let lattice = PlanarLattice::new(1).unwrap();
        let snapshot = lattice.snapshot();
        assert_eq!(snapshot.cells.len(), 3);
        assert_eq!(snapshot.cells[0][0], CellSnapshot::Qubit { x: 1, z: 1 });
        assert_eq!(snapshot.cells[0][1], CellSnapshot::Star { value: 1 });
        assert_eq!(snapshot.cells[1][0], CellSnapshot::Plaquette { value: 1 });
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["cells"][1][2]["type"], "plaquette");
    }

    #[test]
    fn lattice_stabilizer_error_invalid_sign() {
        // cargo test lattice_stabilizer_error_invalid_sign -- --nocapture
        let mut lattice = PlanarLattice::new(3).unwrap();
        let before = lattice.clone();
        let mut rng = DeterministicRng::seed_from_u64(1);
        let invalid_lie = StabilizerError { lie: 0, ..Default::default() };
        let invalid_qubit = StabilizerError {
            lie: 1,
            qubit_errors: [[1, 2], [1, 1]],
        };
        assert_eq!(invalid_lie.validate(), Err(ConfigurationError::InvalidSign { name: "lie", value: 0 }));
        for error in [invalid_lie, invalid_qubit] {
            let result = lattice.measure_stabilizer_with_error(
                StabilizerType::Star,
                (2, 3),
                StabilizerShape::Full,
                &error,
                MeasurementRound::First,
                0.,
                &mut rng,
            );
            assert!(matches!(result, Err(ConfigurationError::InvalidSign { .. })));
        }
        assert_eq!(lattice, before);
        assert!(StabilizerError::default().validate().is_ok());
    }

    #[test]
    #[should_panic(expected = "qubit multiplier must be +1 or -1")]
    fn lattice_multiply_qubit_invalid_sign() {
        // cargo test lattice_multiply_qubit_invalid_sign -- --nocapture
        let mut lattice = PlanarLattice::new(2).unwrap();
        lattice.multiply_qubit((2, 2), Channel::X, 0);
    }
}
