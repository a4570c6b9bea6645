//! Syndrome History
//!
//! Accumulates repeated stabilizer measurements into a 3D parity lattice: each layer holds, per stabilizer, the product
//! of the current and the previous raw outcome, so a defect marks the round in which a stabilizer changed value.
//!

use crate::error::{check_sign, ConfigurationError};
use crate::lattice::{stabilizer_sites, PlanarLattice, StabilizerType};
use crate::util::*;
use serde::{Deserialize, Serialize};

/// spacetime defects of both stabilizer types, one list per round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyonHistory {
    pub stars: Vec<Vec<Anyon>>,
    pub plaquettes: Vec<Vec<Anyon>>,
}

impl AnyonHistory {
    pub fn rounds(&self, stabilizer_type: StabilizerType) -> &[Vec<Anyon>] {
        match stabilizer_type {
            StabilizerType::Star => &self.stars,
            StabilizerType::Plaquette => &self.plaquettes,
        }
    }

    pub fn defect_num(&self, stabilizer_type: StabilizerType) -> usize {
        self.rounds(stabilizer_type).iter().map(|round| round.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChannelHistory {
    positions: Vec<Position>,
    previous: Vec<Sign>,
    parity: Vec<Vec<Sign>>,
}

impl ChannelHistory {
    fn new(size: usize, stabilizer_type: StabilizerType) -> Self {
        let positions = stabilizer_sites(size, stabilizer_type);
        let previous = vec![1; positions.len()];
        Self {
            positions,
            previous,
            parity: vec![],
        }
    }

    fn push(&mut self, raw: &[Sign]) {
        let layer: Vec<Sign> = raw.iter().zip(self.previous.iter()).map(|(a, b)| a * b).collect();
        self.parity.push(layer);
        self.previous = raw.to_vec();
    }

    fn anyons(&self) -> Vec<Vec<Anyon>> {
        self.parity
            .iter()
            .enumerate()
            .map(|(t, layer)| {
                layer
                    .iter()
                    .zip(self.positions.iter())
                    .filter(|(value, _)| **value == -1)
                    .map(|(_, &(i, j))| Anyon::new(t, i, j))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyndromeHistory {
    pub size: usize,
    stars: ChannelHistory,
    plaquettes: ChannelHistory,
}

impl SyndromeHistory {
    pub fn new(size: usize) -> Result<Self, ConfigurationError> {
        if size == 0 {
            return Err(ConfigurationError::InvalidSize(size));
        }
        Ok(Self {
            size,
            stars: ChannelHistory::new(size, StabilizerType::Star),
            plaquettes: ChannelHistory::new(size, StabilizerType::Plaquette),
        })
    }

    /// number of stabilizers of each type, `d * (d + 1)`
    pub fn stabilizer_num(&self) -> usize {
        self.stars.positions.len()
    }

    fn channel(&self, stabilizer_type: StabilizerType) -> &ChannelHistory {
        match stabilizer_type {
            StabilizerType::Star => &self.stars,
            StabilizerType::Plaquette => &self.plaquettes,
        }
    }

    pub fn positions(&self, stabilizer_type: StabilizerType) -> &[Position] {
        &self.channel(stabilizer_type).positions
    }

    /// parity-change layers of a type, oldest first
    pub fn parity_layers(&self, stabilizer_type: StabilizerType) -> &[Vec<Sign>] {
        &self.channel(stabilizer_type).parity
    }

    /// number of recorded rounds
    pub fn time(&self) -> usize {
        self.plaquettes.parity.len()
    }

    /// record the current stabilizer values of `lattice`
    pub fn add_measurement(&mut self, lattice: &PlanarLattice) -> Result<(), ConfigurationError> {
        if lattice.size != self.size {
            return Err(ConfigurationError::LayerSizeMismatch {
                expected: self.stabilizer_num(),
                actual: lattice.size * (lattice.size + 1),
            });
        }
        let star_raw = lattice.raw_layer(StabilizerType::Star);
        let plaquette_raw = lattice.raw_layer(StabilizerType::Plaquette);
        self.add_layers(&star_raw, &plaquette_raw)
    }

    /// record explicit raw layers in row-major stabilizer order; nothing is recorded unless both layers have the right
    /// length and hold only +1 and -1
    pub fn add_layers(&mut self, star_raw: &[Sign], plaquette_raw: &[Sign]) -> Result<(), ConfigurationError> {
        for (name, raw) in [("star_raw", star_raw), ("plaquette_raw", plaquette_raw)] {
            if raw.len() != self.stabilizer_num() {
                return Err(ConfigurationError::LayerSizeMismatch {
                    expected: self.stabilizer_num(),
                    actual: raw.len(),
                });
            }
            for &value in raw.iter() {
                check_sign(name, value)?;
            }
        }
        self.stars.push(star_raw);
        self.plaquettes.push(plaquette_raw);
        Ok(())
    }

    /// defects per type and round, in stabilizer-index order within a round
    pub fn find_anyons(&self) -> AnyonHistory {
        AnyonHistory {
            stars: self.stars.anyons(),
            plaquettes: self.plaquettes.anyons(),
        }
    }

    /// the latest parity layer of both types on the lattice grid, `None` at qubit sites
    pub fn top_layer_snapshot(&self) -> Option<Vec<Vec<Option<Sign>>>> {
        let width = 2 * self.size + 1;
        let star_layer = self.stars.parity.last()?;
        let plaquette_layer = self.plaquettes.parity.last()?;
        let mut grid = vec![vec![None; width]; width];
        for (history, layer) in [(&self.stars, star_layer), (&self.plaquettes, plaquette_layer)] {
            for (&(i, j), &value) in history.positions.iter().zip(layer.iter()) {
                grid[i as usize][j as usize] = Some(value);
            }
        }
        Some(grid)
    }
}
