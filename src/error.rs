//! Error taxonomy
//!
//! Invalid configuration is rejected before any state is mutated. Layout-derived invariants (positions computed by the
//! lattice itself) are not errors and panic when breached.
//!

use crate::util::*;

/// Result type for the simulate-and-decode pipeline
pub type Result<T> = std::result::Result<T, SimulationError>;

/// invalid numeric or structural parameters, fatal to the call only
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("lattice size must be at least 1, got {0}")]
    InvalidSize(usize),

    #[error("probability `{name}` must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("weight `{name}` is out of range: {value}")]
    InvalidWeight { name: &'static str, value: Weight },

    #[error("flip pattern of size {actual} does not fit a lattice of width {expected}")]
    PatternSizeMismatch { expected: usize, actual: usize },

    #[error("raw measurement layer has {actual} entries, expected {expected}")]
    LayerSizeMismatch { expected: usize, actual: usize },

    #[error("`{name}` must be +1 or -1, got {value}")]
    InvalidSign { name: &'static str, value: Sign },

    #[error("{position:?} is not a {stabilizer_type} site of shape {shape:?}")]
    InvalidStabilizer {
        position: Position,
        stabilizer_type: &'static str,
        shape: &'static str,
    },

    #[error("defect at ({}, {}) in round {} is not a {stabilizer_type} site", .anyon.i, .anyon.j, .anyon.t)]
    InvalidDefect { anyon: Anyon, stabilizer_type: &'static str },

    #[error("invalid trial configuration: {0}")]
    InvalidTrialConfig(String),
}

/// failures of a matching solver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchingError {
    #[error("no perfect matching exists over {node_num} nodes with the supplied edges")]
    NoPerfectMatching { node_num: usize },

    #[error("solver output is not an involution without fixed points: {0}")]
    InvalidInvolution(String),

    #[error("edge ({0}, {1}) references a node outside the graph or loops onto itself")]
    InvalidEdge(NodeIndex, NodeIndex),

    #[error("edge weight {weight} exceeds the max safe weight {max_safe_weight}")]
    WeightOverflow { weight: Weight, max_safe_weight: Weight },

    #[error("blossom V library not compiled in, place its sources under `blossomV/`")]
    BlossomVUnavailable,
}

/// anything that can stop a trial
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Matching(#[from] MatchingError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// check that `value` is a probability; NaN is rejected
pub fn check_probability(name: &'static str, value: f64) -> std::result::Result<(), ConfigurationError> {
    if (0. ..=1.).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidProbability { name, value })
    }
}

/// check that `value` is exactly +1 or -1
pub fn check_sign(name: &'static str, value: Sign) -> std::result::Result<(), ConfigurationError> {
    if value == 1 || value == -1 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidSign { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_probability_check() {
        // cargo test error_probability_check -- --nocapture
        assert!(check_probability("p", 0.).is_ok());
        assert!(check_probability("p", 1.).is_ok());
        assert!(check_probability("p", -0.1).is_err());
        assert!(check_probability("p", 1.5).is_err());
        assert_eq!(
            check_probability("p_lie", f64::NAN).map_err(|e| e.to_string()).unwrap_err(),
            "probability `p_lie` must lie in [0, 1], got NaN"
        );
    }

    #[test]
    fn error_sign_check() {
        // cargo test error_sign_check -- --nocapture
        assert!(check_sign("lie", 1).is_ok());
        assert!(check_sign("lie", -1).is_ok());
        assert_eq!(check_sign("lie", 0), Err(ConfigurationError::InvalidSign { name: "lie", value: 0 }));
        assert_eq!(check_sign("lie", 2).map_err(|e| e.to_string()).unwrap_err(), "`lie` must be +1 or -1, got 2");
    }

    #[test]
    fn error_conversion_chain() {
        // cargo test error_conversion_chain -- --nocapture
        fn inner() -> Result<()> {
            Err(ConfigurationError::InvalidSize(0))?;
            Ok(())
        }
        let error = inner().unwrap_err();
        assert!(matches!(error, SimulationError::Configuration(ConfigurationError::InvalidSize(0))));
        assert_eq!(error.to_string(), "lattice size must be at least 1, got 0");
    }
}
