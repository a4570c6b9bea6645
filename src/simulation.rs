//! Simulation
//!
//! The trial harness: inject errors over several noisy rounds, finish with one perfect round, decode both stabilizer
//! types independently and read out the logical operators. Every trial owns its lattice, history and random stream,
//! so trials may run in any order and on any thread with identical results.
//!

use crate::correction::{apply_correction, FlipPattern};
use crate::decoding_graph::{DecodingGraphBuilder, DecodingWeights};
use crate::error::{check_probability, ConfigurationError, Result, SimulationError};
use crate::lattice::{PlanarLattice, StabilizerType};
use crate::mwpm_solver::{MatchingSolver, SolverType};
use crate::rand_xoshiro::rand_core::SeedableRng;
use crate::rayon::prelude::*;
use crate::syndrome::SyndromeHistory;
use crate::util::*;
use crate::visualize::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// parameters of one family of trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrialConfig {
    /// lattice size `d`, the grid is `(2d+1) x (2d+1)`
    pub size: usize,
    /// noisy measurement rounds before the final perfect round
    #[serde(default = "trial_default_configs::rounds")]
    pub rounds: usize,
    #[serde(default)]
    pub p_x: f64,
    /// when positive, errors are drawn with three independent X, Y and Z draws per qubit
    #[serde(default)]
    pub p_y: f64,
    #[serde(default)]
    pub p_z: f64,
    /// probability that a noisy stabilizer measurement reports the wrong value
    #[serde(default)]
    pub p_lie: f64,
    /// measure stabilizers in two interleaved halves with faulty two-qubit gates of this error rate
    #[serde(default)]
    pub p_gate: Option<f64>,
    #[serde(default)]
    pub weights: DecodingWeights,
}

pub mod trial_default_configs {
    pub fn rounds() -> usize {
        1
    }
}

impl TrialConfig {
    /// symmetric X and Z noise of rate `p`
    pub fn new(size: usize, rounds: usize, p: f64, p_lie: f64) -> Self {
        Self {
            size,
            rounds,
            p_x: p,
            p_y: 0.,
            p_z: p,
            p_lie,
            p_gate: None,
            weights: DecodingWeights::default(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.size == 0 {
            return Err(ConfigurationError::InvalidSize(self.size));
        }
        check_probability("p_x", self.p_x)?;
        check_probability("p_y", self.p_y)?;
        check_probability("p_z", self.p_z)?;
        check_probability("p_lie", self.p_lie)?;
        if let Some(p_gate) = self.p_gate {
            check_probability("p_gate", p_gate)?;
        }
        self.weights.validate()
    }

    /// parse a JSON configuration, unknown fields are rejected
    pub fn from_json(value: &str) -> std::result::Result<Self, ConfigurationError> {
        let config: Self =
            serde_json::from_str(value).map_err(|error| ConfigurationError::InvalidTrialConfig(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// the result of one trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub trial_index: usize,
    pub seed: u64,
    pub logical: [Sign; 2],
    pub success: bool,
    pub star_defects: usize,
    pub plaquette_defects: usize,
}

/// what decoding a history did to the lattice
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub star_defects: usize,
    pub plaquette_defects: usize,
    /// the Z correction derived from star defects
    pub z_correction: FlipPattern,
    /// the X correction derived from plaquette defects
    pub x_correction: FlipPattern,
}

/// decode both stabilizer types of `history` and apply the corrections to `lattice`, Z first
pub fn decode_history(
    lattice: &mut PlanarLattice,
    history: &SyndromeHistory,
    weights: DecodingWeights,
    solver: &mut dyn MatchingSolver,
    mut visualizer: Option<&mut Visualizer>,
) -> Result<DecodeResult> {
    let anyons = history.find_anyons();
    let mut decoded = Vec::with_capacity(2);
    for stabilizer_type in [StabilizerType::Plaquette, StabilizerType::Star] {
        let builder = DecodingGraphBuilder::new(history.size, stabilizer_type, weights)?;
        let graph = builder.build(anyons.rounds(stabilizer_type))?;
        let matching = solver.solve_graph(&graph)?;
        tracing::debug!(
            stabilizer_type = stabilizer_type.name(),
            node_num = graph.node_num,
            edge_num = graph.weighted_edges.len(),
            "matched"
        );
        if let Some(visualizer) = visualizer.as_mut() {
            visualizer.set_positions(graph_positions(&graph), true);
            visualizer.snapshot_combined(format!("{} matching", stabilizer_type.name()), vec![&graph, &matching])?;
        }
        decoded.push((graph, matching));
    }
    let (plaquette_graph, plaquette_matching) = &decoded[0];
    let (star_graph, star_matching) = &decoded[1];
    let z_correction = apply_correction(lattice, star_graph, star_matching)?;
    let x_correction = apply_correction(lattice, plaquette_graph, plaquette_matching)?;
    Ok(DecodeResult {
        star_defects: star_graph.defect_num(),
        plaquette_defects: plaquette_graph.defect_num(),
        z_correction,
        x_correction,
    })
}

/// inject errors and record `config.rounds` noisy rounds plus one perfect round
pub fn simulate_history(config: &TrialConfig, rng: &mut DeterministicRng) -> Result<(PlanarLattice, SyndromeHistory)> {
    let mut lattice = PlanarLattice::new(config.size)?;
    let mut history = SyndromeHistory::new(config.size)?;
    for _ in 0..config.rounds {
        if config.p_y > 0. {
            lattice.apply_random_errors_xyz(config.p_x, config.p_y, config.p_z, rng)?;
        } else {
            lattice.apply_random_errors(config.p_x, config.p_z, rng)?;
        }
        match config.p_gate {
            Some(p_gate) => {
                lattice.measure_stabilizers_interleaved(StabilizerType::Plaquette, config.p_lie, p_gate, rng)?;
                lattice.measure_stabilizers_interleaved(StabilizerType::Star, config.p_lie, p_gate, rng)?;
            }
            None => {
                lattice.measure_plaquettes(config.p_lie, rng)?;
                lattice.measure_stars(config.p_lie, rng)?;
            }
        }
        history.add_measurement(&lattice)?;
    }
    lattice.measure_plaquettes(0., rng)?;
    lattice.measure_stars(0., rng)?;
    history.add_measurement(&lattice)?;
    Ok((lattice, history))
}

pub fn run_trial(config: &TrialConfig, trial_index: usize, base_seed: u64, solver: &mut dyn MatchingSolver) -> Result<TrialOutcome> {
    run_trial_detailed(config, trial_index, base_seed, solver, None, None)
}

/// run one trial, optionally recording snapshots and decoding time
pub fn run_trial_detailed(
    config: &TrialConfig,
    trial_index: usize,
    base_seed: u64,
    solver: &mut dyn MatchingSolver,
    mut visualizer: Option<&mut Visualizer>,
    profiler: Option<&mut BenchmarkProfiler>,
) -> Result<TrialOutcome> {
    let seed = trial_seed(base_seed, trial_index);
    let mut rng = DeterministicRng::seed_from_u64(seed);
    let (mut lattice, history) = simulate_history(config, &mut rng)?;
    if let Some(visualizer) = visualizer.as_mut() {
        visualizer.snapshot_combined("syndrome".to_string(), vec![&lattice, &history])?;
    }
    let mut profiler = profiler;
    if let Some(profiler) = profiler.as_mut() {
        profiler.begin();
    }
    let decoded = decode_history(&mut lattice, &history, config.weights, solver, visualizer.as_deref_mut())?;
    let logical = lattice.measure_logical();
    let success = logical == [1, 1];
    if let Some(profiler) = profiler.as_mut() {
        profiler.end(decoded.star_defects + decoded.plaquette_defects, success)?;
    }
    if let Some(visualizer) = visualizer.as_mut() {
        visualizer.snapshot("corrected".to_string(), &lattice)?;
    }
    tracing::debug!(
        trial_index,
        seed,
        star_defects = decoded.star_defects,
        plaquette_defects = decoded.plaquette_defects,
        success,
        "trial finished"
    );
    Ok(TrialOutcome {
        trial_index,
        seed,
        logical,
        success,
        star_defects: decoded.star_defects,
        plaquette_defects: decoded.plaquette_defects,
    })
}

/// run the trials of `trial_range`; the outcomes are ordered by trial index in both modes
pub fn run_trial_range(
    config: &TrialConfig,
    base_seed: u64,
    trial_range: Range<usize>,
    solver_type: SolverType,
    parallel: bool,
) -> Result<Vec<TrialOutcome>> {
    config.validate()?;
    if parallel {
        trial_range
            .into_par_iter()
            .map_init(
                || solver_type.build(),
                |solver, trial_index| {
                    let solver = solver.as_mut().map_err(|error| SimulationError::from(error.clone()))?;
                    run_trial(config, trial_index, base_seed, &mut **solver)
                },
            )
            .collect()
    } else {
        let mut solver = solver_type.build()?;
        trial_range
            .map(|trial_index| run_trial(config, trial_index, base_seed, &mut *solver))
            .collect()
    }
}

pub fn run_trials(config: &TrialConfig, base_seed: u64, trials: usize, solver_type: SolverType, parallel: bool) -> Result<Vec<TrialOutcome>> {
    run_trial_range(config, base_seed, 0..trials, solver_type, parallel)
}

/// aggregated outcome of many trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatistics {
    pub size: usize,
    pub rounds: usize,
    pub p_x: f64,
    pub p_z: f64,
    pub p_lie: f64,
    pub trials: usize,
    pub successes: usize,
    pub logical_error_rate: f64,
    /// per-logical failure counts, `[X, Z]`
    pub logical_failures: [usize; 2],
    pub average_defects: f64,
}

impl SimulationStatistics {
    pub fn new(config: &TrialConfig) -> Self {
        Self {
            size: config.size,
            rounds: config.rounds,
            p_x: config.p_x,
            p_z: config.p_z,
            p_lie: config.p_lie,
            trials: 0,
            successes: 0,
            logical_error_rate: 0.,
            logical_failures: [0, 0],
            average_defects: 0.,
        }
    }

    pub fn from_outcomes(config: &TrialConfig, outcomes: &[TrialOutcome]) -> Self {
        let mut statistics = Self::new(config);
        statistics.extend(outcomes);
        statistics
    }

    /// accumulate more outcomes
    pub fn extend(&mut self, outcomes: &[TrialOutcome]) {
        let total_defects = self.average_defects * self.trials as f64
            + outcomes
                .iter()
                .map(|outcome| (outcome.star_defects + outcome.plaquette_defects) as f64)
                .sum::<f64>();
        for outcome in outcomes.iter() {
            self.trials += 1;
            if outcome.success {
                self.successes += 1;
            }
            for (failures, &value) in self.logical_failures.iter_mut().zip(outcome.logical.iter()) {
                if value == -1 {
                    *failures += 1;
                }
            }
        }
        if self.trials > 0 {
            self.logical_error_rate = (self.trials - self.successes) as f64 / self.trials as f64;
            self.average_defects = total_defects / self.trials as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Channel;
    use crate::mwpm_solver::SolverSerial;
    use proptest::prelude::*;

    #[test]
    fn simulation_config_json() {
        // cargo test simulation_config_json -- --nocapture
        let config = TrialConfig::from_json(r#"{"size": 4, "p_x": 0.01, "p_z": 0.02, "weights": {"space": 2, "time": 1}}"#).unwrap();
        assert_eq!(config.rounds, 1);
        assert_eq!(config.weights.boundary(), 2);
        assert!(matches!(
            TrialConfig::from_json(r#"{"size": 4, "q": 0.1}"#),
            Err(ConfigurationError::InvalidTrialConfig(_))
        ));
        assert!(matches!(
            TrialConfig::from_json(r#"{"size": 4, "p_lie": 1.5}"#),
            Err(ConfigurationError::InvalidProbability { name: "p_lie", .. })
        ));
        assert!(TrialConfig::new(0, 1, 0.1, 0.).validate().is_err());
    }

    #[test]
    fn simulation_clean_run() {
        // cargo test simulation_clean_run -- --nocapture
        let config = TrialConfig::new(5, 5, 0., 0.);
        let outcomes = run_trials(&config, 7, 10, SolverType::Serial, false).unwrap();
        for outcome in outcomes.iter() {
            assert!(outcome.success);
            assert_eq!(outcome.star_defects + outcome.plaquette_defects, 0);
        }
    }

    #[test]
    fn simulation_single_error_corrected() {
        // cargo test simulation_single_error_corrected -- --nocapture
        let size = 4;
        let width = 2 * size as isize + 1;
        let mut rng = DeterministicRng::seed_from_u64(0);
        for r in 0..width {
            for c in ((r % 2)..width).step_by(2) {
                for channel in [Channel::X, Channel::Z] {
                    let mut lattice = PlanarLattice::new(size).unwrap();
                    let mut history = SyndromeHistory::new(size).unwrap();
                    lattice.multiply_qubit((r, c), channel, -1);
                    lattice.measure_plaquettes(0., &mut rng).unwrap();
                    lattice.measure_stars(0., &mut rng).unwrap();
                    history.add_measurement(&lattice).unwrap();
                    let mut solver = SolverSerial::new();
                    let decoded = decode_history(&mut lattice, &history, DecodingWeights::default(), &mut solver, None).unwrap();
                    assert_eq!(lattice.measure_logical(), [1, 1], "error on {channel:?} at ({r}, {c})");
                    assert!(decoded.star_defects + decoded.plaquette_defects <= 2);
                }
            }
        }
    }

    #[test]
    fn simulation_faulty_measurement_only() {
        // cargo test simulation_faulty_measurement_only -- --nocapture
        // a single lying stabilizer shows up twice in time and must not produce any correction
        let size = 3;
        let mut lattice = PlanarLattice::new(size).unwrap();
        let mut history = SyndromeHistory::new(size).unwrap();
        let mut star_raw = lattice.raw_layer(StabilizerType::Star);
        let plaquette_raw = lattice.raw_layer(StabilizerType::Plaquette);
        history.add_layers(&star_raw, &plaquette_raw).unwrap();
        star_raw[5] = -1;
        history.add_layers(&star_raw, &plaquette_raw).unwrap();
        star_raw[5] = 1;
        history.add_layers(&star_raw, &plaquette_raw).unwrap();
        let decoded = decode_history(&mut lattice, &history, DecodingWeights::default(), &mut SolverSerial::new(), None).unwrap();
        assert_eq!(decoded.star_defects, 2);
        assert!(decoded.z_correction.is_identity());
        assert_eq!(lattice, PlanarLattice::new(size).unwrap());
    }

    #[test]
    fn simulation_serial_parallel_identical() {
        // cargo test simulation_serial_parallel_identical -- --nocapture
        let mut config = TrialConfig::new(4, 3, 0.03, 0.02);
        config.weights.time = 2;
        let serial = run_trials(&config, 42, 40, SolverType::Serial, false).unwrap();
        let parallel = run_trials(&config, 42, 40, SolverType::Serial, true).unwrap();
        assert_eq!(serial, parallel);
        let again = run_trial_range(&config, 42, 10..20, SolverType::Serial, false).unwrap();
        assert_eq!(&serial[10..20], &again[..]);
    }

    #[test]
    fn simulation_interleaved_and_xyz() {
        // cargo test simulation_interleaved_and_xyz -- --nocapture
        let mut config = TrialConfig::new(3, 2, 0.02, 0.01);
        config.p_y = 0.01;
        config.p_gate = Some(0.01);
        let first = run_trials(&config, 3, 20, SolverType::Serial, false).unwrap();
        let second = run_trials(&config, 3, 20, SolverType::Serial, true).unwrap();
        assert_eq!(first, second);
        let mut visualizer = Visualizer::new(None).unwrap();
        let outcome = run_trial_detailed(&config, 0, 3, &mut SolverSerial::new(), Some(&mut visualizer), None).unwrap();
        assert_eq!(outcome, first[0]);
    }

    #[test]
    fn simulation_statistics() {
        // cargo test simulation_statistics -- --nocapture
        let config = TrialConfig::new(3, 1, 0.1, 0.);
        let outcome = |trial_index: usize, logical: [Sign; 2]| TrialOutcome {
            trial_index,
            seed: trial_index as u64,
            logical,
            success: logical == [1, 1],
            star_defects: 2,
            plaquette_defects: 4,
        };
        let mut statistics = SimulationStatistics::from_outcomes(&config, &[outcome(0, [1, 1]), outcome(1, [-1, 1])]);
        statistics.extend(&[outcome(2, [-1, -1]), outcome(3, [1, 1])]);
        assert_eq!(statistics.trials, 4);
        assert_eq!(statistics.successes, 2);
        assert_eq!(statistics.logical_failures, [2, 1]);
        assert_eq!(statistics.logical_error_rate, 0.5);
        assert_eq!(statistics.average_defects, 6.);
    }

    #[test]
    fn simulation_regression_size_6() {
        // cargo test --release simulation_regression_size_6 -- --nocapture
        let config = TrialConfig::new(6, 1, 0.05, 0.);
        let outcomes = run_trials(&config, 0, 100, SolverType::Serial, false).unwrap();
        let statistics = SimulationStatistics::from_outcomes(&config, &outcomes);
        println!("successes: {}/{}", statistics.successes, statistics.trials);
        assert_eq!(statistics.successes, 98);
        let parallel = run_trials(&config, 0, 100, SolverType::Serial, true).unwrap();
        assert_eq!(outcomes, parallel);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn simulation_deterministic(seed in any::<u64>(), size in 1usize..5, rounds in 0usize..4) {
            let config = TrialConfig::new(size, rounds, 0.05, 0.05);
            let mut solver = SolverSerial::new();
            let first = run_trial(&config, 3, seed, &mut solver).unwrap();
            let second = run_trial(&config, 3, seed, &mut solver).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
