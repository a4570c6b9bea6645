//! the pinned regression scenario: size 6, one noisy round, p = 0.05, perfect measurements, seed 0, 100 trials
//!
//! cargo run --release --bin example-planar

use planar_mwpm::mwpm_solver::SolverType;
use planar_mwpm::simulation::*;

fn main() -> planar_mwpm::error::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let config = TrialConfig::new(6, 1, 0.05, 0.);
    let outcomes = run_trials(&config, 0, 100, SolverType::Serial, false)?;
    let statistics = SimulationStatistics::from_outcomes(&config, &outcomes);
    let parallel = run_trials(&config, 0, 100, SolverType::Serial, true)?;
    assert_eq!(outcomes, parallel, "parallel trials must reproduce the serial ones");
    assert_eq!(statistics.successes, 98, "regression count changed");
    tracing::info!("successes: {}/{}", statistics.successes, statistics.trials);
    println!("{}", serde_json::to_string(&statistics)?);
    Ok(())
}
