extern crate clap;
extern crate pbr;

use clap::{Parser, Subcommand};
use pbr::ProgressBar;
use planar_mwpm::decoding_graph::DecodingWeights;
use planar_mwpm::error::{ConfigurationError, Result};
use planar_mwpm::mwpm_solver::SolverType;
use planar_mwpm::simulation::*;
use planar_mwpm::util::*;
use planar_mwpm::visualize::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone)]
#[clap(author = clap::crate_authors!(", "))]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Planar surface code with faulty measurements, decoded by minimum-weight perfect matching")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// run many trials of a single configuration
    Simulate(SimulateParameters),
    /// run every combination of sizes and error rates, one summary line each
    Scan(ScanParameters),
}

#[derive(clap::Args, Clone, Debug)]
struct DecoderParameters {
    /// weight of one lattice step
    #[clap(long, default_value_t = 1)]
    space_weight: Weight,
    /// weight of one measurement round
    #[clap(long, default_value_t = 1)]
    time_weight: Weight,
    /// weight of one step towards the boundary, defaults to the space weight
    #[clap(long)]
    boundary_weight: Option<Weight>,
    /// matching solver
    #[clap(long, value_enum, default_value_t = SolverType::Serial)]
    solver: SolverType,
    /// run trials on all cores
    #[clap(long, action)]
    parallel: bool,
}

impl DecoderParameters {
    fn weights(&self) -> DecodingWeights {
        DecodingWeights {
            space: self.space_weight,
            time: self.time_weight,
            boundary: self.boundary_weight,
        }
    }
}

#[derive(clap::Args, Clone, Debug)]
struct SimulateParameters {
    /// lattice size
    #[clap(short = 'd', long, default_value_t = 5)]
    size: usize,
    /// noisy measurement rounds before the final perfect one
    #[clap(short = 'r', long, default_value_t = 1)]
    rounds: usize,
    /// X and Z error rate per qubit and round
    #[clap(short = 'p', long, default_value_t = 0.01)]
    p: f64,
    /// Y error rate, switches to independent X, Y and Z draws
    #[clap(long, default_value_t = 0.)]
    p_y: f64,
    /// measurement error rate
    #[clap(long, default_value_t = 0.)]
    p_lie: f64,
    /// two-qubit gate error rate of interleaved measurements
    #[clap(long)]
    p_gate: Option<f64>,
    #[clap(flatten)]
    decoder: DecoderParameters,
    /// number of trials
    #[clap(short = 'n', long, default_value_t = 1000)]
    trials: usize,
    /// seed of the first trial, trial `i` uses `seed + i`
    #[clap(long, default_value_t = 0)]
    seed: u64,
    /// JSON trial configuration, replaces the noise and weight options
    #[clap(long)]
    config: Option<String>,
    /// write per-trial decoding time to this file as JSON lines, runs serially
    #[clap(long)]
    benchmark_profiler_output: Option<String>,
    /// record the first trial into an automatically named file in the visualizer data folder
    #[clap(long, action)]
    enable_visualizer: bool,
}

#[derive(clap::Args, Clone, Debug)]
struct ScanParameters {
    /// lattice sizes: [a,b,c,...]
    #[clap(long, default_value = "[3,5,7]")]
    sizes: String,
    /// error rates: [a,b,c,...]
    #[clap(long, default_value = "[0.01,0.02,0.05]")]
    ps: String,
    /// noisy rounds, defaults to the lattice size
    #[clap(short = 'r', long)]
    rounds: Option<usize>,
    /// measurement error rate, defaults to the error rate
    #[clap(long)]
    p_lie: Option<f64>,
    #[clap(flatten)]
    decoder: DecoderParameters,
    #[clap(short = 'n', long, default_value_t = 1000)]
    trials: usize,
    #[clap(long, default_value_t = 0)]
    seed: u64,
}

fn parse_list<T: serde::de::DeserializeOwned>(name: &str, value: &str) -> std::result::Result<Vec<T>, ConfigurationError> {
    serde_json::from_str(value).map_err(|error| ConfigurationError::InvalidTrialConfig(format!("{name} should be [a,b,c,...]: {error}")))
}

/// run in batches so the progress bar moves even in parallel mode
fn run_with_progress(config: &TrialConfig, seed: u64, trials: usize, decoder: &DecoderParameters, message: &str) -> Result<SimulationStatistics> {
    let mut statistics = SimulationStatistics::new(config);
    let mut pb = ProgressBar::on(std::io::stderr(), trials as u64);
    pb.message(message);
    let batch_size = if decoder.parallel { 1000 } else { 100 };
    let mut begin = 0;
    while begin < trials {
        let end = (begin + batch_size).min(trials);
        let outcomes = run_trial_range(config, seed, begin..end, decoder.solver, decoder.parallel)?;
        statistics.extend(&outcomes);
        pb.set(end as u64);
        begin = end;
    }
    pb.finish();
    eprintln!();
    Ok(statistics)
}

impl SimulateParameters {
    fn trial_config(&self) -> std::result::Result<TrialConfig, ConfigurationError> {
        if let Some(config) = self.config.as_ref() {
            return TrialConfig::from_json(config);
        }
        let mut config = TrialConfig::new(self.size, self.rounds, self.p, self.p_lie);
        config.p_y = self.p_y;
        config.p_gate = self.p_gate;
        config.weights = self.decoder.weights();
        config.validate()?;
        Ok(config)
    }

    fn run(self) -> Result<()> {
        let config = self.trial_config()?;
        tracing::info!("simulating {}", serde_json::to_string(&config)?);
        let statistics = if self.benchmark_profiler_output.is_some() || self.enable_visualizer {
            self.run_detailed(&config)?
        } else {
            run_with_progress(&config, self.seed, self.trials, &self.decoder, "simulate ")?
        };
        tracing::info!(
            trials = statistics.trials,
            successes = statistics.successes,
            "logical error rate {:.3e}",
            statistics.logical_error_rate
        );
        println!("{}", serde_json::to_string(&statistics)?);
        Ok(())
    }

    /// serial run with profiler and visualizer attached
    fn run_detailed(&self, config: &TrialConfig) -> Result<SimulationStatistics> {
        let config_value = serde_json::to_value(config)?;
        let mut profiler = BenchmarkProfiler::new(
            config.rounds,
            self.benchmark_profiler_output
                .as_ref()
                .map(|filename| (filename.clone(), &config_value)),
        )?;
        let mut visualizer = if self.enable_visualizer {
            let filename = auto_visualize_data_filename();
            tracing::info!("visualizer data file: {filename}");
            let mut visualizer = Visualizer::new(Some(visualize_data_folder() + filename.as_str()))?;
            visualizer.set_base(config_value.clone());
            Some(visualizer)
        } else {
            None
        };
        let mut solver = self.decoder.solver.build()?;
        let mut statistics = SimulationStatistics::new(config);
        let mut pb = ProgressBar::on(std::io::stderr(), self.trials as u64);
        for trial_index in 0..self.trials {
            pb.set(trial_index as u64);
            let visualizer = if trial_index == 0 { visualizer.as_mut() } else { None };
            let outcome = run_trial_detailed(config, trial_index, self.seed, &mut *solver, visualizer, Some(&mut profiler))?;
            statistics.extend(&[outcome]);
        }
        pb.finish();
        eprintln!();
        if self.trials > 0 {
            tracing::info!("profile {}", profiler.brief());
        }
        Ok(statistics)
    }
}

impl ScanParameters {
    fn run(self) -> Result<()> {
        let sizes: Vec<usize> = parse_list("sizes", &self.sizes)?;
        let ps: Vec<f64> = parse_list("ps", &self.ps)?;
        let combination_num = sizes.len() * ps.len();
        for (index, (&size, &p)) in sizes.iter().flat_map(|size| ps.iter().map(move |p| (size, p))).enumerate() {
            let mut config = TrialConfig::new(size, self.rounds.unwrap_or(size), p, self.p_lie.unwrap_or(p));
            config.weights = self.decoder.weights();
            config.validate()?;
            let message = format!("d={size} p={p} [{index}/{combination_num}] ");
            let statistics = run_with_progress(&config, self.seed, self.trials, &self.decoder, &message)?;
            println!("{}", serde_json::to_string(&statistics)?);
        }
        Ok(())
    }
}

pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate(parameters) => parameters.run(),
        Commands::Scan(parameters) => parameters.run(),
    }
}
