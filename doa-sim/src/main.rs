mod output;
mod plot;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use doa::{
    array::PairSynthesis,
    sim::{ResolveConfig, VirtualArrayConfig},
};
use tracing::info;

/// Monte Carlo evaluation of MUSIC direction-of-arrival estimation.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Seed of the random streams.
    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Write the results as CSV.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Render the results to a PNG.
    #[arg(long, global = true)]
    plot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detection probability of one source under mutual coupling, per SNR.
    Resolve {
        #[arg(long, default_value_t = 5)]
        sensors: usize,
        #[arg(long, default_value_t = 100)]
        snapshots: usize,
        #[arg(long, default_value_t = -10, allow_negative_numbers = true)]
        snr_low: i32,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        snr_high: i32,
        /// Source direction in degrees.
        #[arg(long, default_value_t = 10., allow_negative_numbers = true)]
        angle: f64,
        /// Number of coupled neighbours.
        #[arg(long, default_value_t = 4)]
        bandwidth: usize,
        /// Coupling strength.
        #[arg(long, default_value_t = 0.01)]
        beta: f64,
        #[arg(long, default_value_t = 10)]
        trials: usize,
        /// Detection tolerance in degrees.
        #[arg(long, default_value_t = 1.)]
        tolerance: f64,
    },
    /// RMSE of a virtual circular array at one SNR, with its last spectrum.
    VirtualArray {
        #[command(flatten)]
        array: VirtualArrayArgs,
        #[arg(long, default_value_t = 20., allow_negative_numbers = true)]
        snr: f64,
    },
    /// RMSE of a virtual circular array per SNR.
    RmseSweep {
        #[command(flatten)]
        array: VirtualArrayArgs,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        snr_low: i32,
        #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
        snr_high: i32,
    },
}

#[derive(Debug, clap::Args)]
struct VirtualArrayArgs {
    #[arg(long, default_value_t = 12)]
    sensors: usize,
    #[arg(long, default_value_t = 8)]
    sources: usize,
    #[arg(long, default_value_t = 2000)]
    snapshots: usize,
    #[arg(long, default_value_t = 10)]
    trials: usize,
    #[arg(long, value_enum, default_value_t = Synthesis::Shared)]
    synthesis: Synthesis,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Synthesis {
    /// One trace per sensor per trial.
    Shared,
    /// Fresh symbols for every sensor pair.
    PerPair,
}

impl VirtualArrayArgs {
    fn config(&self, seed: u64) -> anyhow::Result<VirtualArrayConfig> {
        let config = VirtualArrayConfig::default().with_sources(self.sources)?;

        Ok(VirtualArrayConfig {
            sensors: self.sensors,
            snapshots: self.snapshots,
            trials: self.trials,
            synthesis: match self.synthesis {
                Synthesis::Shared => PairSynthesis::SharedTraces,
                Synthesis::PerPair => PairSynthesis::PerPair,
            },
            seed,
            ..config
        })
    }
}

fn main() -> anyhow::Result<()> {
    // honours RUST_LOG through the env-filter feature
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Resolve {
            sensors,
            snapshots,
            snr_low,
            snr_high,
            angle,
            bandwidth,
            beta,
            trials,
            tolerance,
        } => {
            let config = ResolveConfig {
                sensors,
                snapshots,
                snr_low,
                snr_high,
                true_angle: angle,
                coupling_bandwidth: bandwidth,
                coupling_beta: beta,
                trials,
                tolerance,
                seed: args.seed,
                ..Default::default()
            };
            let detection = doa::resolve(&config)?;

            for (snr, ratio) in detection.snr.iter().zip(&detection.ratio) {
                println!("{snr:>4} dB  {ratio:.3}");
            }
            if let Some(path) = &args.output {
                output::detection(path, &detection)?;
            }
            if let Some(path) = &args.plot {
                plot::detection(path, &detection, trials)?;
            }
        }
        Command::VirtualArray { array, snr } => {
            let config = VirtualArrayConfig {
                snr,
                ..array.config(args.seed)?
            };
            let run = doa::virtual_array_resolve(&config)?;

            println!(
                "RMSE @ {snr} dB over {} runs: {:.4}",
                config.trials, run.rmse
            );
            if let Some(path) = &args.output {
                output::spectrum(path, &run)?;
            }
            if let Some(path) = &args.plot {
                plot::spectrum(path, &run, &config.true_angles, snr)?;
            }
        }
        Command::RmseSweep {
            array,
            snr_low,
            snr_high,
        } => {
            let config = array.config(args.seed)?;
            let sweep = doa::rmse_sweep(&config, snr_low, snr_high)?;

            for (snr, rmse) in sweep.snr.iter().zip(&sweep.rmse) {
                println!("{snr:>4} dB  {rmse:.4}");
            }
            if let Some(path) = &args.output {
                output::rmse(path, &sweep)?;
            }
            if let Some(path) = &args.plot {
                plot::rmse(path, &sweep)?;
            }
        }
    }

    if let Some(path) = &args.output {
        info!(path = %path.display(), "wrote results");
    }

    Ok(())
}
