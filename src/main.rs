//! `trialmat` – inspect and export preprocessed lift-and-hold recordings.
//!
//! ```bash
//! # Feature index and derived trial bounds
//! trialmat --base-dir ./data indices 1
//!
//! # Per-modality fingerprint of trial 3 in phase 2
//! trialmat --base-dir ./data inspect 1 --phase 2 --trial 3
//!
//! # Time-normalize one trial's kinematics to 101 samples
//! trialmat export 1 --phase 1 --trial 0 --modality kin_hand \
//!     --length 101 --method linear --out p1_t0_kin.csv
//!
//! # Validate several participants in parallel
//! trialmat batch 1 2 3 4 5 6 7 8
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;

use trialmat::data::inspect::{flat_channels, trial_summaries, ChannelStats};
use trialmat::data::writer;
use trialmat::{
    Interpolation, MatrixFormat, ParticipantDataset, Phase, StoreConfig, TrialMatrixStore,
};

/// Trial-resolved EMG / kinematic matrix store
#[derive(Parser, Debug)]
#[command(name = "trialmat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file (base_dir, preprocessed_dir, matrix_format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing the P(<pid>) folders; overrides config and env
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    /// Matrix file format: parquet, csv, or json
    #[arg(short, long, global = true)]
    format: Option<MatrixFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the feature index and derived trial bounds
    Indices {
        pid: u32,

        /// Trials listed per phase
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Statistical fingerprint and flat-channel check per modality
    Inspect {
        pid: u32,

        #[arg(short, long, default_value = "1")]
        phase: Phase,

        /// Restrict to one trial (whole phase if omitted)
        #[arg(short, long)]
        trial: Option<usize>,
    },

    /// Resample one trial of one modality and write it as CSV
    Export {
        pid: u32,

        #[arg(short, long)]
        phase: Phase,

        #[arg(short, long)]
        trial: usize,

        /// otb, myo, kin_hand, or any extra modality in the index
        #[arg(short, long)]
        modality: String,

        /// Output rows
        #[arg(short, long)]
        length: usize,

        /// Interpolation: linear or cubic_spline
        #[arg(long)]
        method: Interpolation,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Load several participants in parallel and report each outcome
    Batch {
        #[arg(required = true)]
        pids: Vec<u32>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = TrialMatrixStore::new(resolve_config(&cli)?);

    match cli.command {
        Commands::Indices { pid, limit } => {
            let dataset = store.load(pid)?;
            print_indices(&dataset, limit);
        }
        Commands::Inspect { pid, phase, trial } => {
            let dataset = store.load(pid)?;
            inspect(&dataset, phase, trial)?;
        }
        Commands::Export {
            pid,
            phase,
            trial,
            modality,
            length,
            method,
            out,
        } => {
            let dataset = store.load(pid)?;
            let slice = TrialMatrixStore::get_trial_modality(&dataset, phase, trial, &modality)?;
            let resampled = TrialMatrixStore::resample(slice, length, method)?;
            writer::write_csv(&out, resampled.view())
                .with_context(|| format!("writing {}", out.display()))?;
            log::info!(
                "P{pid} {phase} trial {trial} {modality}: {} → {} rows ({method}), wrote {}",
                slice.nrows(),
                resampled.nrows(),
                out.display()
            );
        }
        Commands::Batch { pids } => batch(&store, &pids),
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::from_env()?,
    };
    if let Some(base) = &cli.base_dir {
        config.base_dir = base.clone();
    }
    if let Some(format) = cli.format {
        config.matrix_format = format;
    }
    Ok(config)
}

fn print_indices(dataset: &ParticipantDataset, limit: usize) {
    let rule = "=".repeat(50);
    println!("{rule}\n Feature index for P{}\n{rule}", dataset.pid());
    for m in dataset.index().modalities() {
        println!(
            "  {:<10} columns [{}, {})  width {}",
            m.name,
            m.range.start,
            m.range.end,
            m.range.width()
        );
    }
    if let Some(path) = dataset.scaler_path() {
        println!("  scaler     {}", path.display());
    }

    for phase in Phase::ALL {
        let summaries = trial_summaries(dataset, phase);
        println!("\n  {phase}: {} trials, {} rows", summaries.len(), dataset.matrix(phase).nrows());
        for summary in summaries.iter().take(limit) {
            println!("    - {summary}");
        }
        if summaries.len() > limit {
            println!("    ...");
        }
    }
}

fn inspect(dataset: &ParticipantDataset, phase: Phase, trial: Option<usize>) -> Result<()> {
    let pid = dataset.pid();
    let scope = match trial {
        Some(k) => format!("trial {k}"),
        None => "all trials".to_string(),
    };
    println!("--- P{pid} {phase}, {scope} ---");

    let mut any_flat = false;
    for m in dataset.index().modalities() {
        let slice = match trial {
            Some(k) => TrialMatrixStore::get_trial_modality(dataset, phase, k, &m.name)?,
            None => TrialMatrixStore::get_modality_slice(dataset, phase, &m.name)?,
        };
        match ChannelStats::of(slice) {
            Some(stats) => println!("  {:<10} {stats}", m.name),
            None => println!("  {:<10} slice is empty", m.name),
        }
        for flat in flat_channels(slice, m.range.start) {
            any_flat = true;
            log::warn!(
                "P{pid} {phase}: {} channel {} appears flat ({:.1}% near zero)",
                m.name,
                flat.column,
                flat.near_zero_fraction * 100.0
            );
        }
    }
    if !any_flat {
        println!("  All channels carry non-flat data.");
    }
    Ok(())
}

/// One task per participant; a failure is reported and the batch goes on.
fn batch(store: &TrialMatrixStore, pids: &[u32]) {
    let mut outcomes: Vec<(u32, Result<String, String>)> = pids
        .par_iter()
        .map(|&pid| {
            let outcome = store
                .load(pid)
                .map(|ds| {
                    format!(
                        "{} + {} trials, {} columns",
                        ds.num_trials(Phase::One),
                        ds.num_trials(Phase::Two),
                        ds.index().total_columns()
                    )
                })
                .map_err(|e| e.to_string());
            (pid, outcome)
        })
        .collect();
    outcomes.sort_by_key(|(pid, _)| *pid);

    let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
    for (pid, outcome) in &outcomes {
        match outcome {
            Ok(summary) => println!("  P{pid}: ok ({summary})"),
            Err(e) => {
                log::error!("P{pid}: {e}");
                println!("  P{pid}: FAILED ({e})");
            }
        }
    }
    println!("{} loaded, {failed} failed", outcomes.len() - failed);
}
