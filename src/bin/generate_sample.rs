//! Write a synthetic participant folder that `trialmat` can load.
//!
//! EMG channels carry noise under a per-trial activation burst, kinematic
//! channels follow minimum-jerk lift trajectories, and one OTB electrode is
//! left dead so the flat-channel check has something to find.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ndarray::{concatenate, Array2, Axis};

use trialmat::data::writer;
use trialmat::{FeatureIndex, MatrixFormat, ModalityRange, Phase, StandardScaler, StoreConfig};

const OTB_CHANNELS: usize = 112;
const MYO_CHANNELS: usize = 5;
const KIN_CHANNELS: usize = 63;
const DEAD_OTB_CHANNEL: usize = 7;

#[derive(Parser, Debug)]
#[command(name = "generate_sample", about = "Write a synthetic participant dataset")]
struct Args {
    /// Directory to create the P(<pid>) folder in
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    #[arg(short, long, default_value = "1")]
    pid: u32,

    #[arg(short, long, default_value = "parquet")]
    format: MatrixFormat,

    /// Trials per phase
    #[arg(short, long, default_value = "10")]
    trials: usize,

    #[arg(long, default_value = "42")]
    seed: u64,
}

/// Seeded SplitMix64 stream; enough for reproducible synthetic recordings.
struct Noise(u64);

impl Noise {
    fn next_unit(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        (z ^ (z >> 31)) as f64 / u64::MAX as f64
    }

    /// Trial length drawn uniformly from `[lo, hi)`.
    fn trial_len(&mut self, lo: usize, hi: usize) -> usize {
        lo + (self.next_unit() * (hi - lo) as f64) as usize % (hi - lo)
    }

    /// Zero-mean sample with standard deviation `sigma` (Box-Muller).
    fn normal(&mut self, sigma: f64) -> f64 {
        let radius = (-2.0 * self.next_unit().max(1e-15).ln()).sqrt();
        sigma * radius * (std::f64::consts::TAU * self.next_unit()).cos()
    }
}

/// Activation envelope peaking at normalized time `center`.
fn burst(t: f64, center: f64, width: f64) -> f64 {
    0.1 + (-(t - center).powi(2) / (2.0 * width.powi(2))).exp()
}

/// Minimum-jerk position profile on `[0, 1]`.
fn min_jerk(t: f64) -> f64 {
    10.0 * t.powi(3) - 15.0 * t.powi(4) + 6.0 * t.powi(5)
}

fn generate_trial(rows: usize, rng: &mut Noise) -> Array2<f64> {
    let total = OTB_CHANNELS + MYO_CHANNELS + KIN_CHANNELS;
    let center = 0.4 + 0.2 * rng.next_unit();
    let reach: Vec<f64> = (0..KIN_CHANNELS).map(|_| rng.normal(50.0)).collect();
    let offset: Vec<f64> = (0..KIN_CHANNELS).map(|_| rng.normal(100.0)).collect();

    let mut trial = Array2::zeros((rows, total));
    for i in 0..rows {
        let t = if rows > 1 { i as f64 / (rows - 1) as f64 } else { 0.0 };
        let envelope = burst(t, center, 0.15);
        for j in 0..OTB_CHANNELS {
            if j != DEAD_OTB_CHANNEL {
                trial[[i, j]] = rng.normal(0.05 * envelope);
            }
        }
        for j in 0..MYO_CHANNELS {
            trial[[i, OTB_CHANNELS + j]] = rng.normal(0.2 * envelope).abs();
        }
        for j in 0..KIN_CHANNELS {
            trial[[i, OTB_CHANNELS + MYO_CHANNELS + j]] =
                offset[j] + reach[j] * min_jerk(t) + rng.normal(0.5);
        }
    }
    trial
}

fn generate_phase(
    trials: usize,
    min_len: usize,
    max_len: usize,
    rng: &mut Noise,
) -> Result<(Array2<f64>, Vec<usize>)> {
    let lengths: Vec<usize> = (0..trials).map(|_| rng.trial_len(min_len, max_len)).collect();
    let pieces: Vec<Array2<f64>> = lengths.iter().map(|&n| generate_trial(n, rng)).collect();
    let views: Vec<_> = pieces.iter().map(|p| p.view()).collect();
    let matrix = concatenate(Axis(0), &views).context("concatenating trials")?;
    Ok((matrix, lengths))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = Noise(args.seed);

    let (phase1, lengths1) = generate_phase(args.trials, 80, 160, &mut rng)?;
    let (phase2, lengths2) = generate_phase(args.trials, 120, 240, &mut rng)?;

    let kin_start = OTB_CHANNELS + MYO_CHANNELS;
    let index = FeatureIndex::new(
        vec![
            ModalityRange { name: "otb".into(), range: (0, OTB_CHANNELS).into() },
            ModalityRange { name: "myo".into(), range: (OTB_CHANNELS, kin_start).into() },
            ModalityRange {
                name: "kin_hand".into(),
                range: (kin_start, kin_start + KIN_CHANNELS).into(),
            },
        ],
        lengths1,
        lengths2,
    )
    .map_err(anyhow::Error::msg)?;

    let config = StoreConfig::new(args.base_dir.clone()).with_format(args.format);
    let paths = config.paths(args.pid);
    writer::write_participant(&paths, args.format, &phase1, &phase2, &index)?;

    let scaler = StandardScaler::fit(phase1.view());
    let scaler_path = paths.dir.join(format!("P{}_global_scaler.json", args.pid));
    let text = serde_json::to_string(&scaler).context("serializing scaler")?;
    std::fs::write(&scaler_path, text).context("writing scaler")?;

    for phase in Phase::ALL {
        println!(
            "{phase}: {} trials, {} rows → {}",
            index.num_trials(phase),
            match phase {
                Phase::One => phase1.nrows(),
                Phase::Two => phase2.nrows(),
            },
            paths.matrix(phase).display()
        );
    }
    println!("Feature index → {}", paths.feature_indices.display());
    Ok(())
}
