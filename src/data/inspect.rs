use std::fmt;
use std::ops::Range;

use ndarray::ArrayView2;

use super::model::{ParticipantDataset, Phase};

/// Absolute tolerance for "near zero", matching `numpy.isclose(x, 0)`.
pub const NEAR_ZERO_ATOL: f64 = 1e-8;

/// Share of near-zero samples above which a channel counts as flat.
pub const FLAT_FRACTION: f64 = 0.95;

/// Statistical fingerprint of a slice, taken over all of its cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub rows: usize,
    pub cols: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ChannelStats {
    /// `None` for an empty slice.
    pub fn of(slice: ArrayView2<'_, f64>) -> Option<Self> {
        if slice.is_empty() {
            return None;
        }
        let n = slice.len() as f64;
        let mean = slice.sum() / n;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = slice
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(Self {
            rows: slice.nrows(),
            cols: slice.ncols(),
            mean,
            std: var.sqrt(),
            min,
            max,
        })
    }
}

impl fmt::Display for ChannelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shape ({}, {})  mean {:.6}  std {:.6}  min {:.6}  max {:.6}",
            self.rows, self.cols, self.mean, self.std, self.min, self.max
        )
    }
}

/// A channel whose samples are almost all zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatChannel {
    /// Column number in the combined matrix.
    pub column: usize,
    /// Fraction of near-zero samples, in `[0, 1]`.
    pub near_zero_fraction: f64,
}

/// Channels of `slice` with more than [`FLAT_FRACTION`] near-zero samples.
/// `first_column` is the slice's offset in the combined matrix.
pub fn flat_channels(slice: ArrayView2<'_, f64>, first_column: usize) -> Vec<FlatChannel> {
    if slice.nrows() == 0 {
        return Vec::new();
    }
    let rows = slice.nrows() as f64;
    slice
        .columns()
        .into_iter()
        .enumerate()
        .filter_map(|(j, channel)| {
            let zeros = channel.iter().filter(|v| v.abs() <= NEAR_ZERO_ATOL).count();
            let fraction = zeros as f64 / rows;
            (fraction > FLAT_FRACTION).then_some(FlatChannel {
                column: first_column + j,
                near_zero_fraction: fraction,
            })
        })
        .collect()
}

/// One row of a trial listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSummary {
    pub trial: usize,
    pub rows: Range<usize>,
}

impl TrialSummary {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for TrialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trial {}: rows [{}, {}) (length {})",
            self.trial,
            self.rows.start,
            self.rows.end,
            self.len()
        )
    }
}

pub fn trial_summaries(dataset: &ParticipantDataset, phase: Phase) -> Vec<TrialSummary> {
    dataset
        .trials(phase)
        .enumerate()
        .map(|(trial, rows)| TrialSummary { trial, rows })
        .collect()
}
