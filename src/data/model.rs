use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Phase – experimental segment selector
// ---------------------------------------------------------------------------

/// One of the two experimental segments recorded per participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "phase1")]
    One,
    #[serde(rename = "phase2")]
    Two,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::One, Phase::Two];

    /// 1-based number used in file names and metadata keys.
    pub fn number(self) -> u8 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase{}", self.number())
    }
}

impl FromStr for Phase {
    type Err = String;

    /// Accepts `1`, `p1`, `phase1` (case-insensitive), likewise for 2.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower
            .strip_prefix("phase")
            .or_else(|| lower.strip_prefix('p'))
            .unwrap_or(&lower);
        match digits {
            "1" => Ok(Phase::One),
            "2" => Ok(Phase::Two),
            _ => Err(format!("unknown phase '{s}' (expected 1 or 2)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Modality – the three channel groups every participant carries
// ---------------------------------------------------------------------------

/// The channel groups written by the preprocessing step, in column order.
///
/// Lookups on the store take any `AsRef<str>`, so extra modalities declared
/// in the metadata are reachable by name as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// High-density OTB surface electrode grid.
    Otb,
    /// Myo EMG bands (forearm, biceps, triceps).
    Myo,
    /// Motion-capture derived hand features.
    KinHand,
}

impl Modality {
    pub const REQUIRED: [Modality; 3] = [Modality::Otb, Modality::Myo, Modality::KinHand];

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Otb => "otb",
            Modality::Myo => "myo",
            Modality::KinHand => "kin_hand",
        }
    }
}

impl AsRef<str> for Modality {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ColumnRange / FeatureIndex
// ---------------------------------------------------------------------------

/// Half-open column range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub start: usize,
    pub end: usize,
}

impl ColumnRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<(usize, usize)> for ColumnRange {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

/// A named modality and its column range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalityRange {
    pub name: String,
    pub range: ColumnRange,
}

/// Column layout per modality plus per-phase trial lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureIndex {
    /// Sorted by `range.start`.
    modalities: Vec<ModalityRange>,
    phase1_trial_lengths: Vec<usize>,
    phase2_trial_lengths: Vec<usize>,
}

impl FeatureIndex {
    /// Build an index, checking that the ranges tile `[0, total)` exactly.
    ///
    /// The reason string is returned on failure so callers can attach the
    /// participant id.
    pub fn new(
        mut modalities: Vec<ModalityRange>,
        phase1_trial_lengths: Vec<usize>,
        phase2_trial_lengths: Vec<usize>,
    ) -> Result<Self, String> {
        modalities.sort_by_key(|m| (m.range.start, m.range.end));

        let mut expected_start = 0;
        for (i, m) in modalities.iter().enumerate() {
            if modalities[..i].iter().any(|other| other.name == m.name) {
                return Err(format!("modality '{}' declared twice", m.name));
            }
            if m.range.start >= m.range.end {
                return Err(format!(
                    "modality '{}' has empty or inverted range [{}, {})",
                    m.name, m.range.start, m.range.end
                ));
            }
            if m.range.start != expected_start {
                let kind = if m.range.start > expected_start { "gap" } else { "overlap" };
                return Err(format!(
                    "column {kind} before modality '{}': expected start {expected_start}, found {}",
                    m.name, m.range.start
                ));
            }
            expected_start = m.range.end;
        }
        if modalities.is_empty() {
            return Err("feature index declares no modalities".to_string());
        }

        Ok(Self {
            modalities,
            phase1_trial_lengths,
            phase2_trial_lengths,
        })
    }

    /// Total column count covered by the modality ranges.
    pub fn total_columns(&self) -> usize {
        self.modalities.last().map_or(0, |m| m.range.end)
    }

    /// Modalities in column order.
    pub fn modalities(&self) -> &[ModalityRange] {
        &self.modalities
    }

    pub fn modality_names(&self) -> Vec<String> {
        self.modalities.iter().map(|m| m.name.clone()).collect()
    }

    pub fn range_of(&self, name: &str) -> Option<ColumnRange> {
        self.modalities
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.range)
    }

    pub fn trial_lengths(&self, phase: Phase) -> &[usize] {
        match phase {
            Phase::One => &self.phase1_trial_lengths,
            Phase::Two => &self.phase2_trial_lengths,
        }
    }

    pub fn num_trials(&self, phase: Phase) -> usize {
        self.trial_lengths(phase).len()
    }
}

// ---------------------------------------------------------------------------
// Trial bounds – derived from the length sequence, never stored
// ---------------------------------------------------------------------------

/// Row range of trial `index`, or `None` past the last trial.
pub fn trial_bounds(lengths: &[usize], index: usize) -> Option<Range<usize>> {
    let len = *lengths.get(index)?;
    let start: usize = lengths[..index].iter().sum();
    Some(start..start + len)
}

/// Lazily yields each trial's row range in recording order.
#[derive(Debug, Clone)]
pub struct TrialBounds<'a> {
    lengths: std::slice::Iter<'a, usize>,
    cursor: usize,
}

impl<'a> TrialBounds<'a> {
    pub fn new(lengths: &'a [usize]) -> Self {
        Self {
            lengths: lengths.iter(),
            cursor: 0,
        }
    }
}

impl Iterator for TrialBounds<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.lengths.next()?;
        let start = self.cursor;
        self.cursor += len;
        Some(start..self.cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.lengths.size_hint()
    }
}

impl ExactSizeIterator for TrialBounds<'_> {}

// ---------------------------------------------------------------------------
// ParticipantDataset – the complete loaded participant
// ---------------------------------------------------------------------------

/// Both phase matrices of one participant with their validated index.
#[derive(Debug, Clone)]
pub struct ParticipantDataset {
    pid: u32,
    phase1: Array2<f64>,
    phase2: Array2<f64>,
    index: FeatureIndex,
    /// Location of the pre-fit scaler, if one was written. Never parsed here.
    scaler_path: Option<PathBuf>,
}

impl ParticipantDataset {
    /// Assemble a dataset, enforcing the shape invariants between the
    /// matrices and the index.
    pub fn from_parts(
        pid: u32,
        phase1: Array2<f64>,
        phase2: Array2<f64>,
        index: FeatureIndex,
        scaler_path: Option<PathBuf>,
    ) -> StoreResult<Self> {
        let corrupt = |reason: String| StoreError::CorruptData { pid, reason };

        let columns = index.total_columns();
        for (phase, matrix) in [(Phase::One, &phase1), (Phase::Two, &phase2)] {
            if matrix.ncols() != columns {
                return Err(corrupt(format!(
                    "{phase} matrix has {} columns but the feature index covers {columns}",
                    matrix.ncols()
                )));
            }
            let declared = index
                .trial_lengths(phase)
                .iter()
                .try_fold(0usize, |acc, &len| acc.checked_add(len))
                .ok_or_else(|| corrupt(format!("{phase} trial lengths overflow")))?;
            if declared != matrix.nrows() {
                return Err(corrupt(format!(
                    "{phase} trial lengths sum to {declared} but the matrix has {} rows",
                    matrix.nrows()
                )));
            }
        }

        Ok(Self {
            pid,
            phase1,
            phase2,
            index,
            scaler_path,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn matrix(&self, phase: Phase) -> &Array2<f64> {
        match phase {
            Phase::One => &self.phase1,
            Phase::Two => &self.phase2,
        }
    }

    pub fn index(&self) -> &FeatureIndex {
        &self.index
    }

    pub fn scaler_path(&self) -> Option<&Path> {
        self.scaler_path.as_deref()
    }

    pub fn num_trials(&self, phase: Phase) -> usize {
        self.index.num_trials(phase)
    }

    /// Row ranges of every trial in `phase`, in recording order.
    pub fn trials(&self, phase: Phase) -> TrialBounds<'_> {
        TrialBounds::new(self.index.trial_lengths(phase))
    }
}
