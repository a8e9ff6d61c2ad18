use std::ops::Range;
use std::path::Path;

use ndarray::{s, Array2, ArrayView2};

use super::error::{StoreError, StoreResult};
use super::loader;
use super::model::{trial_bounds, ColumnRange, ParticipantDataset, Phase};
use super::resample::{self, Interpolation};
use crate::config::StoreConfig;

// ---------------------------------------------------------------------------
// TrialMatrixStore – validated access to participant matrices
// ---------------------------------------------------------------------------

/// Loads participants from the configured folder layout and slices their
/// matrices by trial and modality.
///
/// Loaded datasets are immutable, so independent participants can be
/// processed on separate threads without coordination.
#[derive(Debug, Clone, Default)]
pub struct TrialMatrixStore {
    config: StoreConfig,
}

impl TrialMatrixStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Read both phase matrices and the feature index of participant `pid`.
    pub fn load(&self, pid: u32) -> StoreResult<ParticipantDataset> {
        let paths = self.config.paths(pid);
        for path in [&paths.phase1, &paths.phase2, &paths.feature_indices] {
            require_file(path)?;
        }

        let corrupt = |path: &Path, err: anyhow::Error| StoreError::CorruptData {
            pid,
            reason: format!("{}: {err:#}", path.display()),
        };

        let index = loader::load_feature_index(&paths.feature_indices)
            .map_err(|e| corrupt(&paths.feature_indices, e))?;

        let format = self.config.matrix_format;
        let phase1 =
            loader::load_matrix(&paths.phase1, format).map_err(|e| corrupt(&paths.phase1, e))?;
        let phase2 =
            loader::load_matrix(&paths.phase2, format).map_err(|e| corrupt(&paths.phase2, e))?;

        let scaler_path = paths.find_scaler();
        if scaler_path.is_none() {
            log::debug!("P{pid}: no global scaler file in {}", paths.dir.display());
        }

        let dataset = ParticipantDataset::from_parts(pid, phase1, phase2, index, scaler_path)?;
        log::info!(
            "Loaded P{pid}: phase1 {:?} ({} trials), phase2 {:?} ({} trials), modalities {:?}",
            dataset.matrix(Phase::One).dim(),
            dataset.num_trials(Phase::One),
            dataset.matrix(Phase::Two).dim(),
            dataset.num_trials(Phase::Two),
            dataset.index().modality_names(),
        );
        Ok(dataset)
    }

    /// Column range of `modality`.
    pub fn modality_range(
        dataset: &ParticipantDataset,
        modality: impl AsRef<str>,
    ) -> StoreResult<ColumnRange> {
        let name = modality.as_ref();
        dataset
            .index()
            .range_of(name)
            .ok_or_else(|| StoreError::UnknownModality {
                name: name.to_string(),
                known: dataset.index().modality_names(),
            })
    }

    /// All rows of `phase`, restricted to the columns of `modality`.
    pub fn get_modality_slice<'a>(
        dataset: &'a ParticipantDataset,
        phase: Phase,
        modality: impl AsRef<str>,
    ) -> StoreResult<ArrayView2<'a, f64>> {
        let cols = Self::modality_range(dataset, modality)?;
        Ok(dataset.matrix(phase).slice(s![.., cols.as_range()]))
    }

    /// Row bounds of trial `trial` within `phase`.
    pub fn get_trial(
        dataset: &ParticipantDataset,
        phase: Phase,
        trial: usize,
    ) -> StoreResult<Range<usize>> {
        let lengths = dataset.index().trial_lengths(phase);
        trial_bounds(lengths, trial).ok_or(StoreError::IndexOutOfRange {
            phase,
            index: trial,
            num_trials: lengths.len(),
        })
    }

    /// All columns of one trial.
    pub fn get_trial_slice<'a>(
        dataset: &'a ParticipantDataset,
        phase: Phase,
        trial: usize,
    ) -> StoreResult<ArrayView2<'a, f64>> {
        let rows = Self::get_trial(dataset, phase, trial)?;
        Ok(dataset.matrix(phase).slice(s![rows, ..]))
    }

    /// Rows of one trial intersected with the columns of one modality.
    pub fn get_trial_modality<'a>(
        dataset: &'a ParticipantDataset,
        phase: Phase,
        trial: usize,
        modality: impl AsRef<str>,
    ) -> StoreResult<ArrayView2<'a, f64>> {
        let rows = Self::get_trial(dataset, phase, trial)?;
        let cols = Self::modality_range(dataset, modality)?;
        Ok(dataset.matrix(phase).slice(s![rows, cols.as_range()]))
    }

    /// Resample any slice to `target_len` rows; see [`resample::resample`].
    pub fn resample(
        slice: ArrayView2<'_, f64>,
        target_len: usize,
        method: Interpolation,
    ) -> StoreResult<Array2<f64>> {
        resample::resample(slice, target_len, method)
    }

    /// Time-normalize every trial of `phase` for `modality` to `target_len`
    /// rows, in recording order.
    pub fn resampled_trials(
        dataset: &ParticipantDataset,
        phase: Phase,
        modality: impl AsRef<str>,
        target_len: usize,
        method: Interpolation,
    ) -> StoreResult<Vec<Array2<f64>>> {
        let cols = Self::modality_range(dataset, modality)?;
        let matrix = dataset.matrix(phase);
        dataset
            .trials(phase)
            .map(|rows| {
                resample::resample(matrix.slice(s![rows, cols.as_range()]), target_len, method)
            })
            .collect()
    }
}

fn require_file(path: &Path) -> StoreResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(StoreError::NotFound { path: path.to_path_buf() }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::NotFound { path: path.to_path_buf() })
        }
        Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
    }
}
