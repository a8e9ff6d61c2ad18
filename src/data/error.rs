use std::path::PathBuf;

use thiserror::Error;

use super::model::Phase;

/// Errors surfaced by [`TrialMatrixStore`](super::store::TrialMatrixStore)
/// and the resampling functions.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An expected participant file does not exist.
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A file exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata and matrices disagree, or a file could not be decoded.
    #[error("Corrupt data for participant {pid}: {reason}")]
    CorruptData { pid: u32, reason: String },

    /// The modality name is not present in the feature index.
    #[error("Unknown modality '{name}' (known: {known:?})")]
    UnknownModality { name: String, known: Vec<String> },

    /// Trial index outside `[0, num_trials)`.
    #[error("Trial {index} out of range for {phase}: {num_trials} trials")]
    IndexOutOfRange {
        phase: Phase,
        index: usize,
        num_trials: usize,
    },

    /// Too few rows to interpolate.
    #[error("Insufficient samples: got {got}, need at least {need}")]
    InsufficientSamples { got: usize, need: usize },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
