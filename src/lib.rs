//! Trial-resolved access to combined EMG / kinematic matrices recorded
//! during a lift-and-hold task.
//!
//! Each participant folder holds two phase matrices (rows = samples,
//! columns = OTB, Myo, and kinematic hand features) and a feature-index
//! sidecar with the column range of every modality and the length of every
//! trial. [`TrialMatrixStore`] loads and validates them and hands out
//! zero-copy views per trial and modality.

pub mod config;
pub mod data;

pub use config::{MatrixFormat, ParticipantPaths, StoreConfig};
pub use data::error::{StoreError, StoreResult};
pub use data::model::{
    trial_bounds, ColumnRange, FeatureIndex, Modality, ModalityRange, ParticipantDataset, Phase,
    TrialBounds,
};
pub use data::normalize::{IdentityNormalizer, Normalizer, ScalerError, StandardScaler};
pub use data::resample::{resample, Interpolation};
pub use data::store::TrialMatrixStore;
