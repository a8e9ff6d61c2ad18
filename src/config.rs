//! Store configuration: where participant folders live and which matrix
//! format the preprocessing step wrote.
//!
//! Values come from defaults, a JSON file, or the environment
//! (`TRIALMAT_BASE_DIR`, `TRIALMAT_MATRIX_FORMAT`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::Phase;

pub const DEFAULT_PREPROCESSED_DIR: &str = "Preprocessed_Data_Matrix";

/// On-disk encoding of the phase matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixFormat {
    #[default]
    Parquet,
    Csv,
    Json,
}

impl MatrixFormat {
    pub fn extension(self) -> &'static str {
        match self {
            MatrixFormat::Parquet => "parquet",
            MatrixFormat::Csv => "csv",
            MatrixFormat::Json => "json",
        }
    }
}

impl fmt::Display for MatrixFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MatrixFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "parquet" | "pq" => Ok(MatrixFormat::Parquet),
            "csv" => Ok(MatrixFormat::Csv),
            "json" => Ok(MatrixFormat::Json),
            other => Err(format!("unsupported matrix format: {other}")),
        }
    }
}

/// Where to find participant data and how it is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the `P(<pid>)` folders.
    pub base_dir: PathBuf,
    /// Sub-folder of each participant folder with the combined matrices.
    pub preprocessed_dir: String,
    pub matrix_format: MatrixFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            preprocessed_dir: DEFAULT_PREPROCESSED_DIR.to_string(),
            matrix_format: MatrixFormat::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: MatrixFormat) -> Self {
        self.matrix_format = format;
        self
    }

    /// Read a JSON config file; missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults overridden by `TRIALMAT_BASE_DIR` and `TRIALMAT_MATRIX_FORMAT`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(base) = std::env::var("TRIALMAT_BASE_DIR") {
            config.base_dir = PathBuf::from(base);
        }
        if let Ok(format) = std::env::var("TRIALMAT_MATRIX_FORMAT") {
            config.matrix_format = format
                .parse()
                .map_err(anyhow::Error::msg)
                .context("TRIALMAT_MATRIX_FORMAT")?;
        }
        Ok(config)
    }

    pub fn paths(&self, pid: u32) -> ParticipantPaths {
        ParticipantPaths::new(self, pid)
    }
}

/// Every file location for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantPaths {
    pub pid: u32,
    /// `<base>/P(<pid>)/<preprocessed_dir>`
    pub dir: PathBuf,
    pub phase1: PathBuf,
    pub phase2: PathBuf,
    pub feature_indices: PathBuf,
}

impl ParticipantPaths {
    fn new(config: &StoreConfig, pid: u32) -> Self {
        let dir = config
            .base_dir
            .join(format!("P({pid})"))
            .join(&config.preprocessed_dir);
        let ext = config.matrix_format.extension();
        Self {
            pid,
            phase1: dir.join(format!("P{pid}_combined_matrix_phase1.{ext}")),
            phase2: dir.join(format!("P{pid}_combined_matrix_phase2.{ext}")),
            feature_indices: dir.join(format!("P{pid}_feature_indices.json")),
            dir,
        }
    }

    pub fn matrix(&self, phase: Phase) -> &Path {
        match phase {
            Phase::One => &self.phase1,
            Phase::Two => &self.phase2,
        }
    }

    /// The scaler file, whatever serialization it was written with.
    pub fn find_scaler(&self) -> Option<PathBuf> {
        let prefix = format!("P{}_global_scaler.", self.pid);
        std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
            })
    }
}
